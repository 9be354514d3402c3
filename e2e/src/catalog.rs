/*!
  The image catalog is the cloud provider's searchable registry of bootable machine images.
  `find_latest_image` walks every page of a filtered catalog query and picks the most recently
  created image.
!*/

use async_trait::async_trait;
use aws_sdk_ec2::types::Filter;
use chrono::{DateTime, FixedOffset};
use snafu::{OptionExt, ResultExt};
use tracing::{event, instrument, Level};

/// The largest page the catalog is asked for in a single query.
pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, catalog_error::Error>;

/// A filtered catalog query. `name_pattern` may contain `*` globs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageQuery {
    pub owner: String,
    pub name_pattern: String,
    pub architecture: String,
    pub page_size: i32,
}

impl ImageQuery {
    pub fn new<S1, S2, S3>(owner: S1, name_pattern: S2, architecture: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            owner: owner.into(),
            name_pattern: name_pattern.into(),
            architecture: architecture.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One catalog entry as returned by a page of results.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CatalogImage {
    pub id: String,
    /// Creation time in RFC 3339 format, e.g. `2024-05-01T12:00:00.000Z`.
    pub creation_date: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImagePage {
    pub images: Vec<CatalogImage>,
    /// The token to request the next page with. `None` when this is the last page.
    pub next_token: Option<String>,
}

#[async_trait]
/// A trait providing an interface to list catalog images one page at a time. This is provided as a
/// trait in order to allow fixtures and mocks to be used for testing purposes.
pub trait ImageCatalog: Send + Sync {
    /// Fetch the page of `query` results that starts at `next_token`.
    async fn describe_images(
        &self,
        query: &ImageQuery,
        next_token: Option<String>,
    ) -> Result<ImagePage>;
}

/// Concrete implementation of the `ImageCatalog` trait backed by EC2 `DescribeImages`.
#[derive(Clone, Debug)]
pub struct Ec2ImageCatalog {
    client: aws_sdk_ec2::Client,
}

impl Ec2ImageCatalog {
    pub fn new(client: aws_sdk_ec2::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageCatalog for Ec2ImageCatalog {
    async fn describe_images(
        &self,
        query: &ImageQuery,
        next_token: Option<String>,
    ) -> Result<ImagePage> {
        let output = self
            .client
            .describe_images()
            .owners(&query.owner)
            .filters(
                Filter::builder()
                    .name("name")
                    .values(&query.name_pattern)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("architecture")
                    .values(&query.architecture)
                    .build(),
            )
            .max_results(query.page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(catalog_error::DescribeImagesSnafu {
                name_pattern: query.name_pattern.clone(),
            })?;

        let images = output
            .images()
            .iter()
            .map(|image| {
                Ok(CatalogImage {
                    id: image
                        .image_id()
                        .context(catalog_error::MissingImageFieldSnafu { field: "ImageId" })?
                        .to_string(),
                    creation_date: image
                        .creation_date()
                        .context(catalog_error::MissingImageFieldSnafu {
                            field: "CreationDate",
                        })?
                        .to_string(),
                    name: image.name().map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ImagePage {
            images,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

/// The best image seen so far during a scan.
#[derive(Clone, Debug)]
struct ImageCandidate {
    id: String,
    created_at: DateTime<FixedOffset>,
}

/// Returns the id of the most recently created image matching `query`, or `None` when the catalog
/// has no matching images.
///
/// Pages are requested until the catalog reports no next page, returns an empty page, or hands back
/// the same token that was just requested. Images with equal creation times keep the first one
/// seen. Any fetch or timestamp error aborts the scan. Dropping the returned future stops the scan
/// and discards the partial result.
#[instrument(skip(catalog))]
pub async fn find_latest_image(
    catalog: &dyn ImageCatalog,
    query: &ImageQuery,
) -> Result<Option<String>> {
    let mut latest: Option<ImageCandidate> = None;
    let mut next_token: Option<String> = None;
    let mut pages = 0;

    loop {
        let page = catalog.describe_images(query, next_token.clone()).await?;
        pages += 1;

        if pagination_done(next_token.as_deref(), &page) {
            break;
        }

        for image in &page.images {
            let created_at = DateTime::parse_from_rfc3339(&image.creation_date).context(
                catalog_error::ParseCreationDateSnafu {
                    image_id: image.id.clone(),
                    creation_date: image.creation_date.clone(),
                },
            )?;
            if latest
                .as_ref()
                .map_or(true, |candidate| created_at > candidate.created_at)
            {
                latest = Some(ImageCandidate {
                    id: image.id.clone(),
                    created_at,
                });
            }
        }

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    event!(
        Level::DEBUG,
        pages = pages,
        image_id = ?latest.as_ref().map(|c| c.id.as_str()),
        "Finished scanning image catalog"
    );
    Ok(latest.map(|candidate| candidate.id))
}

/// A page ends the scan when it is empty or when the catalog echoes the token we just sent, which
/// would otherwise loop forever.
fn pagination_done(requested_token: Option<&str>, page: &ImagePage) -> bool {
    (requested_token.is_some() && requested_token == page.next_token.as_deref())
        || page.images.is_empty()
}

pub mod catalog_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to list catalog images named '{}': '{}'", name_pattern, source))]
        DescribeImages {
            name_pattern: String,
            source: Box<dyn std::error::Error + Send + Sync>,
        },

        #[snafu(display("Catalog image is missing its '{}' field", field))]
        MissingImageField { field: &'static str },

        #[snafu(display(
            "Unable to parse creation date '{}' of image '{}': '{}'",
            creation_date,
            image_id,
            source
        ))]
        ParseCreationDate {
            image_id: String,
            creation_date: String,
            source: chrono::ParseError,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockImageCatalog;
    use maplit::hashmap;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves pre-built pages keyed by the token they are requested with and records every
    /// request.
    struct FixtureCatalog {
        pages: HashMap<Option<String>, ImagePage>,
        fail_on: Option<String>,
        stall_on: Option<String>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl FixtureCatalog {
        fn new(pages: HashMap<Option<String>, ImagePage>) -> Self {
            Self {
                pages,
                fail_on: None,
                stall_on: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Option<String>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageCatalog for FixtureCatalog {
        async fn describe_images(
            &self,
            query: &ImageQuery,
            next_token: Option<String>,
        ) -> Result<ImagePage> {
            self.requests.lock().unwrap().push(next_token.clone());
            if next_token.is_some() && next_token == self.stall_on {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if next_token.is_some() && next_token == self.fail_on {
                return Err(catalog_error::Error::DescribeImages {
                    name_pattern: query.name_pattern.clone(),
                    source: "throttled".into(),
                });
            }
            Ok(self.pages.get(&next_token).cloned().unwrap_or_default())
        }
    }

    fn image(id: &str, creation_date: &str) -> CatalogImage {
        CatalogImage {
            id: id.to_string(),
            creation_date: creation_date.to_string(),
            name: Some(format!("RHEL-9.4.0_HVM-{}", id)),
        }
    }

    fn page(images: Vec<CatalogImage>, next_token: Option<&str>) -> ImagePage {
        ImagePage {
            images,
            next_token: next_token.map(str::to_string),
        }
    }

    fn query() -> ImageQuery {
        ImageQuery::new("309956199498", "RHEL-9*", "x86_64")
    }

    const T1: &str = "2024-01-01T00:00:00.000Z";
    const T2: &str = "2024-03-01T00:00:00.000Z";
    const T3: &str = "2024-02-01T00:00:00.000Z";

    #[tokio::test]
    async fn returns_global_latest_across_pages() {
        let catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t1", T1), image("ami-t3", T3)], Some("page-2")),
            Some("page-2".to_string()) => page(vec![image("ami-t2", T2)], None),
        });

        let latest = find_latest_image(&catalog, &query()).await.unwrap();

        assert_eq!(latest.as_deref(), Some("ami-t2"));
        assert_eq!(catalog.requests(), vec![None, Some("page-2".to_string())]);
    }

    #[tokio::test]
    async fn earlier_page_can_hold_the_latest_image() {
        let catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t2", T2)], Some("page-2")),
            Some("page-2".to_string()) => page(vec![image("ami-t1", T1), image("ami-t3", T3)], None),
        });

        let latest = find_latest_image(&catalog, &query()).await.unwrap();
        assert_eq!(latest.as_deref(), Some("ami-t2"));
    }

    #[tokio::test]
    async fn repeated_token_terminates_scan() {
        let catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t1", T1)], Some("loop")),
            Some("loop".to_string()) => page(vec![image("ami-t3", T3)], Some("loop")),
        });

        let latest = tokio::time::timeout(
            Duration::from_secs(5),
            find_latest_image(&catalog, &query()),
        )
        .await
        .expect("scan did not terminate")
        .unwrap();

        assert_eq!(latest.as_deref(), Some("ami-t1"));
        assert_eq!(catalog.requests(), vec![None, Some("loop".to_string())]);
    }

    #[tokio::test]
    async fn empty_page_terminates_scan() {
        let catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t1", T1)], Some("page-2")),
            Some("page-2".to_string()) => page(vec![], Some("page-3")),
            Some("page-3".to_string()) => page(vec![image("ami-t2", T2)], None),
        });

        let latest = find_latest_image(&catalog, &query()).await.unwrap();

        assert_eq!(latest.as_deref(), Some("ami-t1"));
        assert_eq!(catalog.requests().len(), 2);
    }

    #[tokio::test]
    async fn no_matching_images_is_not_an_error() {
        let catalog = FixtureCatalog::new(HashMap::new());

        let latest = find_latest_image(&catalog, &query()).await.unwrap();

        assert_eq!(latest, None);
        assert_eq!(catalog.requests(), vec![None]);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_first_seen() {
        let catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-first", T2), image("ami-second", T2)], Some("page-2")),
            Some("page-2".to_string()) => page(vec![image("ami-third", T2)], None),
        });

        let latest = find_latest_image(&catalog, &query()).await.unwrap();
        assert_eq!(latest.as_deref(), Some("ami-first"));
    }

    #[tokio::test]
    async fn malformed_creation_date_aborts_scan() {
        let catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t1", T1), image("ami-bad", "last tuesday")], Some("page-2")),
            Some("page-2".to_string()) => page(vec![image("ami-t2", T2)], None),
        });

        let err = find_latest_image(&catalog, &query()).await.unwrap_err();

        assert!(matches!(
            err,
            catalog_error::Error::ParseCreationDate { ref image_id, .. } if image_id == "ami-bad"
        ));
        assert_eq!(catalog.requests(), vec![None]);
    }

    #[tokio::test]
    async fn page_fetch_error_aborts_scan() {
        let mut catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t1", T1)], Some("page-2")),
            Some("page-2".to_string()) => page(vec![image("ami-t2", T2)], Some("page-3")),
            Some("page-3".to_string()) => page(vec![image("ami-t3", T3)], None),
        });
        catalog.fail_on = Some("page-2".to_string());

        let err = find_latest_image(&catalog, &query()).await.unwrap_err();

        assert!(matches!(err, catalog_error::Error::DescribeImages { .. }));
        assert_eq!(catalog.requests().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_scan_stops_requesting_pages() {
        let mut catalog = FixtureCatalog::new(hashmap! {
            None => page(vec![image("ami-t1", T1)], Some("page-2")),
            Some("page-2".to_string()) => page(vec![image("ami-t2", T2)], Some("page-3")),
            Some("page-3".to_string()) => page(vec![image("ami-t3", T3)], None),
        });
        catalog.stall_on = Some("page-2".to_string());

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            find_latest_image(&catalog, &query()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(catalog.requests().len(), 2);
    }

    #[tokio::test]
    async fn query_is_passed_to_catalog() {
        let mut catalog = MockImageCatalog::new();
        catalog
            .expect_describe_images()
            .withf(|query, next_token| {
                query.owner == "309956199498"
                    && query.name_pattern == "RHEL-9*"
                    && query.architecture == "x86_64"
                    && query.page_size == DEFAULT_PAGE_SIZE
                    && next_token.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(page(vec![image("ami-only", T1)], None)));

        let latest = find_latest_image(&catalog, &query()).await.unwrap();
        assert_eq!(latest.as_deref(), Some("ami-only"));
    }
}
