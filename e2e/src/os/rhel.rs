use super::{ImageClients, NodeOs, Result};
use crate::arch::Architecture;
use crate::catalog::{find_latest_image, ImageQuery};
use crate::userdata::{self, Template, UserDataInput, RHEL_8_CLOUD_INIT, RHEL_9_CLOUD_INIT};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use tracing::instrument;

/// Red Hat publishes its images from this account. There is no public parameter for them, so the
/// newest one has to be found by scanning the catalog.
const RHEL_IMAGE_OWNER: &str = "309956199498";

const RHEL_SSM_AGENT_AMD: &str =
    "https://s3.amazonaws.com/ec2-downloads-windows/SSMAgent/latest/linux_amd64/amazon-ssm-agent.rpm";
const RHEL_SSM_AGENT_ARM: &str =
    "https://s3.amazonaws.com/ec2-downloads-windows/SSMAgent/latest/linux_arm64/amazon-ssm-agent.rpm";

/// Red Hat subscription login used by cloud-init to register the node.
#[derive(Clone, Eq, PartialEq)]
pub struct RhelCredentials {
    username: String,
    password: String,
}

impl RhelCredentials {
    pub fn new<S1, S2>(username: S1, password: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RhelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhelCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RhelRelease {
    Rhel8,
    Rhel9,
}

impl RhelRelease {
    fn major_version(&self) -> u8 {
        match self {
            Self::Rhel8 => 8,
            Self::Rhel9 => 9,
        }
    }

    fn template(&self) -> &'static Template {
        match self {
            Self::Rhel8 => &RHEL_8_CLOUD_INIT,
            Self::Rhel9 => &RHEL_9_CLOUD_INIT,
        }
    }

    /// RHEL 9 images ship without the SSM agent, so the boot script installs it.
    fn ssm_agent_url(&self, arch: Architecture) -> Option<&'static str> {
        match (self, arch) {
            (Self::Rhel8, _) => None,
            (Self::Rhel9, Architecture::Amd64) => Some(RHEL_SSM_AGENT_AMD),
            (Self::Rhel9, Architecture::Arm64) => Some(RHEL_SSM_AGENT_ARM),
        }
    }
}

#[derive(Serialize)]
struct CloudInitData<'a> {
    files: &'a [userdata::File],
    nodeadm_config: &'a str,
    nodeadm_url: &'a str,
    kubernetes_version: &'a str,
    provider: &'a str,
    rhel_username: &'a str,
    rhel_password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssm_agent_url: Option<&'a str>,
}

/// A Red Hat Enterprise Linux release on one architecture.
#[derive(Clone, Debug)]
pub struct RedHat {
    release: RhelRelease,
    arch: Architecture,
    credentials: RhelCredentials,
}

impl RedHat {
    pub fn new(release: RhelRelease, arch: Architecture, credentials: RhelCredentials) -> Self {
        Self {
            release,
            arch,
            credentials,
        }
    }

    fn image_query(&self) -> ImageQuery {
        ImageQuery::new(
            RHEL_IMAGE_OWNER,
            format!("RHEL-{}*", self.release.major_version()),
            self.arch.ami_architecture(),
        )
    }
}

#[async_trait]
impl NodeOs for RedHat {
    fn name(&self) -> String {
        format!("rhel{}-{}", self.release.major_version(), self.arch)
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    #[instrument(skip(self, clients), fields(os = %self.name()))]
    async fn resolve_image(&self, clients: ImageClients<'_>) -> Result<Option<String>> {
        Ok(find_latest_image(clients.catalog, &self.image_query()).await?)
    }

    fn build_user_data(&self, mut input: UserDataInput) -> Result<Vec<u8>> {
        userdata::populate_base_scripts(&mut input);
        let data = CloudInitData {
            files: &input.files,
            nodeadm_config: &input.nodeadm_config_yaml,
            nodeadm_url: input.nodeadm_urls.for_architecture(self.arch),
            kubernetes_version: &input.kubernetes_version,
            provider: &input.provider,
            rhel_username: &self.credentials.username,
            rhel_password: &self.credentials.password,
            ssm_agent_url: self.release.ssm_agent_url(self.arch),
        };
        Ok(userdata::render(self.release.template(), data)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::{catalog_error, CatalogImage, ImagePage, DEFAULT_PAGE_SIZE};
    use crate::mock::{MockImageCatalog, MockParameterStore};
    use crate::os::os_error;

    fn rhel(release: RhelRelease, arch: Architecture) -> RedHat {
        RedHat::new(release, arch, RhelCredentials::new("user", "secret"))
    }

    fn input() -> UserDataInput {
        UserDataInput {
            kubernetes_version: "1.31".to_string(),
            nodeadm_urls: userdata::NodeadmUrls {
                amd: "https://example.com/amd/nodeadm".to_string(),
                arm: "https://example.com/arm/nodeadm".to_string(),
            },
            nodeadm_config_yaml: "kind: NodeConfig\n".to_string(),
            provider: "ssm".to_string(),
            files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn image_query_uses_release_and_architecture() {
        let mut catalog = MockImageCatalog::new();
        catalog
            .expect_describe_images()
            .withf(|query, next_token| {
                query.owner == "309956199498"
                    && query.name_pattern == "RHEL-8*"
                    && query.architecture == "arm64"
                    && query.page_size == DEFAULT_PAGE_SIZE
                    && next_token.is_none()
            })
            .times(1)
            .returning(|_, _| {
                Ok(ImagePage {
                    images: vec![
                        CatalogImage {
                            id: "ami-older".to_string(),
                            creation_date: "2024-01-01T00:00:00.000Z".to_string(),
                            name: None,
                        },
                        CatalogImage {
                            id: "ami-newer".to_string(),
                            creation_date: "2024-06-01T00:00:00.000Z".to_string(),
                            name: None,
                        },
                    ],
                    next_token: None,
                })
            });
        let parameters = MockParameterStore::new();

        let image = rhel(RhelRelease::Rhel8, Architecture::Arm64)
            .resolve_image(ImageClients {
                catalog: &catalog,
                parameters: &parameters,
            })
            .await
            .unwrap();
        assert_eq!(image.as_deref(), Some("ami-newer"));
    }

    #[tokio::test]
    async fn catalog_errors_pass_through() {
        let mut catalog = MockImageCatalog::new();
        catalog.expect_describe_images().returning(|_, _| {
            catalog_error::MissingImageFieldSnafu { field: "ImageId" }.fail()
        });
        let parameters = MockParameterStore::new();

        let err = rhel(RhelRelease::Rhel9, Architecture::Amd64)
            .resolve_image(ImageClients {
                catalog: &catalog,
                parameters: &parameters,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, os_error::Error::Catalog { .. }));
    }

    #[test]
    fn names() {
        assert_eq!(rhel(RhelRelease::Rhel8, Architecture::Amd64).name(), "rhel8-amd64");
        assert_eq!(rhel(RhelRelease::Rhel9, Architecture::Arm64).name(), "rhel9-arm64");
    }

    #[test]
    fn rhel9_installs_architecture_ssm_agent() {
        let rendered = rhel(RhelRelease::Rhel9, Architecture::Arm64)
            .build_user_data(input())
            .unwrap();
        let rendered = String::from_utf8(rendered).unwrap();
        assert!(rendered.contains("  - dnf install -y https://s3.amazonaws.com/ec2-downloads-windows/SSMAgent/latest/linux_arm64/amazon-ssm-agent.rpm\n"));
        assert!(rendered.contains("  username: \"user\"\n  password: \"secret\"\n"));
        assert!(rendered.contains("\"https://example.com/arm/nodeadm\" \"1.31\" \"ssm\""));
    }

    #[test]
    fn subscription_credentials_survive_yaml_syntax() {
        let password = "*p@ss: #1 'x' \"y\"";
        let os = RedHat::new(
            RhelRelease::Rhel8,
            Architecture::Amd64,
            RhelCredentials::new("!user", password),
        );
        let rendered = String::from_utf8(os.build_user_data(input()).unwrap()).unwrap();

        let document: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(document["rh_subscription"]["username"], "!user");
        assert_eq!(document["rh_subscription"]["password"], password);
    }

    #[test]
    fn rhel8_has_no_ssm_agent() {
        let rendered = rhel(RhelRelease::Rhel8, Architecture::Amd64)
            .build_user_data(input())
            .unwrap();
        let rendered = String::from_utf8(rendered).unwrap();
        assert!(!rendered.contains("amazon-ssm-agent.rpm"));
        assert!(rendered.contains("\"https://example.com/amd/nodeadm\""));
    }

    #[test]
    fn credentials_are_redacted_in_debug_output() {
        let debug = format!("{:?}", RhelCredentials::new("user", "secret"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }
}
