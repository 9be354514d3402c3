//! Download of the IAM Roles Anywhere credential signing helper that hybrid nodes use to obtain
//! temporary credentials.

use crate::arch::Architecture;

use reqwest::StatusCode;
use snafu::{ensure, ResultExt};
use std::ffi::OsString;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{event, instrument, Level};

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, signing_helper_error::Error>;

pub const SIGNING_HELPER_VERSION: &str = "1.1.1";
pub const DEFAULT_RELEASES_URL: &str = "https://rolesanywhere.amazonaws.com/releases";

/// Fetches the signing helper from its official release channel.
#[derive(Clone, Debug)]
pub struct SigningHelperSource {
    client: reqwest::Client,
    releases_url: String,
}

impl SigningHelperSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_releases_url(client, DEFAULT_RELEASES_URL)
    }

    /// Uses `releases_url` in place of the public release channel.
    pub fn with_releases_url<S: Into<String>>(client: reqwest::Client, releases_url: S) -> Self {
        Self {
            client,
            releases_url: releases_url.into(),
        }
    }

    /// The versioned download location of the helper. Only an `X86_64` build is published.
    pub fn url(&self) -> String {
        format!(
            "{}/{}/X86_64/Linux/aws_signing_helper",
            self.releases_url.trim_end_matches('/'),
            SIGNING_HELPER_VERSION
        )
    }

    /// Starts the download for `arch`. Only `amd64` is supported, and any other architecture is
    /// rejected without a request being made. The returned body belongs to the caller.
    #[instrument(skip(self))]
    pub async fn get_signing_helper(&self, arch: Architecture) -> Result<SigningHelperBody> {
        ensure!(
            arch == Architecture::Amd64,
            signing_helper_error::UnsupportedArchitectureSnafu { arch }
        );

        let url = self.url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context(signing_helper_error::RequestSnafu { url: url.clone() })?;

        let status = response.status();
        ensure!(
            status == StatusCode::OK,
            signing_helper_error::UnexpectedStatusSnafu {
                url,
                status: status.as_u16(),
            }
        );

        event!(Level::DEBUG, url = %url, "Downloading signing helper");
        Ok(SigningHelperBody { url, response })
    }
}

/// The streamed body of a successful signing helper download.
#[derive(Debug)]
pub struct SigningHelperBody {
    url: String,
    response: reqwest::Response,
}

impl SigningHelperBody {
    /// The next piece of the body, or `None` once it has been read completely.
    pub async fn chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = self
            .response
            .chunk()
            .await
            .context(signing_helper_error::ReadBodySnafu {
                url: self.url.clone(),
            })?;
        Ok(chunk.map(|chunk| chunk.to_vec()))
    }

    /// Streams the whole body into `writer` and returns the number of bytes written.
    pub async fn copy_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.chunk().await? {
            writer
                .write_all(&chunk)
                .await
                .context(signing_helper_error::WriteSnafu)?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .context(signing_helper_error::WriteSnafu)?;
        Ok(written)
    }

    /// Saves the body as an executable at `path`. The download lands in a `.part` file next to
    /// `path` and is only renamed into place once complete; on failure the `.part` file is
    /// removed and nothing is left at `path`.
    pub async fn save(self, path: &Path) -> Result<u64> {
        let partial = partial_path(path);
        let result = self.save_partial(&partial, path).await;
        if result.is_err() {
            if let Err(err) = tokio::fs::remove_file(&partial).await {
                event!(
                    Level::DEBUG,
                    path = %partial.display(),
                    error = %err,
                    "Unable to remove partial download"
                );
            }
        }
        result
    }

    async fn save_partial(self, partial: &Path, path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(partial)
            .await
            .context(signing_helper_error::SaveSnafu { path: partial })?;
        let written = self.copy_to(&mut file).await?;
        file.set_permissions(Permissions::from_mode(0o755))
            .await
            .context(signing_helper_error::SaveSnafu { path: partial })?;
        drop(file);
        tokio::fs::rename(partial, path)
            .await
            .context(signing_helper_error::SaveSnafu { path })?;
        Ok(written)
    }

    /// Reads the whole body into memory.
    pub async fn read_to_end(self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        self.copy_to(&mut body).await?;
        Ok(body)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

pub mod signing_helper_error {
    use crate::arch::Architecture;
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Signing helper: unsupported architecture: {}", arch))]
        UnsupportedArchitecture { arch: Architecture },

        #[snafu(display("Signing helper request to '{}' failed: '{}'", url, source))]
        Request { url: String, source: reqwest::Error },

        #[snafu(display("Signing helper: {} from '{}'", status, url))]
        UnexpectedStatus { url: String, status: u16 },

        #[snafu(display("Unable to read signing helper body from '{}': '{}'", url, source))]
        ReadBody { url: String, source: reqwest::Error },

        #[snafu(display("Unable to write signing helper: '{}'", source))]
        Write { source: std::io::Error },

        #[snafu(display("Unable to save signing helper to '{}': '{}'", path.display(), source))]
        Save {
            path: PathBuf,
            source: std::io::Error,
        },
    }
}
