use super::error::{self, Result};
use argh::FromArgs;
use e2e::arch::Architecture;
use e2e::signing_helper::{SigningHelperSource, DEFAULT_RELEASES_URL};
use snafu::ResultExt;
use std::path::PathBuf;
use tracing::{event, Level};

#[derive(Debug, FromArgs, PartialEq)]
#[argh(
    subcommand,
    name = "signing-helper",
    description = "Download the IAM Roles Anywhere signing helper"
)]
pub(crate) struct SigningHelper {
    #[argh(option, description = "architecture of the node the helper will run on")]
    arch: Architecture,

    #[argh(option, description = "where to write the helper binary")]
    output: PathBuf,

    #[argh(
        option,
        default = "DEFAULT_RELEASES_URL.to_string()",
        description = "base URL of the helper releases"
    )]
    releases_url: String,
}

impl SigningHelper {
    pub(crate) async fn run(&self) -> Result<()> {
        let source =
            SigningHelperSource::with_releases_url(reqwest::Client::new(), &self.releases_url);
        let body = source
            .get_signing_helper(self.arch)
            .await
            .context(error::SigningHelperSnafu)?;

        let written = body
            .save(&self.output)
            .await
            .context(error::SigningHelperSnafu)?;

        event!(
            Level::INFO,
            path = %self.output.display(),
            bytes = written,
            "Saved signing helper"
        );
        Ok(())
    }
}
