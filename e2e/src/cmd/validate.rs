use super::error::{self, Result};
use argh::FromArgs;
use snafu::ResultExt;
use std::path::PathBuf;

#[derive(Debug, FromArgs, PartialEq)]
#[argh(
    subcommand,
    name = "validate",
    description = "Check a node configuration against the rules for its credential mode"
)]
pub(crate) struct Validate {
    #[argh(option, description = "path to the node configuration document")]
    config: PathBuf,
}

impl Validate {
    pub(crate) async fn run(&self) -> Result<()> {
        let config = super::read_node_config(&self.config).await?;
        config.validate().context(error::InvalidNodeConfigSnafu)?;
        println!(
            "{}: valid {} node configuration",
            self.config.display(),
            config.credential_mode()
        );
        Ok(())
    }
}
