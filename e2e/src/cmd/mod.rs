pub(crate) mod cluster_role;
pub(crate) mod error;
pub(crate) mod plan;
pub(crate) mod signing_helper;
pub(crate) mod validate;

use error::Result;
use models::node::NodeConfig;
use snafu::ResultExt;
use std::path::Path;

/// Reads and parses the node configuration document at `path`.
pub(crate) async fn read_node_config(path: &Path) -> Result<NodeConfig> {
    let document = tokio::fs::read_to_string(path)
        .await
        .context(error::ReadFileSnafu { path })?;
    NodeConfig::from_yaml(&document).context(error::ParseNodeConfigSnafu { path })
}
