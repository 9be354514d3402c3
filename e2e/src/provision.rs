/*!
  A provisioning plan turns a node configuration into everything needed to launch one test node
  per OS variant: a validated configuration, the image to boot, the instance type and the rendered
  user data. Launching the instances is left to the caller.
!*/

use crate::os::{os_error, ImageClients, NodeOs, OsRegistry};
use crate::userdata::{userdata_error, NodeadmUrls, UserDataInput};

use futures::future::join_all;
use models::node::{NodeConfig, ValidationError};
use snafu::{OptionExt, ResultExt};
use std::time::Duration;
use tracing::{event, instrument, Level};

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, provision_error::Error>;

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(300);

/// Inputs shared by every variant in a plan.
#[derive(Clone, Debug)]
pub struct PlanRequest {
    pub region: String,
    pub kubernetes_version: String,
    pub nodeadm_urls: NodeadmUrls,
    /// Upper bound on image resolution for a single variant.
    pub resolve_timeout: Duration,
}

/// What is needed to launch one test node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodePlan {
    pub os: String,
    pub image_id: String,
    pub instance_type: &'static str,
    pub user_data: Vec<u8>,
}

/// Plans a single node running `os`. The configuration is validated and checked for a hybrid
/// credential provider first, so a configuration that cannot be rendered never reaches the cloud.
#[instrument(skip_all, fields(os = %os.name()))]
pub async fn plan_node(
    os: &dyn NodeOs,
    config: &NodeConfig,
    clients: ImageClients<'_>,
    request: &PlanRequest,
) -> Result<NodePlan> {
    let name = os.name();
    config
        .validate()
        .context(provision_error::InvalidConfigSnafu { os: name.clone() })?;

    let input = UserDataInput::from_node_config(
        config,
        &request.kubernetes_version,
        request.nodeadm_urls.clone(),
    )
    .context(provision_error::UserDataInputSnafu { os: name.clone() })?;

    let image_id = tokio::time::timeout(request.resolve_timeout, os.resolve_image(clients))
        .await
        .context(provision_error::ResolveTimeoutSnafu {
            os: name.clone(),
            timeout: request.resolve_timeout,
        })?
        .context(provision_error::ResolveImageSnafu { os: name.clone() })?
        .context(provision_error::ImageNotFoundSnafu { os: name.clone() })?;
    event!(Level::INFO, image_id = %image_id, "Resolved image");

    let instance_type = os.instance_type(&request.region);
    let user_data = os
        .build_user_data(input)
        .context(provision_error::RenderSnafu { os: name.clone() })?;

    Ok(NodePlan {
        os: name,
        image_id,
        instance_type,
        user_data,
    })
}

/// Plans every OS in `registry` concurrently. Each variant gets its own result; one variant
/// failing has no effect on the others.
pub async fn plan_all(
    registry: &OsRegistry,
    config: &NodeConfig,
    clients: ImageClients<'_>,
    request: &PlanRequest,
) -> Vec<(String, Result<NodePlan>)> {
    let plans = registry.iter().map(|os| async move {
        let result = plan_node(os, config, clients, request).await;
        if let Err(err) = &result {
            event!(Level::WARN, os = %os.name(), error = %err, "Unable to plan node");
        }
        (os.name(), result)
    });
    join_all(plans).await
}

pub mod provision_error {
    use super::*;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("{}: {}", os, source))]
        InvalidConfig {
            os: String,
            source: ValidationError,
        },

        #[snafu(display("{}: image resolution did not finish within {:?}", os, timeout))]
        ResolveTimeout {
            os: String,
            timeout: Duration,
            source: tokio::time::error::Elapsed,
        },

        #[snafu(display("{}: {}", os, source))]
        ResolveImage { os: String, source: os_error::Error },

        #[snafu(display("{}: no image found", os))]
        ImageNotFound { os: String },

        #[snafu(display("{}: {}", os, source))]
        UserDataInput {
            os: String,
            source: userdata_error::Error,
        },

        #[snafu(display("{}: {}", os, source))]
        Render { os: String, source: os_error::Error },
    }
}
