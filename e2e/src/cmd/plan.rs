use super::error::{self, Result};
use argh::FromArgs;
use e2e::catalog::Ec2ImageCatalog;
use e2e::os::{ImageClients, OsRegistry, OsVariant, RhelCredentials};
use e2e::parameters::SsmParameterStore;
use e2e::provision::{plan_all, provision_error, PlanRequest};
use e2e::userdata::NodeadmUrls;
use snafu::{ensure, ResultExt};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{event, Level};

const RHEL_USERNAME_ENV_VAR: &str = "RHEL_USERNAME";
const RHEL_PASSWORD_ENV_VAR: &str = "RHEL_PASSWORD";

#[derive(Debug, FromArgs, PartialEq)]
#[argh(
    subcommand,
    name = "plan",
    description = "Resolve the image, instance type and user data for each OS variant"
)]
pub(crate) struct Plan {
    #[argh(option, description = "path to the node configuration document")]
    config: PathBuf,

    #[argh(option, description = "AWS region to use")]
    region: String,

    #[argh(option, description = "Kubernetes version the nodes install")]
    kubernetes_version: String,

    #[argh(option, description = "nodeadm download URL for amd64 nodes")]
    nodeadm_url_amd: String,

    #[argh(option, description = "nodeadm download URL for arm64 nodes")]
    nodeadm_url_arm: String,

    #[argh(
        option,
        description = "OS variant to plan, e.g. rhel9-arm64; may be repeated, defaults to all"
    )]
    os: Vec<OsVariant>,

    #[argh(
        option,
        default = "PathBuf::from(\".\")",
        description = "directory the rendered user data is written to"
    )]
    output_dir: PathBuf,

    #[argh(
        option,
        default = "300",
        description = "seconds allowed for each variant's image lookup"
    )]
    timeout_secs: u64,
}

/// RHEL subscription credentials, when both are set in the environment.
fn rhel_credentials_from_env() -> Option<RhelCredentials> {
    let username = env::var(RHEL_USERNAME_ENV_VAR).ok()?;
    let password = env::var(RHEL_PASSWORD_ENV_VAR).ok()?;
    Some(RhelCredentials::new(username, password))
}

/// One line per failed variant, each naming the variant and why it failed.
fn failure_summary(failed: &[provision_error::Error]) -> String {
    failed
        .iter()
        .map(|err| format!("\n  {}", err))
        .collect()
}

impl Plan {
    fn variants(&self) -> Vec<OsVariant> {
        if self.os.is_empty() {
            OsVariant::ALL.to_vec()
        } else {
            self.os.clone()
        }
    }

    pub(crate) async fn run(&self) -> Result<()> {
        let config = super::read_node_config(&self.config).await?;
        let registry = OsRegistry::new(&self.variants(), rhel_credentials_from_env().as_ref())
            .context(error::OsRegistrySnafu)?;

        let sdk_config = e2e::aws_config(&self.region).await;
        let catalog = Ec2ImageCatalog::new(aws_sdk_ec2::Client::new(&sdk_config));
        let parameters = SsmParameterStore::new(aws_sdk_ssm::Client::new(&sdk_config));
        let request = PlanRequest {
            region: self.region.clone(),
            kubernetes_version: self.kubernetes_version.clone(),
            nodeadm_urls: NodeadmUrls {
                amd: self.nodeadm_url_amd.clone(),
                arm: self.nodeadm_url_arm.clone(),
            },
            resolve_timeout: Duration::from_secs(self.timeout_secs),
        };

        let results = plan_all(
            &registry,
            &config,
            ImageClients {
                catalog: &catalog,
                parameters: &parameters,
            },
            &request,
        )
        .await;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context(error::WriteFileSnafu {
                path: &self.output_dir,
            })?;

        let mut failed = Vec::new();
        for (_, result) in results {
            let plan = match result {
                Ok(plan) => plan,
                Err(err) => {
                    failed.push(err);
                    continue;
                }
            };
            let path = self.output_dir.join(format!("{}.userdata", plan.os));
            tokio::fs::write(&path, &plan.user_data)
                .await
                .context(error::WriteFileSnafu { path: &path })?;
            event!(
                Level::INFO,
                os = %plan.os,
                image_id = %plan.image_id,
                instance_type = plan.instance_type,
                user_data = %path.display(),
                "Planned node"
            );
            println!("{}\t{}\t{}", plan.os, plan.image_id, plan.instance_type);
        }

        ensure!(
            failed.is_empty(),
            error::PlanFailedSnafu {
                failed: failure_summary(&failed)
            }
        );
        Ok(())
    }
}
