use super::error::{self, Result};
use argh::FromArgs;
use e2e::iam::{create_cluster_role, delete_cluster_role, IamRoleClient};
use snafu::ResultExt;

#[derive(Debug, FromArgs, PartialEq)]
#[argh(
    subcommand,
    name = "create-cluster-role",
    description = "Create the EKS service role for a test cluster"
)]
pub(crate) struct CreateClusterRole {
    #[argh(option, description = "name of the test cluster")]
    cluster_name: String,

    #[argh(option, description = "AWS region to use")]
    region: String,
}

impl CreateClusterRole {
    pub(crate) async fn run(&self) -> Result<()> {
        let client = role_client(&self.region).await;
        let role_arn = create_cluster_role(&client, &self.cluster_name)
            .await
            .context(error::ClusterRoleSnafu)?;
        println!("{}", role_arn);
        Ok(())
    }
}

#[derive(Debug, FromArgs, PartialEq)]
#[argh(
    subcommand,
    name = "delete-cluster-role",
    description = "Detach the cluster policy from a test cluster's service role and delete it"
)]
pub(crate) struct DeleteClusterRole {
    #[argh(option, description = "name of the test cluster")]
    cluster_name: String,

    #[argh(option, description = "AWS region to use")]
    region: String,
}

impl DeleteClusterRole {
    pub(crate) async fn run(&self) -> Result<()> {
        let client = role_client(&self.region).await;
        delete_cluster_role(&client, &self.cluster_name)
            .await
            .context(error::ClusterRoleSnafu)
    }
}

async fn role_client(region: &str) -> IamRoleClient {
    let config = e2e::aws_config(region).await;
    IamRoleClient::new(aws_sdk_iam::Client::new(&config))
}
