/*!
  The cluster service role used by the test harness. Each test cluster gets one role, named after
  the cluster, that the EKS service may assume and that carries the EKS cluster policy.
!*/

use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use tracing::{event, instrument, Level};

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, iam_error::Error>;

pub const EKS_CLUSTER_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy";

const ASSUME_ROLE_POLICY_DOCUMENT: &str = r#"{
  "Version": "2012-10-17",
  "Statement": [
    {
      "Effect": "Allow",
      "Principal": {
        "Service": "eks.amazonaws.com"
      },
      "Action": "sts:AssumeRole"
    }
  ]
}"#;

/// Name of the cluster service role for `cluster_name`.
pub fn cluster_role_name(cluster_name: &str) -> String {
    format!("{}-eks-hybrid-role", cluster_name)
}

#[async_trait]
/// The role operations the lifecycle needs. This is provided as a trait in order to allow mocks to
/// be used for testing purposes.
pub trait RoleClient: Send + Sync {
    /// Creates the role and returns its ARN.
    async fn create_role(&self, role_name: &str, assume_role_policy: &str) -> Result<String>;
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
    async fn delete_role(&self, role_name: &str) -> Result<()>;
}

/// Concrete implementation of the `RoleClient` trait backed by IAM.
#[derive(Clone, Debug)]
pub struct IamRoleClient {
    client: aws_sdk_iam::Client,
}

impl IamRoleClient {
    pub fn new(client: aws_sdk_iam::Client) -> Self {
        Self { client }
    }
}

fn boxed<E>(err: E) -> Box<dyn std::error::Error + Send + Sync>
where
    E: std::error::Error + Send + Sync + 'static,
{
    Box::new(err)
}

#[async_trait]
impl RoleClient for IamRoleClient {
    async fn create_role(&self, role_name: &str, assume_role_policy: &str) -> Result<String> {
        let output = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(assume_role_policy)
            .send()
            .await
            .map_err(boxed)
            .context(iam_error::CreateRoleSnafu { role_name })?;
        output
            .role()
            .map(|role| role.arn().to_string())
            .context(iam_error::MissingRoleArnSnafu { role_name })
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(boxed)
            .context(iam_error::AttachRolePolicySnafu {
                role_name,
                policy_arn,
            })?;
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(boxed)
            .context(iam_error::DetachRolePolicySnafu {
                role_name,
                policy_arn,
            })?;
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(boxed)
            .context(iam_error::DeleteRoleSnafu { role_name })?;
        Ok(())
    }
}

/// Creates the service role for `cluster_name`, attaches the EKS cluster policy and returns the
/// role's ARN.
#[instrument(skip(client))]
pub async fn create_cluster_role(client: &dyn RoleClient, cluster_name: &str) -> Result<String> {
    let role_name = cluster_role_name(cluster_name);
    let role_arn = client
        .create_role(&role_name, ASSUME_ROLE_POLICY_DOCUMENT)
        .await?;
    client
        .attach_role_policy(&role_name, EKS_CLUSTER_POLICY_ARN)
        .await?;

    event!(Level::INFO, role_arn = %role_arn, "Created cluster role");
    Ok(role_arn)
}

/// Detaches the EKS cluster policy from the service role for `cluster_name` and then deletes the
/// role. A role with the policy still attached cannot be deleted, so a failed detach stops here.
#[instrument(skip(client))]
pub async fn delete_cluster_role(client: &dyn RoleClient, cluster_name: &str) -> Result<()> {
    let role_name = cluster_role_name(cluster_name);
    client
        .detach_role_policy(&role_name, EKS_CLUSTER_POLICY_ARN)
        .await?;
    event!(Level::INFO, role_name = %role_name, "Detached cluster policy from role");

    client.delete_role(&role_name).await?;
    event!(Level::INFO, role_name = %role_name, "Deleted cluster role");
    Ok(())
}

pub mod iam_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Failed to create role '{}': '{}'", role_name, source))]
        CreateRole {
            role_name: String,
            source: Box<dyn std::error::Error + Send + Sync>,
        },

        #[snafu(display("Created role '{}' has no ARN", role_name))]
        MissingRoleArn { role_name: String },

        #[snafu(display(
            "Failed to attach policy '{}' to role '{}': '{}'",
            policy_arn,
            role_name,
            source
        ))]
        AttachRolePolicy {
            role_name: String,
            policy_arn: String,
            source: Box<dyn std::error::Error + Send + Sync>,
        },

        #[snafu(display(
            "Failed to detach policy '{}' from role '{}': '{}'",
            policy_arn,
            role_name,
            source
        ))]
        DetachRolePolicy {
            role_name: String,
            policy_arn: String,
            source: Box<dyn std::error::Error + Send + Sync>,
        },

        #[snafu(display("Failed to delete role '{}': '{}'", role_name, source))]
        DeleteRole {
            role_name: String,
            source: Box<dyn std::error::Error + Send + Sync>,
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockRoleClient;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/hybrid-eks-hybrid-role";

    #[test]
    fn role_name_follows_cluster_name() {
        assert_eq!(cluster_role_name("hybrid"), "hybrid-eks-hybrid-role");
    }

    #[test]
    fn trust_policy_allows_eks_service() {
        let policy: serde_json::Value = serde_json::from_str(ASSUME_ROLE_POLICY_DOCUMENT).unwrap();
        let statement = &policy["Statement"][0];
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Principal"]["Service"], "eks.amazonaws.com");
        assert_eq!(statement["Action"], "sts:AssumeRole");
    }

    #[tokio::test]
    async fn create_attaches_cluster_policy() {
        let mut seq = Sequence::new();
        let mut client = MockRoleClient::new();
        client
            .expect_create_role()
            .with(eq("hybrid-eks-hybrid-role"), eq(ASSUME_ROLE_POLICY_DOCUMENT))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ROLE_ARN.to_string()));
        client
            .expect_attach_role_policy()
            .with(eq("hybrid-eks-hybrid-role"), eq(EKS_CLUSTER_POLICY_ARN))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let arn = create_cluster_role(&client, "hybrid").await.unwrap();
        assert_eq!(arn, ROLE_ARN);
    }

    #[tokio::test]
    async fn create_failure_skips_attach() {
        let mut client = MockRoleClient::new();
        client.expect_create_role().returning(|role_name, _| {
            Err(iam_error::Error::CreateRole {
                role_name: role_name.to_string(),
                source: "EntityAlreadyExists".into(),
            })
        });
        client.expect_attach_role_policy().never();

        let err = create_cluster_role(&client, "hybrid").await.unwrap_err();
        assert!(matches!(err, iam_error::Error::CreateRole { .. }));
    }

    #[tokio::test]
    async fn delete_detaches_before_deleting() {
        let mut seq = Sequence::new();
        let mut client = MockRoleClient::new();
        client
            .expect_detach_role_policy()
            .with(eq("hybrid-eks-hybrid-role"), eq(EKS_CLUSTER_POLICY_ARN))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        client
            .expect_delete_role()
            .with(eq("hybrid-eks-hybrid-role"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        delete_cluster_role(&client, "hybrid").await.unwrap();
    }

    #[tokio::test]
    async fn detach_failure_is_fatal() {
        let mut client = MockRoleClient::new();
        client
            .expect_detach_role_policy()
            .times(1)
            .returning(|role_name, policy_arn| {
                Err(iam_error::Error::DetachRolePolicy {
                    role_name: role_name.to_string(),
                    policy_arn: policy_arn.to_string(),
                    source: "AccessDenied".into(),
                })
            });
        client.expect_delete_role().never();

        let err = delete_cluster_role(&client, "hybrid").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to detach policy 'arn:aws:iam::aws:policy/AmazonEKSClusterPolicy' from role \
             'hybrid-eks-hybrid-role': 'AccessDenied'"
        );
    }
}
