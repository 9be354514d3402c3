/// Helper macro to avoid retyping the API group of the node configuration when creating further
/// string constants from it. When given no parameters, this returns the group name. When given a
/// string literal parameter it adds `/parameter` to the end.
#[macro_export]
macro_rules! node_api_group {
    () => {
        "node.eks.aws"
    };
    ($s:literal) => {
        concat!(node_api_group!(), "/", $s)
    };
}

pub const NODE_CONFIG_API_VERSION: &str = node_api_group!("v1alpha1");
pub const NODE_CONFIG_KIND: &str = "NodeConfig";

// Credential provider names understood by `nodeadm install --credential-provider`.
pub const CREDENTIAL_PROVIDER_IAM_ROLES_ANYWHERE: &str = "iam-ra";
pub const CREDENTIAL_PROVIDER_SSM: &str = "ssm";
