mod error;
mod validation;

pub use self::error::Error as NodeConfigError;
pub use self::validation::{ValidationError, Validator};
use self::error::Result;

use crate::constants::{
    CREDENTIAL_PROVIDER_IAM_ROLES_ANYWHERE, CREDENTIAL_PROVIDER_SSM, NODE_CONFIG_API_VERSION,
    NODE_CONFIG_KIND,
};

use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::fmt;

/// NodeConfig is the configuration document consumed by nodeadm when joining a node to a cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub spec: NodeConfigSpec,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigSpec {
    #[serde(default)]
    pub cluster: ClusterDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<HybridOptions>,
}

/// Identity of the cluster the node joins. Which of these fields are required depends on the
/// node's `CredentialMode`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_server_endpoint: String,
    /// The cluster CA bundle. Carried base64-encoded in the document.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_outpost: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_roles_anywhere: Option<IamRolesAnywhere>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssm: Option<Ssm>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamRolesAnywhere {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    #[serde(default)]
    pub trust_anchor_arn: String,
    #[serde(default)]
    pub profile_arn: String,
    #[serde(default)]
    pub role_arn: String,
    #[serde(default)]
    pub assume_role_arn: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ssm {
    #[serde(default)]
    pub activation_code: String,
    #[serde(default)]
    pub activation_id: String,
}

/// CredentialMode is the mechanism a node uses to obtain the credentials it joins the cluster with.
/// It is always derived from the populated fields of a `NodeConfig`, never stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CredentialMode {
    /// The node talks to the cluster API directly using the endpoint and CA in the document.
    Direct,
    /// The node belongs to a local cluster on an Outpost.
    Outpost,
    /// A hybrid node authenticating through IAM Roles Anywhere.
    RemoteIam,
    /// A hybrid node registered as an SSM managed instance.
    RemoteManagedAgent,
}

impl CredentialMode {
    /// The `nodeadm` credential provider matching this mode, for the hybrid modes.
    pub fn credential_provider(&self) -> Option<&'static str> {
        match self {
            Self::RemoteIam => Some(CREDENTIAL_PROVIDER_IAM_ROLES_ANYWHERE),
            Self::RemoteManagedAgent => Some(CREDENTIAL_PROVIDER_SSM),
            Self::Direct | Self::Outpost => None,
        }
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Outpost => "outpost",
            Self::RemoteIam => "iam-roles-anywhere",
            Self::RemoteManagedAgent => "ssm",
        };
        f.write_str(name)
    }
}

impl NodeConfig {
    /// Parses a NodeConfig from a YAML (or JSON) document and checks its type metadata.
    pub fn from_yaml(document: &str) -> Result<Self> {
        let config: NodeConfig = serde_yaml::from_str(document).context(error::ParseSnafu)?;
        ensure!(
            config.api_version == NODE_CONFIG_API_VERSION && config.kind == NODE_CONFIG_KIND,
            error::UnsupportedTypeSnafu {
                api_version: config.api_version.clone(),
                kind: config.kind.clone(),
            }
        );
        Ok(config)
    }

    /// Serializes the config back to the YAML payload handed to nodeadm.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context(error::SerializeSnafu)
    }

    pub fn is_outpost_node(&self) -> bool {
        self.spec.cluster.enable_outpost.unwrap_or(false)
    }

    pub fn is_hybrid_node(&self) -> bool {
        self.spec.hybrid.is_some()
    }

    pub fn is_iam_roles_anywhere(&self) -> bool {
        self.spec
            .hybrid
            .as_ref()
            .map_or(false, |hybrid| hybrid.iam_roles_anywhere.is_some())
    }

    pub fn is_ssm(&self) -> bool {
        self.spec
            .hybrid
            .as_ref()
            .map_or(false, |hybrid| hybrid.ssm.is_some())
    }

    /// Derives the credential mode from which parts of the document are populated. Outpost wins
    /// over hybrid, and a hybrid document carrying both credential blocks reports IAM Roles
    /// Anywhere (validation rejects that combination).
    pub fn credential_mode(&self) -> CredentialMode {
        if self.is_outpost_node() {
            CredentialMode::Outpost
        } else if self.is_hybrid_node() {
            if self.is_iam_roles_anywhere() {
                CredentialMode::RemoteIam
            } else {
                CredentialMode::RemoteManagedAgent
            }
        } else {
            CredentialMode::Direct
        }
    }

    /// Runs the validation rule chain for this config's credential mode.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        Validator::new(self).validate(self)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|encoded| STANDARD.decode(encoded.trim()).map_err(de::Error::custom))
            .transpose()
    }
}
