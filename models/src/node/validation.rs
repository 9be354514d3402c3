/*!
Validation of a `NodeConfig` against the rules of its credential mode.

Every mode maps to a fixed, ordered list of rules. The common rules always run first and the first
failing rule's error is returned, so the order of the lists decides which problem is reported when
a document has several.
!*/

use super::{CredentialMode, IamRolesAnywhere, NodeConfig, Ssm};

use snafu::{ensure, Snafu};

/// A single validation predicate.
type Rule = fn(&NodeConfig) -> Result<()>;

type Result<T> = std::result::Result<T, ValidationError>;

const COMMON_RULES: &[Rule] = &[cluster_name];

const DIRECT_RULES: &[Rule] = &[api_server_endpoint, certificate_authority, cidr];

const OUTPOST_RULES: &[Rule] = &[cluster_id];

const REMOTE_RULES: &[Rule] = &[
    region,
    credential_block_present,
    credential_blocks_exclusive,
    iam_roles_anywhere_assume_role_arn,
    iam_roles_anywhere_role_arn,
    iam_roles_anywhere_profile_arn,
    iam_roles_anywhere_trust_anchor_arn,
    ssm_activation_code,
    ssm_activation_id,
];

impl CredentialMode {
    /// The rules applied for this mode, after the common rules.
    fn rules(&self) -> &'static [Rule] {
        match self {
            Self::Direct => DIRECT_RULES,
            Self::Outpost => OUTPOST_RULES,
            // Both remote modes share one chain since it has to catch a document carrying neither
            // or both credential blocks.
            Self::RemoteIam | Self::RemoteManagedAgent => REMOTE_RULES,
        }
    }
}

/// Validator holds the rule chain selected for one credential mode.
#[derive(Clone, Debug)]
pub struct Validator {
    mode: CredentialMode,
    rules: Vec<Rule>,
}

impl Validator {
    /// Selects the rule chain for the config's credential mode.
    pub fn new(config: &NodeConfig) -> Self {
        Self::for_mode(config.credential_mode())
    }

    pub fn for_mode(mode: CredentialMode) -> Self {
        let rules = COMMON_RULES.iter().chain(mode.rules()).copied().collect();
        Validator { mode, rules }
    }

    pub fn mode(&self) -> CredentialMode {
        self.mode
    }

    /// Runs the chain in order and stops at the first violation.
    pub fn validate(&self, config: &NodeConfig) -> Result<()> {
        for rule in &self.rules {
            rule(config)?;
        }
        Ok(())
    }
}

#[derive(Debug, Snafu, Eq, PartialEq)]
#[snafu(visibility(pub))]
pub enum ValidationError {
    #[snafu(display("{} is missing in cluster configuration", field))]
    ClusterFieldMissing { field: &'static str },

    #[snafu(display(
        "Either IAMRolesAnywhere or SSM must be provided for hybrid node configuration"
    ))]
    NoCredentialBlock {},

    #[snafu(display(
        "Only one of IAMRolesAnywhere or SSM must be provided for hybrid node configuration"
    ))]
    MultipleCredentialBlocks {},

    #[snafu(display("{} is missing in hybrid iam roles anywhere configuration", field))]
    IamRolesAnywhereFieldMissing { field: &'static str },

    #[snafu(display("{} is missing in hybrid ssm configuration", field))]
    SsmFieldMissing { field: &'static str },
}

fn cluster_name(config: &NodeConfig) -> Result<()> {
    ensure!(
        !config.spec.cluster.name.is_empty(),
        ClusterFieldMissingSnafu { field: "Name" }
    );
    Ok(())
}

fn api_server_endpoint(config: &NodeConfig) -> Result<()> {
    ensure!(
        !config.spec.cluster.api_server_endpoint.is_empty(),
        ClusterFieldMissingSnafu {
            field: "Apiserver endpoint"
        }
    );
    Ok(())
}

fn certificate_authority(config: &NodeConfig) -> Result<()> {
    let present = config
        .spec
        .cluster
        .certificate_authority
        .as_ref()
        .map_or(false, |ca| !ca.is_empty());
    ensure!(
        present,
        ClusterFieldMissingSnafu {
            field: "Certificate authority"
        }
    );
    Ok(())
}

fn cidr(config: &NodeConfig) -> Result<()> {
    ensure!(
        !config.spec.cluster.cidr.is_empty(),
        ClusterFieldMissingSnafu { field: "CIDR" }
    );
    Ok(())
}

fn cluster_id(config: &NodeConfig) -> Result<()> {
    ensure!(
        !config.spec.cluster.id.is_empty(),
        ClusterFieldMissingSnafu {
            field: "Cluster ID"
        }
    );
    Ok(())
}

fn region(config: &NodeConfig) -> Result<()> {
    ensure!(
        !config.spec.cluster.region.is_empty(),
        ClusterFieldMissingSnafu { field: "Region" }
    );
    Ok(())
}

fn credential_block_present(config: &NodeConfig) -> Result<()> {
    ensure!(
        config.is_iam_roles_anywhere() || config.is_ssm(),
        NoCredentialBlockSnafu
    );
    Ok(())
}

fn credential_blocks_exclusive(config: &NodeConfig) -> Result<()> {
    ensure!(
        !(config.is_iam_roles_anywhere() && config.is_ssm()),
        MultipleCredentialBlocksSnafu
    );
    Ok(())
}

fn iam_roles_anywhere(config: &NodeConfig) -> Option<&IamRolesAnywhere> {
    config
        .spec
        .hybrid
        .as_ref()
        .and_then(|hybrid| hybrid.iam_roles_anywhere.as_ref())
}

fn ssm(config: &NodeConfig) -> Option<&Ssm> {
    config
        .spec
        .hybrid
        .as_ref()
        .and_then(|hybrid| hybrid.ssm.as_ref())
}

/// Requires a non-empty value when the IAM Roles Anywhere block is present.
fn require_iam_roles_anywhere_field(
    config: &NodeConfig,
    field: &'static str,
    value: fn(&IamRolesAnywhere) -> &str,
) -> Result<()> {
    if let Some(block) = iam_roles_anywhere(config) {
        ensure!(
            !value(block).is_empty(),
            IamRolesAnywhereFieldMissingSnafu { field }
        );
    }
    Ok(())
}

fn iam_roles_anywhere_assume_role_arn(config: &NodeConfig) -> Result<()> {
    require_iam_roles_anywhere_field(config, "AssumeRoleARN", |b| &b.assume_role_arn)
}

fn iam_roles_anywhere_role_arn(config: &NodeConfig) -> Result<()> {
    require_iam_roles_anywhere_field(config, "RoleARN", |b| &b.role_arn)
}

fn iam_roles_anywhere_profile_arn(config: &NodeConfig) -> Result<()> {
    require_iam_roles_anywhere_field(config, "ProfileARN", |b| &b.profile_arn)
}

fn iam_roles_anywhere_trust_anchor_arn(config: &NodeConfig) -> Result<()> {
    require_iam_roles_anywhere_field(config, "TrustAnchorARN", |b| &b.trust_anchor_arn)
}

fn ssm_activation_code(config: &NodeConfig) -> Result<()> {
    if let Some(block) = ssm(config) {
        ensure!(
            !block.activation_code.is_empty(),
            SsmFieldMissingSnafu {
                field: "ActivationCode"
            }
        );
    }
    Ok(())
}

fn ssm_activation_id(config: &NodeConfig) -> Result<()> {
    if let Some(block) = ssm(config) {
        ensure!(
            !block.activation_id.is_empty(),
            SsmFieldMissingSnafu {
                field: "ActivationID"
            }
        );
    }
    Ok(())
}
