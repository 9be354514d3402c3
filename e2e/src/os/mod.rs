//! The operating systems a hybrid test node can boot, one `NodeOs` value per OS and architecture
//! pairing.

mod amazonlinux;
mod rhel;

pub use amazonlinux::AmazonLinux2023;
pub use rhel::{RedHat, RhelCredentials, RhelRelease};

use crate::arch::Architecture;
use crate::catalog::ImageCatalog;
use crate::parameters::ParameterStore;
use crate::userdata::UserDataInput;

use async_trait::async_trait;
use snafu::{OptionExt, Snafu};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, os_error::Error>;

/// The image lookup services an OS may need to find its boot image.
#[derive(Clone, Copy)]
pub struct ImageClients<'a> {
    pub catalog: &'a dyn ImageCatalog,
    pub parameters: &'a dyn ParameterStore,
}

#[async_trait]
/// The capabilities every supported operating system provides to the provisioning plan.
pub trait NodeOs: Send + Sync {
    /// Unique name of this OS and architecture pairing, e.g. `rhel9-arm64`.
    fn name(&self) -> String;

    fn architecture(&self) -> Architecture;

    fn instance_type(&self, region: &str) -> &'static str {
        self.architecture().instance_type(region)
    }

    /// Finds the image to boot. `None` means the lookup succeeded but nothing matched.
    async fn resolve_image(&self, clients: ImageClients<'_>) -> Result<Option<String>>;

    /// Renders the cloud-init user data that installs and starts the node agent.
    fn build_user_data(&self, input: UserDataInput) -> Result<Vec<u8>>;
}

/// Every OS and architecture pairing the tests know how to boot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum OsVariant {
    AmazonLinux2023Amd64,
    AmazonLinux2023Arm64,
    Rhel8Amd64,
    Rhel8Arm64,
    Rhel9Amd64,
    Rhel9Arm64,
}

impl OsVariant {
    pub const ALL: [OsVariant; 6] = [
        Self::AmazonLinux2023Amd64,
        Self::AmazonLinux2023Arm64,
        Self::Rhel8Amd64,
        Self::Rhel8Arm64,
        Self::Rhel9Amd64,
        Self::Rhel9Arm64,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AmazonLinux2023Amd64 => "al23-amd64",
            Self::AmazonLinux2023Arm64 => "al23-arm64",
            Self::Rhel8Amd64 => "rhel8-amd64",
            Self::Rhel8Arm64 => "rhel8-arm64",
            Self::Rhel9Amd64 => "rhel9-amd64",
            Self::Rhel9Arm64 => "rhel9-arm64",
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            Self::AmazonLinux2023Amd64 | Self::Rhel8Amd64 | Self::Rhel9Amd64 => {
                Architecture::Amd64
            }
            Self::AmazonLinux2023Arm64 | Self::Rhel8Arm64 | Self::Rhel9Arm64 => {
                Architecture::Arm64
            }
        }
    }

    /// Builds the OS value for this variant. RHEL variants need subscription credentials.
    pub fn build(&self, rhel_credentials: Option<&RhelCredentials>) -> Result<Box<dyn NodeOs>> {
        let arch = self.architecture();
        let release = match self {
            Self::AmazonLinux2023Amd64 | Self::AmazonLinux2023Arm64 => {
                return Ok(Box::new(AmazonLinux2023::new(arch)));
            }
            Self::Rhel8Amd64 | Self::Rhel8Arm64 => RhelRelease::Rhel8,
            Self::Rhel9Amd64 | Self::Rhel9Arm64 => RhelRelease::Rhel9,
        };
        let credentials = rhel_credentials.context(os_error::MissingRhelCredentialsSnafu {
            variant: self.name(),
        })?;
        Ok(Box::new(RedHat::new(release, arch, credentials.clone())))
    }
}

impl fmt::Display for OsVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Snafu)]
pub enum ParseOsVariantError {
    #[snafu(display("Unknown OS '{}', expected one of {}", input, known))]
    UnknownOs { input: String, known: String },
}

impl FromStr for OsVariant {
    type Err = ParseOsVariantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == s)
            .context(UnknownOsSnafu {
                input: s,
                known: Self::ALL.map(|variant| variant.name()).join(", "),
            })
    }
}

/// The OS values for a test run, indexed by name.
pub struct OsRegistry {
    entries: BTreeMap<&'static str, Box<dyn NodeOs>>,
}

impl OsRegistry {
    /// Builds every variant in `variants`. A RHEL variant without credentials fails the whole
    /// registry, since the caller asked for it explicitly.
    pub fn new(variants: &[OsVariant], rhel_credentials: Option<&RhelCredentials>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for variant in variants {
            entries.insert(variant.name(), variant.build(rhel_credentials)?);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&dyn NodeOs> {
        self.entries.get(name).map(|os| &**os)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn NodeOs> {
        self.entries.values().map(|os| &**os)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub mod os_error {
    use crate::catalog::catalog_error;
    use crate::parameters::parameter_error;
    use crate::userdata::userdata_error;
    use snafu::Snafu;

    /// Lookup and rendering failures pass through with their original message.
    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("{}", source), context(false))]
        Catalog { source: catalog_error::Error },

        #[snafu(display("{}", source), context(false))]
        Parameter { source: parameter_error::Error },

        #[snafu(display("{}", source), context(false))]
        UserData { source: userdata_error::Error },

        #[snafu(display("'{}' requires RHEL subscription credentials", variant))]
        MissingRhelCredentials { variant: String },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn credentials() -> RhelCredentials {
        RhelCredentials::new("rhel-user", "rhel-pass")
    }

    #[test]
    fn variant_names_round_trip() {
        for variant in OsVariant::ALL {
            assert_eq!(variant.name().parse::<OsVariant>().unwrap(), variant);
        }
        let err = "ubuntu22-amd64".parse::<OsVariant>().unwrap_err();
        assert!(err.to_string().contains("al23-amd64"));
    }

    #[test]
    fn built_os_matches_variant() {
        let credentials = credentials();
        for variant in OsVariant::ALL {
            let os = variant.build(Some(&credentials)).unwrap();
            assert_eq!(os.name(), variant.name());
            assert_eq!(os.architecture(), variant.architecture());
        }
    }

    #[test]
    fn instance_types_follow_architecture() {
        let registry = OsRegistry::new(&OsVariant::ALL, Some(&credentials())).unwrap();
        assert_eq!(registry.len(), 6);
        for os in registry.iter() {
            let expected = match os.architecture() {
                Architecture::Amd64 => "m5.large",
                Architecture::Arm64 => "t4g.large",
            };
            assert_eq!(os.instance_type("us-west-2"), expected, "{}", os.name());
        }
    }

    #[test]
    fn rhel_requires_credentials() {
        assert!(OsVariant::AmazonLinux2023Arm64.build(None).is_ok());
        assert!(matches!(
            OsVariant::Rhel9Amd64.build(None),
            Err(os_error::Error::MissingRhelCredentials { .. })
        ));
        assert!(OsRegistry::new(&[OsVariant::Rhel8Arm64], None).is_err());
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = OsRegistry::new(
            &[OsVariant::Rhel9Arm64, OsVariant::AmazonLinux2023Amd64],
            Some(&credentials()),
        )
        .unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["al23-amd64", "rhel9-arm64"]
        );
        assert_eq!(registry.get("rhel9-arm64").unwrap().name(), "rhel9-arm64");
        assert!(registry.get("rhel8-arm64").is_none());
    }
}
