use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;
use std::str::FromStr;

/// Processor architectures a test node can run on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    /// The architecture name used by EC2 images and the Amazon Linux SSM parameters.
    pub fn ami_architecture(&self) -> &'static str {
        match self {
            Self::Amd64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }

    /// Determine the instance type to use. For `amd64` use `m5.large` and for `arm64` use
    /// `t4g.large`. Both families are offered in every region the tests run in, so the region
    /// does not change the answer today.
    pub fn instance_type(&self, _region: &str) -> &'static str {
        match self {
            Self::Amd64 => "m5.large",
            Self::Arm64 => "t4g.large",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amd64 => f.write_str("amd64"),
            Self::Arm64 => f.write_str("arm64"),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseArchitectureError {
    #[snafu(display("Invalid architecture '{}', expected one of amd64, arm64", input))]
    UnknownArchitecture { input: String },
}

impl FromStr for Architecture {
    type Err = ParseArchitectureError;

    /// Accepts both the short names and the EC2 names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" | "x86_64" => Ok(Self::Amd64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => UnknownArchitectureSnafu { input: s }.fail(),
        }
    }
}
