use snafu::Snafu;
use std::path::PathBuf;

/// The binary-wide result type.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("Unable to initialize telemetry: {}", source))]
    TelemetryInit {
        source: models::telemetry::TelemetryConfigError,
    },

    #[snafu(display("Unable to read '{}': {}", path.display(), source))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse node configuration '{}': {}", path.display(), source))]
    ParseNodeConfig {
        path: PathBuf,
        source: models::node::NodeConfigError,
    },

    #[snafu(display("{}", source))]
    InvalidNodeConfig {
        source: models::node::ValidationError,
    },

    #[snafu(display("Unable to prepare OS variants: {}", source))]
    OsRegistry { source: e2e::os::os_error::Error },

    #[snafu(display("Unable to write '{}': {}", path.display(), source))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Planning failed for: {}", failed))]
    PlanFailed { failed: String },

    #[snafu(display("{}", source))]
    ClusterRole { source: e2e::iam::iam_error::Error },

    #[snafu(display("{}", source))]
    SigningHelper {
        source: e2e::signing_helper::signing_helper_error::Error,
    },
}
