use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to parse node configuration: '{}'", source))]
    Parse { source: serde_yaml::Error },

    #[snafu(display("Unable to serialize node configuration: '{}'", source))]
    Serialize { source: serde_yaml::Error },

    #[snafu(display(
        "Unsupported node configuration type '{}/{}'; expected '{}/{}'",
        api_version,
        kind,
        crate::constants::NODE_CONFIG_API_VERSION,
        crate::constants::NODE_CONFIG_KIND
    ))]
    UnsupportedType { api_version: String, kind: String },
}
