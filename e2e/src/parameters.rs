//! Lookups against the SSM parameter store, used for images published as public parameters.

use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, parameter_error::Error>;

#[async_trait]
/// A trait providing an interface to read a single parameter value. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterStore {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    #[instrument(skip(self))]
    async fn get_parameter(&self, name: &str) -> Result<String> {
        let value = self
            .client
            .get_parameter()
            .name(name)
            .send()
            .await
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
            .context(parameter_error::GetParameterSnafu { name })?
            .parameter
            .context(parameter_error::MissingValueSnafu { name })?
            .value
            .context(parameter_error::MissingValueSnafu { name })?;
        Ok(value)
    }
}

pub mod parameter_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to get parameter '{}': '{}'", name, source))]
        GetParameter {
            name: String,
            source: Box<dyn std::error::Error + Send + Sync>,
        },

        #[snafu(display("Parameter '{}' has no value", name))]
        MissingValue { name: String },
    }
}
