use super::{ImageClients, NodeOs, Result};
use crate::arch::Architecture;
use crate::userdata::{self, UserDataInput, AMAZON_LINUX_2023_CLOUD_INIT};

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

/// Public SSM parameters that always point at the newest Amazon Linux 2023 image.
const AL2023_IMAGE_PARAMETER_PREFIX: &str =
    "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-";

#[derive(Serialize)]
struct CloudInitData<'a> {
    files: &'a [userdata::File],
    nodeadm_config: &'a str,
    nodeadm_url: &'a str,
    kubernetes_version: &'a str,
    provider: &'a str,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AmazonLinux2023 {
    arch: Architecture,
}

impl AmazonLinux2023 {
    pub fn new(arch: Architecture) -> Self {
        Self { arch }
    }

    fn image_parameter(&self) -> String {
        format!(
            "{}{}",
            AL2023_IMAGE_PARAMETER_PREFIX,
            self.arch.ami_architecture()
        )
    }
}

#[async_trait]
impl NodeOs for AmazonLinux2023 {
    fn name(&self) -> String {
        format!("al23-{}", self.arch)
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    #[instrument(skip(self, clients), fields(os = %self.name()))]
    async fn resolve_image(&self, clients: ImageClients<'_>) -> Result<Option<String>> {
        let image_id = clients
            .parameters
            .get_parameter(&self.image_parameter())
            .await?;
        Ok(Some(image_id))
    }

    fn build_user_data(&self, mut input: UserDataInput) -> Result<Vec<u8>> {
        userdata::populate_base_scripts(&mut input);
        let data = CloudInitData {
            files: &input.files,
            nodeadm_config: &input.nodeadm_config_yaml,
            nodeadm_url: input.nodeadm_urls.for_architecture(self.arch),
            kubernetes_version: &input.kubernetes_version,
            provider: &input.provider,
        };
        Ok(userdata::render(&AMAZON_LINUX_2023_CLOUD_INIT, data)?)
    }
}
