//! Boot script (cloud-init user data) rendering for test nodes.
//!
//! Each OS family owns a template; the shared pieces, like the node-agent init script, are added
//! to the input's file list before rendering.

use lazy_static::lazy_static;
use minijinja::{Environment, UndefinedBehavior};
use models::node::NodeConfig;
use serde::Serialize;
use snafu::{OptionExt, ResultExt};
use tracing::{event, Level};

use crate::arch::Architecture;

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, userdata_error::Error>;

pub const NODEADM_INIT_SCRIPT_PATH: &str = "/tmp/nodeadm-init.sh";
const NODEADM_INIT_SCRIPT_PERMISSIONS: &str = "0755";
const NODEADM_INIT_SCRIPT: &str = include_str!("../templates/nodeadm-init.sh");

/// A named template body.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Template {
    name: &'static str,
    body: &'static str,
}

pub const AMAZON_LINUX_2023_CLOUD_INIT: Template = Template {
    name: "al2023/cloud-init.txt",
    body: include_str!("../templates/al2023/cloud-init.txt"),
};

pub const RHEL_8_CLOUD_INIT: Template = Template {
    name: "rhel/8/cloud-init.txt",
    body: include_str!("../templates/rhel/8/cloud-init.txt"),
};

pub const RHEL_9_CLOUD_INIT: Template = Template {
    name: "rhel/9/cloud-init.txt",
    body: include_str!("../templates/rhel/9/cloud-init.txt"),
};

lazy_static! {
    static ref TEMPLATE_ENV: Environment<'static> = {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env
    };
}

/// Node-agent download locations, one per architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct NodeadmUrls {
    pub amd: String,
    pub arm: String,
}

impl NodeadmUrls {
    pub fn for_architecture(&self, arch: Architecture) -> &str {
        match arch {
            Architecture::Amd64 => &self.amd,
            Architecture::Arm64 => &self.arm,
        }
    }
}

/// A file written onto the node before the boot commands run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct File {
    pub path: String,
    pub content: String,
    pub permissions: String,
}

/// Everything a boot script needs beyond what the OS variant itself knows.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UserDataInput {
    pub kubernetes_version: String,
    pub nodeadm_urls: NodeadmUrls,
    pub nodeadm_config_yaml: String,
    pub provider: String,
    pub files: Vec<File>,
}

impl UserDataInput {
    /// Builds the input for a node joining with `config`. Only hybrid configurations carry a
    /// credential provider, so any other mode is rejected.
    pub fn from_node_config(
        config: &NodeConfig,
        kubernetes_version: &str,
        nodeadm_urls: NodeadmUrls,
    ) -> Result<Self> {
        let mode = config.credential_mode();
        let provider = mode
            .credential_provider()
            .context(userdata_error::NoCredentialProviderSnafu {
                mode: mode.to_string(),
            })?;
        let nodeadm_config_yaml = config
            .to_yaml()
            .context(userdata_error::SerializeNodeConfigSnafu)?;

        Ok(Self {
            kubernetes_version: kubernetes_version.to_string(),
            nodeadm_urls,
            nodeadm_config_yaml,
            provider: provider.to_string(),
            files: Vec::new(),
        })
    }
}

/// Adds the scripts every boot script relies on to the input's file list.
pub fn populate_base_scripts(input: &mut UserDataInput) {
    input.files.push(File {
        path: NODEADM_INIT_SCRIPT_PATH.to_string(),
        content: NODEADM_INIT_SCRIPT.to_string(),
        permissions: NODEADM_INIT_SCRIPT_PERMISSIONS.to_string(),
    });
}

/// Renders `template` against `data`. Any field the template references but `data` lacks is an
/// error rather than an empty string.
pub fn render<S: Serialize>(template: &Template, data: S) -> Result<Vec<u8>> {
    let rendered = TEMPLATE_ENV
        .render_named_str(template.name, template.body, data)
        .context(userdata_error::RenderSnafu {
            template: template.name,
        })?;
    event!(
        Level::DEBUG,
        template = template.name,
        bytes = rendered.len(),
        "Rendered boot script"
    );
    Ok(rendered.into_bytes())
}

pub mod userdata_error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to render template '{}': '{}'", template, source))]
        Render {
            template: String,
            source: minijinja::Error,
        },

        #[snafu(display("Node configuration in '{}' mode has no credential provider", mode))]
        NoCredentialProvider { mode: String },

        #[snafu(display("Unable to serialize node configuration: '{}'", source))]
        SerializeNodeConfig {
            source: models::node::NodeConfigError,
        },
    }
}
