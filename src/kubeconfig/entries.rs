//! The three kubeconfig stanzas written for a cluster, in their on-disk shape

use crate::{cluster::ClusterDescriptor, exec_credential::EXEC_API_VERSION, identity::ClusterIdentity};
use anyhow::{ensure, Context, Result};
use base64::{engine::general_purpose::STANDARD as base64_standard, Engine as _};
use serde::{Deserialize, Serialize};

pub(crate) const INSTALL_HINT: &str = "cargo install gke-auto";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum InteractiveMode {
    Never,
    IfAvailable,
    Always,
}

/// `users[].user`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct AuthEntry {
    pub(crate) exec: ExecConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecConfig {
    pub(crate) api_version: String,
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) install_hint: String,
    pub(crate) interactive_mode: InteractiveMode,
    pub(crate) provide_cluster_info: bool,
}

/// What kubectl should run to get credentials for a cluster
pub(crate) struct HookSpec<'a> {
    pub(crate) command: &'a str,
    pub(crate) identity: &'a ClusterIdentity,
    pub(crate) verbose: bool,
    pub(crate) skip_privilege_check: bool,
    pub(crate) interactive_mode_required: bool,
}

impl AuthEntry {
    /// Re-invokes this program in get mode, so no secret ever lands in the kubeconfig
    pub(crate) fn exec_hook(hook: &HookSpec) -> Self {
        let mut args = vec![
            "--get".to_string(),
            format!("--project={}", hook.identity.project),
            format!("--location={}", hook.identity.location),
            format!("--cluster={}", hook.identity.name),
        ];

        if hook.verbose {
            args.push("--verbose".to_string());
        }

        if hook.skip_privilege_check {
            args.push("--skip-privilege-check".to_string());
        }

        Self {
            exec: ExecConfig {
                api_version: EXEC_API_VERSION.to_string(),
                command: hook.command.to_string(),
                args,
                install_hint: INSTALL_HINT.to_string(),
                interactive_mode: if hook.interactive_mode_required {
                    InteractiveMode::Always
                } else {
                    InteractiveMode::Never
                },
                provide_cluster_info: false,
            },
        }
    }
}

/// `clusters[].cluster`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct EndpointEntry {
    pub(crate) server: String,
    #[serde(rename = "certificate-authority-data")]
    pub(crate) certificate_authority_data: String,
}

impl EndpointEntry {
    /// Fails when the CA doesn't decode. Dropping it instead would leave kubectl without a way to
    /// verify the API server.
    pub(crate) fn from_descriptor(descriptor: &ClusterDescriptor) -> Result<Self> {
        ensure!(!descriptor.endpoint.is_empty(), "cluster has no endpoint");

        let ca = base64_standard
            .decode(descriptor.ca_certificate_base64().trim())
            .context("decoding CA certificate")?;
        ensure!(!ca.is_empty(), "cluster has an empty CA certificate");

        Ok(Self {
            server: format!("https://{}", descriptor.endpoint),
            certificate_authority_data: base64_standard.encode(ca),
        })
    }
}

/// `contexts[].context`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ContextEntry {
    pub(crate) cluster: String,
    pub(crate) user: String,
}

impl ContextEntry {
    pub(crate) fn for_key(key: &str) -> Self {
        Self {
            cluster: key.to_string(),
            user: key.to_string(),
        }
    }
}
