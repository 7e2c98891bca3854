use crate::{
    cluster::ClusterFetcher,
    config::{Mode, PluginConfig},
    docker,
    error::{PluginError, PluginResult},
    exec_credential,
    kubeconfig::{AuthEntry, EndpointEntry, HookSpec, Kubeconfig},
    privilege::{Clock, PrivilegeGate, Prompter},
    token::{TokenSource, CLUSTER_SCOPES},
};
use anyhow::Context;
use std::io::Write;

/// Everything a plugin invocation talks to outside of the filesystem
pub(crate) struct Collaborators<'a> {
    pub(crate) tokens: &'a dyn TokenSource,
    pub(crate) clusters: &'a dyn ClusterFetcher,
    pub(crate) prompter: &'a mut dyn Prompter,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) stdout: &'a mut dyn Write,
}

pub(crate) async fn run(config: &PluginConfig, collaborators: Collaborators<'_>) -> PluginResult<()> {
    match config.mode {
        Mode::Clear => clear(config),
        Mode::ConfigureDocker => configure_docker(config),
        Mode::Get | Mode::Install => authenticate(config, collaborators).await,
    }
}

fn clear(config: &PluginConfig) -> PluginResult<()> {
    let identity = config.identity()?;

    let mut kubeconfig = Kubeconfig::load(&config.kubeconfig)?;
    let path = kubeconfig.clear(&identity.key())?;

    log::info!("Auth config for {identity} cleared from {path:?}");
    Ok(())
}

fn configure_docker(config: &PluginConfig) -> PluginResult<()> {
    let executable = std::env::current_exe().context("locating current executable")?;
    let docker_config = docker::configure::docker_config_path()?;

    docker::configure::configure(&executable, &docker_config, config.location.as_deref())?;
    Ok(())
}

/// Get and install share everything up to the privilege gate, the cluster is looked up fresh
/// and the gate consulted on every single invocation
async fn authenticate(config: &PluginConfig, collaborators: Collaborators<'_>) -> PluginResult<()> {
    let identity = config.identity()?;
    let Collaborators {
        tokens,
        clusters,
        prompter,
        clock,
        stdout,
    } = collaborators;

    let token = tokens.token(CLUSTER_SCOPES).await?;
    let descriptor = clusters.fetch(identity, &token).await?;

    let decision = PrivilegeGate::new(identity, &config.scratch_dir).evaluate(&descriptor, config.skip_privilege_check, clock, prompter)?;
    if !decision.granted {
        return Err(PluginError::Declined(identity.clone()));
    }

    match config.mode {
        Mode::Get => {
            exec_credential::respond(&token, stdout)?;
        }
        _ => {
            let endpoint = EndpointEntry::from_descriptor(&descriptor).with_context(|| format!("cluster {identity}"))?;
            let auth = AuthEntry::exec_hook(&HookSpec {
                command: &config.hook_command,
                identity,
                verbose: config.verbose,
                skip_privilege_check: config.skip_privilege_check,
                interactive_mode_required: decision.interactive_mode_required,
            });

            let mut kubeconfig = Kubeconfig::load(&config.kubeconfig)?;
            let path = kubeconfig.install(&identity.key(), &auth, &endpoint)?;

            log::info!("Auth config for {identity} written to {path:?}");
        }
    }

    Ok(())
}
