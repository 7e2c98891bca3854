use crate::{
    cli::Cli,
    error::{PluginError, PluginResult},
    identity::ClusterIdentity,
    kubeconfig::LoadingRules,
};
use anyhow::{ensure, Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Write the cluster's endpoint, auth hook and context into the kubeconfig
    Install,
    /// Print an ExecCredential, invoked by kubectl through the installed hook
    Get,
    /// Blank the cluster's kubeconfig entries
    Clear,
    /// Register the docker credential helper
    ConfigureDocker,
}

/// All parsed CLI arguments and environment lookups, coalesced into a single struct which is
/// passed to every component instead of consulting flags directly
#[derive(Clone, Debug)]
pub(crate) struct PluginConfig {
    pub(crate) mode: Mode,
    pub(crate) identity: Option<ClusterIdentity>,
    /// Raw --location, the only identity component configure-docker looks at
    pub(crate) location: Option<String>,
    pub(crate) verbose: bool,
    pub(crate) skip_privilege_check: bool,
    pub(crate) kubeconfig: LoadingRules,
    /// Where privileged cluster cooldown records are kept
    pub(crate) scratch_dir: PathBuf,
    /// What the installed kubeconfig hook executes
    pub(crate) hook_command: String,
}

impl PluginConfig {
    pub(crate) fn new() -> PluginResult<Self> {
        let cli = match Cli::try_parse() {
            Ok(cli) => cli,
            // --help and --version
            Err(err) if !err.use_stderr() => err.exit(),
            Err(err) => return Err(PluginError::usage(err.render().to_string().trim_end())),
        };

        Self::parse_from_cli(cli)
    }

    pub(crate) fn parse_from_cli(cli: Cli) -> PluginResult<Self> {
        let mode = parse_mode(&cli).map_err(|err| PluginError::usage(format!("{err:#}")))?;
        let identity = parse_identity(&cli, mode).map_err(|err| PluginError::usage(format!("{err:#}")))?;

        Ok(Self {
            mode,
            identity,
            location: cli.location,
            verbose: cli.verbose,
            skip_privilege_check: cli.skip_privilege_check,
            kubeconfig: LoadingRules::from_env(cli.kubeconfig).context("resolving kubeconfig location")?,
            scratch_dir: std::env::temp_dir(),
            hook_command: hook_command().context("resolving plugin executable")?,
        })
    }

    /// The cluster this invocation is about. Always present outside of configure-docker.
    pub(crate) fn identity(&self) -> PluginResult<&ClusterIdentity> {
        self.identity
            .as_ref()
            .ok_or_else(|| PluginError::usage("must pass --project and --location and --cluster"))
    }
}

fn parse_mode(cli: &Cli) -> Result<Mode> {
    ensure!(!(cli.get && cli.clear), "cannot pass both --get and --clear");
    ensure!(
        !(cli.configure_docker && (cli.get || cli.clear)),
        "--configure-docker cannot be combined with --get or --clear"
    );

    Ok(if cli.get {
        Mode::Get
    } else if cli.clear {
        Mode::Clear
    } else if cli.configure_docker {
        Mode::ConfigureDocker
    } else {
        Mode::Install
    })
}

fn parse_identity(cli: &Cli, mode: Mode) -> Result<Option<ClusterIdentity>> {
    match (&cli.project, &cli.location, &cli.cluster) {
        (Some(project), Some(location), Some(cluster)) => Ok(Some(ClusterIdentity::new(project, location, cluster)?)),
        _ => {
            ensure!(mode == Mode::ConfigureDocker, "must pass --project and --location and --cluster");
            Ok(None)
        }
    }
}

/// kubectl runs the hook through PATH when we were run through PATH, otherwise it needs the
/// absolute path since it may run from any working directory
fn hook_command() -> Result<String> {
    let arg0 = std::env::args_os().next().context("no argv[0]")?;
    let arg0 = arg0.to_str().context("argv[0] is not valid unicode")?;

    if !arg0.contains(std::path::is_separator) {
        return Ok(arg0.to_string());
    }

    let exe = std::env::current_exe().context("locating current executable")?;
    Ok(exe.to_str().context("executable path is not valid unicode")?.to_string())
}
