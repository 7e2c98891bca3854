use cluster::GkeClusterApi;
use config::PluginConfig;
use error::{PluginError, PluginResult};
use privilege::{SystemClock, TerminalPrompter};
use token::AmbientTokenSource;

mod cli;
mod cluster;
mod config;
mod docker;
mod error;
mod exec_credential;
mod file_utils;
mod identity;
mod kubeconfig;
mod logging;
mod plugin;
mod privilege;
mod token;


#[tokio::main]
async fn main() {
    if let Err(err) = logging::init() {
        eprintln!("{err:#}");
    }

    let arg0 = std::env::args().next().unwrap_or_default();
    let result = if docker::invoked_as_helper(&arg0) {
        docker_helper_main().await
    } else {
        plugin_main().await
    };

    // Every failure ends the invocation, kubectl and docker only look at the exit code and stderr
    if let Err(err) = result {
        log::error!("{}", failure_message(&err));
        std::process::exit(1);
    }
}

/// Kind label followed by the full error chain
fn failure_message(err: &PluginError) -> String {
    format!("{}: {err:#}", err.kind())
}

async fn plugin_main() -> PluginResult<()> {
    let config = PluginConfig::new()?;
    logging::set_verbose(config.verbose);
    log::debug!("running in {:?} mode", config.mode);

    let clusters = GkeClusterApi::new()?;
    let mut stdout = std::io::stdout().lock();

    plugin::run(
        &config,
        plugin::Collaborators {
            tokens: &AmbientTokenSource,
            clusters: &clusters,
            prompter: &mut TerminalPrompter,
            clock: &SystemClock,
            stdout: &mut stdout,
        },
    )
    .await
}

async fn docker_helper_main() -> PluginResult<()> {
    let action = std::env::args()
        .nth(1)
        .ok_or_else(|| PluginError::usage("expected a credential helper action: get, store, erase or list"))?;
    let action = docker::HelperAction::parse(&action)?;

    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();

    docker::serve(action, &mut stdin, &mut stdout, &AmbientTokenSource).await
}
