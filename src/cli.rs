use clap::Parser;
use std::path::PathBuf;

/// Keeps kubectl pointed at a GKE cluster and hands it short-lived access tokens on demand
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Name of the project the cluster lives in
    #[clap(long)]
    pub(crate) project: Option<String>,

    /// Location (region or zone) of the cluster
    #[clap(long)]
    pub(crate) location: Option<String>,

    /// Name of the cluster
    #[clap(long)]
    pub(crate) cluster: Option<String>,

    /// Print an ExecCredential for the cluster to stdout. This is what kubectl invokes on every
    /// API call once the cluster has been installed in the kubeconfig.
    #[clap(long, default_value_t = false)]
    pub(crate) get: bool,

    /// Clear the kubeconfig user, cluster and context entries of the cluster
    #[clap(long, default_value_t = false)]
    pub(crate) clear: bool,

    /// Print debugging information about the plugin execution to stderr
    #[clap(long, default_value_t = false)]
    pub(crate) verbose: bool,

    /// Skip checking whether the cluster is privileged. Should only be used in non-interactive
    /// environments.
    #[clap(long, default_value_t = false)]
    pub(crate) skip_privilege_check: bool,

    /// Register this program as the docker credential helper for Google container registries
    #[clap(long, default_value_t = false)]
    pub(crate) configure_docker: bool,

    /// Path of the kubeconfig to use instead of $KUBECONFIG / ~/.kube/config
    #[clap(long)]
    pub(crate) kubeconfig: Option<PathBuf>,
}
