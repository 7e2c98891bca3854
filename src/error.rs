use crate::identity::ClusterIdentity;
use std::path::PathBuf;

/// Every way a single plugin invocation can fail. All of them are terminal for the invocation,
/// the re-invoking client is the one that retries.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PluginError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("obtaining access token (try `gcloud auth application-default login`): {0:#}")]
    TokenSource(anyhow::Error),

    #[error("fetching cluster {cluster}: {status} {body}")]
    ClusterFetch {
        cluster: ClusterIdentity,
        status: u16,
        body: String,
    },

    #[error("talking to the cluster API: {0:#}")]
    Transport(anyhow::Error),

    #[error("corrupted local state at {path:?}: {source:#}")]
    LocalState { path: PathBuf, source: anyhow::Error },

    #[error("aborting access to privileged cluster {0}")]
    Declined(ClusterIdentity),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PluginError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub(crate) fn local_state(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::LocalState {
            path: path.into(),
            source,
        }
    }

    /// Short label used by the top-level handler when logging the failure
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage error",
            Self::TokenSource(_) => "token source error",
            Self::ClusterFetch { .. } | Self::Transport(_) => "cluster lookup error",
            Self::LocalState { .. } => "local state error",
            Self::Declined(_) => "declined",
            Self::Other(_) => "error",
        }
    }
}

pub(crate) type PluginResult<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_fetch_message_carries_status_and_body() {
        let err = PluginError::ClusterFetch {
            cluster: ClusterIdentity::new("proj1", "us-central1", "c1").unwrap(),
            status: 403,
            body: "permission denied".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("403"));
        assert!(message.contains("permission denied"));
        assert!(message.contains("proj1/us-central1/c1"));
        assert_eq!(err.kind(), "cluster lookup error");
    }

    #[test]
    fn test_declined_names_cluster() {
        let err = PluginError::Declined(ClusterIdentity::new("p", "l", "c").unwrap());
        assert_eq!(err.to_string(), "aborting access to privileged cluster p/l/c");
    }
}
