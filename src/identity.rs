use anyhow::{ensure, Result};
use std::fmt;

/// Separates the components of the canonical key. Never legal inside a component.
const KEY_SEPARATOR: char = '_';

/// The (project, location, name) triple of a GKE cluster
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ClusterIdentity {
    pub(crate) project: String,
    pub(crate) location: String,
    pub(crate) name: String,
}

impl ClusterIdentity {
    pub(crate) fn new(project: &str, location: &str, name: &str) -> Result<Self> {
        validate_component("project", project)?;
        validate_component("location", location)?;
        validate_component("cluster", name)?;

        Ok(Self {
            project: project.to_string(),
            location: location.to_string(),
            name: name.to_string(),
        })
    }

    /// The name under which the user, cluster and context entries are stored in the kubeconfig,
    /// same format as gcloud so existing tooling recognizes it
    pub(crate) fn key(&self) -> String {
        format!(
            "gke{sep}{}{sep}{}{sep}{}",
            self.project,
            self.location,
            self.name,
            sep = KEY_SEPARATOR
        )
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.location, self.name)
    }
}

fn validate_component(what: &str, value: &str) -> Result<()> {
    ensure!(!value.is_empty(), "--{what} must not be empty");
    ensure!(
        !value.contains(KEY_SEPARATOR),
        "--{what} {value:?} must not contain {KEY_SEPARATOR:?}"
    );
    ensure!(
        !value.contains(std::path::is_separator),
        "--{what} {value:?} must not contain a path separator"
    );
    ensure!(
        value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':')),
        "--{what} {value:?} contains characters not allowed in a GKE resource name"
    );

    Ok(())
}
