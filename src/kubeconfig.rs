//! kubectl's kubeconfig, loaded the way kubectl loads it and written back one file at a time.
//!
//! There is no locking between invocations. Every write atomically replaces the file, so kubectl
//! never reads a torn kubeconfig, but two invocations racing on the same file are
//! last-writer-wins.

use crate::file_utils;
use anyhow::{Context, Result};
use fn_error_context::context;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub(crate) mod entries;
pub(crate) mod merge;

pub(crate) use entries::{AuthEntry, EndpointEntry, HookSpec};

pub(crate) const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Which files make up the kubeconfig, highest precedence first
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LoadingRules {
    pub(crate) precedence: Vec<PathBuf>,
}

impl LoadingRules {
    /// An explicit path wins, then $KUBECONFIG, then ~/.kube/config
    pub(crate) fn from_env(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(explicit) = explicit {
            return Ok(Self {
                precedence: vec![explicit],
            });
        }

        if let Some(var) = std::env::var_os(KUBECONFIG_ENV) {
            let precedence = std::env::split_paths(&var)
                .filter(|path| !path.as_os_str().is_empty())
                .collect::<Vec<_>>();
            if !precedence.is_empty() {
                return Ok(Self { precedence });
            }
        }

        Ok(Self {
            precedence: vec![recommended_home_file()?],
        })
    }
}

pub(crate) fn recommended_home_file() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("cannot determine home directory")?
        .join(".kube")
        .join("config"))
}

#[derive(Debug)]
pub(crate) struct KubeconfigFile {
    pub(crate) path: PathBuf,
    pub(crate) exists: bool,
    pub(crate) document: Value,
}

impl KubeconfigFile {
    #[context("loading kubeconfig {:?}", path)]
    fn load(path: &Path) -> Result<Self> {
        let (exists, document) = match file_utils::read_optional_file_to_string(path)? {
            None => (false, Value::Null),
            Some(contents) if contents.trim().is_empty() => (true, Value::Null),
            Some(contents) => (true, serde_yaml::from_str(&contents).context("parsing yaml")?),
        };

        Ok(Self {
            path: path.to_path_buf(),
            exists,
            document,
        })
    }

    fn defines_user(&self, name: &str) -> bool {
        merge::get_named(&self.document, merge::USERS, name).is_some()
    }

    #[context("writing kubeconfig {:?}", self.path)]
    fn persist(&self) -> Result<()> {
        let document = if self.document.is_null() {
            merge::empty_document()
        } else {
            self.document.clone()
        };

        file_utils::write_atomically(&self.path, serde_yaml::to_string(&document).context("serializing yaml")?.as_bytes())
    }
}

#[derive(Debug)]
pub(crate) struct Kubeconfig {
    pub(crate) files: Vec<KubeconfigFile>,
}

impl Kubeconfig {
    pub(crate) fn load(rules: &LoadingRules) -> Result<Self> {
        Ok(Self {
            files: rules
                .precedence
                .iter()
                .map(|path| KubeconfigFile::load(path))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// The file whose stanzas for `key` get rewritten: the one that already defines the user, else
    /// the first file that exists, else the last one listed. Same rule kubectl applies.
    pub(crate) fn target_index(&self, key: &str) -> usize {
        self.files
            .iter()
            .position(|file| file.defines_user(key))
            .or_else(|| self.files.iter().position(|file| file.exists))
            .unwrap_or(self.files.len().saturating_sub(1))
    }

    /// Points the kubeconfig at the cluster and persists the one file that changed
    pub(crate) fn install(&mut self, key: &str, auth: &AuthEntry, endpoint: &EndpointEntry) -> Result<&Path> {
        self.edit(key, |document| merge::install(document, key, auth, endpoint))
    }

    /// Blanks the cluster's stanzas and persists the one file that changed
    pub(crate) fn clear(&mut self, key: &str) -> Result<&Path> {
        self.edit(key, |document| merge::clear(document, key))
    }

    fn edit(&mut self, key: &str, edit: impl FnOnce(&mut Value) -> Result<()>) -> Result<&Path> {
        let index = self.target_index(key);
        let file = self.files.get_mut(index).context("no kubeconfig file to write to")?;

        edit(&mut file.document)?;
        file.persist()?;
        file.exists = true;

        log::debug!("wrote kubeconfig {:?}", file.path);
        Ok(&file.path)
    }
}
