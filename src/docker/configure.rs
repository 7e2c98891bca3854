//! `--configure-docker`: install the helper symlink and point docker's credHelpers at it

use super::HELPER_PROGRAM_PREFIX;
use crate::file_utils;
use anyhow::{bail, ensure, Context, Result};
use fn_error_context::context;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Docker resolves `credHelpers` values to `docker-credential-<value>` on PATH
pub(crate) const HELPER_NAME: &str = "gke-auto";

pub(crate) const DOCKER_CONFIG_ENV: &str = "DOCKER_CONFIG";

const CRED_HELPERS: &str = "credHelpers";

const CONTAINER_REGISTRIES: &[&str] = &["gcr.io", "us.gcr.io", "eu.gcr.io", "asia.gcr.io"];

pub(crate) fn helper_program_name() -> String {
    format!("{HELPER_PROGRAM_PREFIX}{HELPER_NAME}")
}

/// `$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`
pub(crate) fn docker_config_path() -> Result<PathBuf> {
    let dir = match std::env::var_os(DOCKER_CONFIG_ENV).filter(|dir| !dir.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir().context("cannot determine home directory")?.join(".docker"),
    };

    Ok(dir.join("config.json"))
}

/// The registry hosts the helper answers for. Artifact Registry hosts are per location, so one is
/// only added when a location was given.
pub(crate) fn registries(location: Option<&str>) -> Vec<String> {
    CONTAINER_REGISTRIES
        .iter()
        .map(|registry| registry.to_string())
        .chain(location.map(|location| format!("{location}-docker.pkg.dev")))
        .collect()
}

pub(crate) fn configure(executable: &Path, docker_config: &Path, location: Option<&str>) -> Result<()> {
    let link = install_helper_link(executable)?;
    log::info!("installed docker credential helper {link:?}");

    let registries = registries(location);
    register_cred_helpers(docker_config, &registries)?;
    log::info!("docker will use {} for {}", helper_program_name(), registries.join(", "));

    Ok(())
}

/// Puts `docker-credential-gke-auto` next to the executable, pointing at it
#[context("installing credential helper next to {:?}", executable)]
pub(crate) fn install_helper_link(executable: &Path) -> Result<PathBuf> {
    let dir = executable.parent().context("executable has no parent directory")?;
    let link = dir.join(helper_program_name());

    match std::fs::symlink_metadata(&link) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            if std::fs::read_link(&link).context("reading existing link")? == executable {
                return Ok(link);
            }
            std::fs::remove_file(&link).context("removing stale link")?;
        }
        Ok(_) => bail!("{link:?} exists and is not a symlink"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).context("inspecting existing link"),
    }

    symlink(executable, &link)?;
    Ok(link)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).context("creating symlink")
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> Result<()> {
    bail!("configuring the docker credential helper is only supported on unix")
}

/// Sets `credHelpers.<registry>` for every registry, leaving the rest of the file alone
#[context("updating docker config {:?}", path)]
pub(crate) fn register_cred_helpers(path: &Path, registries: &[String]) -> Result<()> {
    let mut document = match file_utils::read_optional_file_to_string(path)? {
        Some(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents).context("parsing json")?,
        _ => Value::Object(Map::new()),
    };

    let config = document.as_object_mut().context("docker config is not an object")?;
    let helpers = config
        .entry(CRED_HELPERS.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if helpers.is_null() {
        *helpers = Value::Object(Map::new());
    }
    let helpers = helpers.as_object_mut().context("credHelpers is not an object")?;

    for registry in registries {
        ensure!(!registry.is_empty(), "empty registry host");
        helpers.insert(registry.clone(), Value::String(HELPER_NAME.to_string()));
    }

    let mut contents = serde_json::to_vec_pretty(&document).context("serializing json")?;
    contents.push(b'\n');
    file_utils::write_atomically(path, &contents)
}
