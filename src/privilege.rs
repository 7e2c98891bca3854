//! Interactive confirmation before handing out credentials for clusters labelled
//! `privileged=true`.
//!
//! Once the user confirms, a cooldown record holding the time the confirmation expires is kept in
//! the scratch directory, and further accesses within that window are granted without asking.
//! The record is never deleted, it simply goes stale.

use crate::{
    cluster::{ClusterDescriptor, PRIVILEGED_LABEL, TIMEOUT_SECONDS_LABEL},
    error::{PluginError, PluginResult},
    file_utils,
    identity::ClusterIdentity,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

const DEFAULT_TIMEOUT_SECONDS: u32 = 300;
const ACCEPT_ANSWER: &str = "Y";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GateDecision {
    pub(crate) granted: bool,
    /// Whether the installed hook must be allowed to talk to the user on every re-invocation
    pub(crate) interactive_mode_required: bool,
}

impl GateDecision {
    const UNRESTRICTED: Self = Self {
        granted: true,
        interactive_mode_required: false,
    };

    const CONFIRMED: Self = Self {
        granted: true,
        interactive_mode_required: true,
    };
}

/// Source of the current time. Read once to check the cooldown and again once the user has
/// answered, since a prompt can block for arbitrarily long.
pub(crate) trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the confirmation question goes and where the answer comes from
pub(crate) trait Prompter {
    /// Returns the line the user answered with, or `None` if input was closed
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
}

/// Asks on stderr and reads the answer from stdin, stdout is reserved for the credential
pub(crate) struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(question.as_bytes()).context("writing prompt")?;
        stderr.flush().context("flushing prompt")?;

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer).context("reading answer")? {
            0 => Ok(None),
            _ => Ok(Some(answer)),
        }
    }
}

pub(crate) struct PrivilegeGate<'a> {
    identity: &'a ClusterIdentity,
    scratch_dir: &'a Path,
}

impl<'a> PrivilegeGate<'a> {
    pub(crate) fn new(identity: &'a ClusterIdentity, scratch_dir: &'a Path) -> Self {
        Self { identity, scratch_dir }
    }

    pub(crate) fn cooldown_path(&self) -> PathBuf {
        self.scratch_dir
            .join(format!("gke-auth-privileged-timeout-{}", self.identity.key()))
    }

    /// Decides whether credentials may be handed out, blocking on the prompter when a fresh
    /// confirmation is needed
    pub(crate) fn evaluate(
        &self,
        descriptor: &ClusterDescriptor,
        skip_check: bool,
        clock: &dyn Clock,
        prompter: &mut dyn Prompter,
    ) -> PluginResult<GateDecision> {
        if skip_check {
            log::info!(
                "skipping privilege check for {} located in {} in project {}",
                self.identity.name,
                self.identity.location,
                self.identity.project
            );
            return Ok(GateDecision::UNRESTRICTED);
        }

        if descriptor.labels.get(PRIVILEGED_LABEL).map(String::as_str) != Some("true") {
            log::debug!("cluster {} is not privileged", self.identity);
            return Ok(GateDecision::UNRESTRICTED);
        }

        log::debug!("configuring privileged cluster context");

        let cooldown_path = self.cooldown_path();
        if let Some(expiry) = read_cooldown(&cooldown_path)? {
            if clock.now() < expiry {
                log::debug!("privileged access to {} confirmed until {}", self.identity, expiry);
                return Ok(GateDecision::CONFIRMED);
            }
            log::debug!("privileged access confirmation expired at {}", expiry);
        }

        let timeout_seconds = timeout_seconds(descriptor)?;
        log::debug!("timeout reached, setting to {} seconds", timeout_seconds);

        let answer = prompter
            .ask(&format!(
                "cluster {} is privileged, you will be re-prompted after {} seconds, proceed? [Y/n] ",
                self.identity, timeout_seconds
            ))
            .context("asking for privileged access confirmation")?;

        if answer.as_deref().map(str::trim) != Some(ACCEPT_ANSWER) {
            return Err(PluginError::Declined(self.identity.clone()));
        }

        // The window starts at the confirmation, not when the invocation started
        write_cooldown(&cooldown_path, clock.now() + Duration::seconds(timeout_seconds.into()))?;

        Ok(GateDecision::CONFIRMED)
    }
}

/// The cooldown length a privileged cluster asks for. A label that is present but not a number is
/// an error rather than a silent fallback to the default.
fn timeout_seconds(descriptor: &ClusterDescriptor) -> PluginResult<u32> {
    match descriptor.labels.get(TIMEOUT_SECONDS_LABEL) {
        None => Ok(DEFAULT_TIMEOUT_SECONDS),
        Some(value) => Ok(value
            .parse::<u32>()
            .with_context(|| format!("cluster label {TIMEOUT_SECONDS_LABEL}={value:?} is not a number of seconds"))?),
    }
}

/// A missing record means the cluster was never confirmed. Anything else that stops us from
/// reading it is corruption, which must not be mistaken for a first use.
fn read_cooldown(path: &Path) -> PluginResult<Option<DateTime<Utc>>> {
    let contents = file_utils::read_optional_file_to_string(path).map_err(|err| PluginError::local_state(path, err))?;

    match contents {
        None => {
            log::debug!("expiration file {:?} not found, creating a new expiration", path);
            Ok(None)
        }
        Some(contents) => DateTime::parse_from_rfc3339(contents.trim())
            .map(|expiry| Some(expiry.with_timezone(&Utc)))
            .with_context(|| format!("parsing timestamp {:?}", contents.trim()))
            .map_err(|err| PluginError::local_state(path, err)),
    }
}

fn write_cooldown(path: &Path, expiry: DateTime<Utc>) -> PluginResult<()> {
    file_utils::write_atomically(path, expiry.to_rfc3339_opts(SecondsFormat::Secs, true).as_bytes())
        .map_err(|err| PluginError::local_state(path, err))
}
