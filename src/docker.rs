//! Docker credential helper protocol, served with the same ambient credentials as kubectl.
//!
//! Docker runs `docker-credential-<name> <action>` and talks to it over stdin/stdout. This binary
//! answers to that name through a symlink created by `--configure-docker`.

use crate::{
    error::{PluginError, PluginResult},
    token::{TokenSource, REGISTRY_SCOPES},
};
use anyhow::{ensure, Context, Result};
use serde::Serialize;
use std::io::{Read, Write};

pub(crate) mod configure;

pub(crate) const HELPER_PROGRAM_PREFIX: &str = "docker-credential-";

/// Registries accept an OAuth2 access token as the password of this fixed user
pub(crate) const OAUTH2_USERNAME: &str = "oauth2accesstoken";

/// A server URL never comes anywhere near this, anything longer isn't docker talking to us
const MAX_INPUT_BYTES: u64 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HelperAction {
    Get,
    Store,
    Erase,
    List,
}

impl HelperAction {
    pub(crate) fn parse(action: &str) -> PluginResult<Self> {
        Ok(match action {
            "get" => Self::Get,
            "store" => Self::Store,
            "erase" => Self::Erase,
            "list" => Self::List,
            other => return Err(PluginError::usage(format!("unknown credential helper action {other:?}"))),
        })
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    #[serde(rename = "ServerURL")]
    server_url: &'a str,
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Secret")]
    secret: &'a str,
}

/// Returns true when the program was invoked under its credential helper name
pub(crate) fn invoked_as_helper(arg0: &str) -> bool {
    std::path::Path::new(arg0)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(HELPER_PROGRAM_PREFIX))
}

pub(crate) async fn serve(action: HelperAction, input: &mut dyn Read, out: &mut dyn Write, tokens: &dyn TokenSource) -> PluginResult<()> {
    match action {
        HelperAction::Get => {
            let server_url = read_server_url(input).context("reading server URL from stdin")?;
            log::debug!("credentials requested for {server_url}");

            let token = tokens.token(REGISTRY_SCOPES).await?;

            let document = serde_json::to_vec(&Credentials {
                server_url: &server_url,
                username: OAUTH2_USERNAME,
                secret: &token.access_token,
            })
            .context("serializing credentials")?;

            write_document(out, &document)?;
        }
        HelperAction::List => write_document(out, b"{}")?,
        HelperAction::Store | HelperAction::Erase => {
            log::debug!("ignoring {action:?}, tokens are never stored");
        }
    }

    Ok(())
}

fn read_server_url(input: &mut dyn Read) -> Result<String> {
    let mut raw = String::new();
    input
        .take(MAX_INPUT_BYTES + 1)
        .read_to_string(&mut raw)
        .context("server URL is not valid UTF-8")?;

    ensure!(raw.len() as u64 <= MAX_INPUT_BYTES, "server URL is longer than {MAX_INPUT_BYTES} bytes");

    let server_url = raw.trim();
    ensure!(!server_url.is_empty(), "no server URL given");

    Ok(server_url.to_string())
}

fn write_document(out: &mut dyn Write, document: &[u8]) -> Result<()> {
    let mut buffered = document.to_vec();
    buffered.push(b'\n');
    out.write_all(&buffered).context("writing credentials")?;
    out.flush().context("flushing credentials")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::token::{Token, USERINFO_EMAIL_SCOPE};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Hands out a fixed token and records the scopes it was asked for
    pub(crate) struct FixedTokenSource {
        pub(crate) token: Token,
        pub(crate) requested_scopes: Mutex<Vec<Vec<String>>>,
    }

    impl FixedTokenSource {
        pub(crate) fn new(access_token: &str) -> Self {
            Self {
                token: Token {
                    access_token: access_token.to_string(),
                    expiry: Utc::now() + chrono::Duration::hours(1),
                },
                requested_scopes: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl TokenSource for FixedTokenSource {
        async fn token(&self, scopes: &[&str]) -> PluginResult<Token> {
            self.requested_scopes
                .lock()
                .unwrap()
                .push(scopes.iter().map(|scope| scope.to_string()).collect());
            Ok(self.token.clone())
        }
    }

    #[test]
    fn test_invoked_as_helper() {
        assert!(invoked_as_helper("docker-credential-gke-auto"));
        assert!(invoked_as_helper("/usr/local/bin/docker-credential-gke-auto"));
        assert!(!invoked_as_helper("/usr/local/bin/gke-auto"));
        assert!(!invoked_as_helper("/opt/docker-credential-dir/gke-auto"));
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(HelperAction::parse("get").unwrap(), HelperAction::Get);
        assert_eq!(HelperAction::parse("list").unwrap(), HelperAction::List);
        assert!(matches!(HelperAction::parse("version"), Err(PluginError::Usage(_))));
    }

    #[tokio::test]
    async fn test_get() {
        let tokens = FixedTokenSource::new("ya29.registry");
        let mut out = vec![];

        serve(HelperAction::Get, &mut "https://us-docker.pkg.dev\n".as_bytes(), &mut out, &tokens)
            .await
            .unwrap();

        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            value,
            json!({"ServerURL": "https://us-docker.pkg.dev", "Username": "oauth2accesstoken", "Secret": "ya29.registry"})
        );
        let requested = tokens.requested_scopes.lock().unwrap();
        assert!(requested[0].iter().any(|scope| scope == USERINFO_EMAIL_SCOPE));
    }

    #[tokio::test]
    async fn test_get_rejects_oversized_input() {
        let tokens = FixedTokenSource::new("ya29.registry");
        let input = "a".repeat(MAX_INPUT_BYTES as usize + 1);
        let mut out = vec![];

        assert!(serve(HelperAction::Get, &mut input.as_bytes(), &mut out, &tokens).await.is_err());
        assert!(out.is_empty());
        assert!(tokens.requested_scopes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_rejects_empty_input() {
        let tokens = FixedTokenSource::new("ya29.registry");
        let mut out = vec![];

        assert!(serve(HelperAction::Get, &mut " \n".as_bytes(), &mut out, &tokens).await.is_err());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_store_erase_list() {
        let tokens = FixedTokenSource::new("ya29.registry");

        for action in [HelperAction::Store, HelperAction::Erase] {
            let mut out = vec![];
            serve(action, &mut "{}".as_bytes(), &mut out, &tokens).await.unwrap();
            assert!(out.is_empty());
        }

        let mut out = vec![];
        serve(HelperAction::List, &mut "".as_bytes(), &mut out, &tokens).await.unwrap();
        assert_eq!(out, b"{}\n");
        assert!(tokens.requested_scopes.lock().unwrap().is_empty());
    }
}
