use crate::error::{PluginError, PluginResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub(crate) const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub(crate) const USERINFO_EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// Scopes for talking to the GKE API and to the cluster itself
pub(crate) const CLUSTER_SCOPES: &[&str] = &[CLOUD_PLATFORM_SCOPE];

/// Registries authorize a principal, so they also need to know who the token belongs to
pub(crate) const REGISTRY_SCOPES: &[&str] = &[CLOUD_PLATFORM_SCOPE, USERINFO_EMAIL_SCOPE];

/// A bearer token. Only ever held in memory, the kubeconfig stores a hook that re-derives it.
#[derive(Clone)]
pub(crate) struct Token {
    pub(crate) access_token: String,
    pub(crate) expiry: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[async_trait]
pub(crate) trait TokenSource: Send + Sync {
    async fn token(&self, scopes: &[&str]) -> PluginResult<Token>;
}

/// Application Default Credentials: GOOGLE_APPLICATION_CREDENTIALS, gcloud's stored user
/// credentials, or the metadata server, whichever is found first
pub(crate) struct AmbientTokenSource;

#[async_trait]
impl TokenSource for AmbientTokenSource {
    async fn token(&self, scopes: &[&str]) -> PluginResult<Token> {
        let provider = gcp_auth::provider()
            .await
            .map_err(|err| PluginError::TokenSource(anyhow::Error::new(err).context("discovering credentials")))?;

        let token = provider
            .token(scopes)
            .await
            .map_err(|err| PluginError::TokenSource(anyhow::Error::new(err).context(format!("requesting token for {scopes:?}"))))?;

        log::debug!("got oauth2 token expiring at {}", token.expires_at());

        Ok(Token {
            access_token: token.as_str().to_string(),
            expiry: token.expires_at(),
        })
    }
}
