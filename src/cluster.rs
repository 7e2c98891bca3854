use crate::{
    error::{PluginError, PluginResult},
    identity::ClusterIdentity,
    token::Token,
};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const CONTAINER_API: &str = "https://container.googleapis.com";

/// Cluster labels with a special meaning to the privilege gate
pub(crate) const PRIVILEGED_LABEL: &str = "privileged";
pub(crate) const TIMEOUT_SECONDS_LABEL: &str = "timeout-seconds";

/// The parts of a GKE cluster resource this program cares about. Always fetched fresh.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterDescriptor {
    pub(crate) endpoint: String,
    #[serde(default)]
    pub(crate) master_auth: MasterAuth,
    #[serde(default, rename = "resourceLabels")]
    pub(crate) labels: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MasterAuth {
    #[serde(default)]
    pub(crate) cluster_ca_certificate: String,
}

impl ClusterDescriptor {
    pub(crate) fn ca_certificate_base64(&self) -> &str {
        &self.master_auth.cluster_ca_certificate
    }
}

#[async_trait]
pub(crate) trait ClusterFetcher: Send + Sync {
    async fn fetch(&self, identity: &ClusterIdentity, token: &Token) -> PluginResult<ClusterDescriptor>;
}

/// GKE's `projects.locations.clusters.get`
pub(crate) struct GkeClusterApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl GkeClusterApi {
    pub(crate) fn new() -> PluginResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")
            .map_err(PluginError::Transport)?;

        Ok(Self {
            http_client,
            base_url: CONTAINER_API.to_string(),
        })
    }

    fn cluster_url(&self, identity: &ClusterIdentity) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/clusters/{}",
            self.base_url, identity.project, identity.location, identity.name
        )
    }
}

#[async_trait]
impl ClusterFetcher for GkeClusterApi {
    async fn fetch(&self, identity: &ClusterIdentity, token: &Token) -> PluginResult<ClusterDescriptor> {
        let url = self.cluster_url(identity);
        log::debug!("fetching {url}");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .with_context(|| format!("GET {url}"))
            .map_err(PluginError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PluginError::ClusterFetch {
                cluster: identity.clone(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<ClusterDescriptor>()
            .await
            .with_context(|| format!("decoding cluster {identity}"))
            .map_err(PluginError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_url() {
        let api = GkeClusterApi::new().unwrap();
        let identity = ClusterIdentity::new("proj1", "us-central1", "c1").unwrap();
        assert_eq!(
            api.cluster_url(&identity),
            "https://container.googleapis.com/v1/projects/proj1/locations/us-central1/clusters/c1"
        );
    }

    #[test]
    fn test_decode_cluster() {
        let cluster: ClusterDescriptor = serde_json::from_str(
            r#"{
                "name": "c1",
                "endpoint": "34.1.2.3",
                "masterAuth": {"clusterCaCertificate": "Y2E=", "clientCertificate": ""},
                "resourceLabels": {"privileged": "true", "timeout-seconds": "120"},
                "status": "RUNNING"
            }"#,
        )
        .unwrap();

        assert_eq!(cluster.endpoint, "34.1.2.3");
        assert_eq!(cluster.ca_certificate_base64(), "Y2E=");
        assert_eq!(cluster.labels.get(PRIVILEGED_LABEL).map(String::as_str), Some("true"));
        assert_eq!(cluster.labels.get(TIMEOUT_SECONDS_LABEL).map(String::as_str), Some("120"));
    }

    #[test]
    fn test_decode_cluster_without_labels() {
        let cluster: ClusterDescriptor = serde_json::from_str(r#"{"endpoint": "10.0.0.1", "masterAuth": {}}"#).unwrap();
        assert!(cluster.labels.is_empty());
        assert_eq!(cluster.ca_certificate_base64(), "");
    }
}
