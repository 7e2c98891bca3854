//! Edits of a single kubeconfig document. Only the stanzas named after the cluster key and
//! `current-context` are ever touched, everything else in the document is left as it was.

use super::entries::{AuthEntry, ContextEntry, EndpointEntry};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

pub(crate) const USERS: (&str, &str) = ("users", "user");
pub(crate) const CLUSTERS: (&str, &str) = ("clusters", "cluster");
pub(crate) const CONTEXTS: (&str, &str) = ("contexts", "context");

const CURRENT_CONTEXT: &str = "current-context";

/// Overwrites the user, cluster and context stanzas of `key` and makes it the current context
pub(crate) fn install(document: &mut Value, key: &str, auth: &AuthEntry, endpoint: &EndpointEntry) -> Result<()> {
    let config = config_object(document)?;

    set_named(config, USERS, key, auth).context("setting user")?;
    set_named(config, CLUSTERS, key, endpoint).context("setting cluster")?;
    set_named(config, CONTEXTS, key, &ContextEntry::for_key(key)).context("setting context")?;
    config.insert(CURRENT_CONTEXT.to_string(), Value::String(key.to_string()));

    Ok(())
}

/// Empties the user, cluster and context stanzas of `key`. `current-context` is only blanked when
/// it points at `key`.
pub(crate) fn clear(document: &mut Value, key: &str) -> Result<()> {
    let config = config_object(document)?;
    let empty = Map::new();

    set_named(config, USERS, key, &empty).context("clearing user")?;
    set_named(config, CLUSTERS, key, &empty).context("clearing cluster")?;
    set_named(config, CONTEXTS, key, &empty).context("clearing context")?;

    if current_context(config) == Some(key) {
        config.insert(CURRENT_CONTEXT.to_string(), Value::String(String::new()));
    }

    Ok(())
}

pub(crate) fn get_named<'a>(document: &'a Value, (list, field): (&str, &str), name: &str) -> Option<&'a Value> {
    document
        .get(list)?
        .as_array()?
        .iter()
        .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))?
        .get(field)
}

pub(crate) fn current_context(config: &Map<String, Value>) -> Option<&str> {
    config.get(CURRENT_CONTEXT).and_then(Value::as_str)
}

/// A fresh document, the same thing kubectl writes when it creates a kubeconfig
pub(crate) fn empty_document() -> Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [],
        "contexts": [],
        "users": [],
        "preferences": {},
        CURRENT_CONTEXT: "",
    })
}

fn config_object(document: &mut Value) -> Result<&mut Map<String, Value>> {
    if document.is_null() {
        *document = empty_document();
    }

    document.as_object_mut().context("kubeconfig is not a mapping")
}

/// Replaces the entry called `name` in the named list, rather than merging into it, so that
/// nothing from a previous value survives. Later duplicates of the name are dropped too since
/// kubectl would ignore them anyway.
fn set_named(config: &mut Map<String, Value>, (list, field): (&str, &str), name: &str, value: &impl Serialize) -> Result<()> {
    let value = serde_json::to_value(value).context("serializing entry")?;
    let entry = serde_json::json!({
        "name": name,
        field: value,
    });

    let entries = config.entry(list.to_string()).or_insert_with(|| Value::Array(vec![]));
    if entries.is_null() {
        *entries = Value::Array(vec![]);
    }

    let entries = match entries {
        Value::Array(entries) => entries,
        _ => bail!("{list} is not a list"),
    };

    let mut matching = entries
        .iter()
        .enumerate()
        .filter(|(_, existing)| existing.get("name").and_then(Value::as_str) == Some(name))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    match matching.first().copied() {
        Some(first) => {
            entries[first] = entry;
            // Remove back to front so the remaining indices stay valid
            matching.remove(0);
            for index in matching.into_iter().rev() {
                entries.remove(index);
            }
        }
        None => entries.push(entry),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::entries::HookSpec;
    use super::*;
    use crate::{cluster::ClusterDescriptor, identity::ClusterIdentity};
    use base64::{engine::general_purpose::STANDARD as base64_standard, Engine as _};
    use serde_json::json;

    const EXISTING: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: minikube
  cluster:
    server: https://192.168.49.2:8443
    certificate-authority: /home/me/.minikube/ca.crt
    extensions:
    - name: cluster_info
      extension:
        provider: minikube.sigs.k8s.io
contexts:
- name: minikube
  context:
    cluster: minikube
    user: minikube
    namespace: default
users:
- name: minikube
  user:
    client-certificate: /home/me/.minikube/profiles/minikube/client.crt
    client-key: /home/me/.minikube/profiles/minikube/client.key
current-context: minikube
preferences:
  colors: true
"#;

    fn existing() -> Value {
        serde_yaml::from_str(EXISTING).unwrap()
    }

    fn entries_for(endpoint: &str, ca: &[u8], interactive: bool) -> (AuthEntry, EndpointEntry) {
        let identity = ClusterIdentity::new("proj1", "us-central1", "c1").unwrap();
        let descriptor: ClusterDescriptor = serde_json::from_value(json!({
            "endpoint": endpoint,
            "masterAuth": {"clusterCaCertificate": base64_standard.encode(ca)},
        }))
        .unwrap();

        (
            AuthEntry::exec_hook(&HookSpec {
                command: "gke-auto",
                identity: &identity,
                verbose: false,
                skip_privilege_check: false,
                interactive_mode_required: interactive,
            }),
            EndpointEntry::from_descriptor(&descriptor).unwrap(),
        )
    }

    fn without_key(document: &Value, key: &str) -> Value {
        let mut document = document.clone();
        for list in ["users", "clusters", "contexts"] {
            if let Some(entries) = document.get_mut(list).and_then(Value::as_array_mut) {
                entries.retain(|entry| entry.get("name").and_then(Value::as_str) != Some(key));
            }
        }
        document.as_object_mut().unwrap().remove(CURRENT_CONTEXT);
        document
    }

    const KEY: &str = "gke_proj1_us-central1_c1";

    #[test]
    fn test_install_into_existing() {
        let mut document = existing();
        let (auth, endpoint) = entries_for("34.1.2.3", b"ca", false);

        install(&mut document, KEY, &auth, &endpoint).unwrap();

        assert_eq!(document.get(CURRENT_CONTEXT).unwrap(), KEY);
        assert_eq!(get_named(&document, USERS, KEY).unwrap(), &serde_json::to_value(&auth).unwrap());
        assert_eq!(
            get_named(&document, CLUSTERS, KEY).unwrap(),
            &json!({"server": "https://34.1.2.3", "certificate-authority-data": "Y2E="})
        );
        assert_eq!(get_named(&document, CONTEXTS, KEY).unwrap(), &json!({"cluster": KEY, "user": KEY}));

        // Nothing but our stanzas and the current context changed
        assert_eq!(without_key(&document, KEY), without_key(&existing(), KEY));
        for list in ["users", "clusters", "contexts"] {
            assert_eq!(document.get(list).unwrap().as_array().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_install_into_empty() {
        let mut document = Value::Null;
        let (auth, endpoint) = entries_for("34.1.2.3", b"ca", false);

        install(&mut document, KEY, &auth, &endpoint).unwrap();

        assert_eq!(document.get("kind").unwrap(), "Config");
        assert_eq!(document.get("apiVersion").unwrap(), "v1");
        assert!(get_named(&document, USERS, KEY).is_some());
    }

    #[test]
    fn test_reinstall_overwrites() {
        let mut document = existing();
        let (auth, endpoint) = entries_for("34.1.2.3", b"first", true);
        install(&mut document, KEY, &auth, &endpoint).unwrap();

        // Leftovers a user may have added by hand must not survive either
        document["clusters"][1]["cluster"]["insecure-skip-tls-verify"] = json!(true);

        let (auth, endpoint) = entries_for("35.9.9.9", b"second", false);
        install(&mut document, KEY, &auth, &endpoint).unwrap();

        let mut expected = existing();
        install(&mut expected, KEY, &auth, &endpoint).unwrap();
        assert_eq!(document, expected);
        assert_eq!(
            get_named(&document, USERS, KEY).unwrap().pointer("/exec/interactiveMode").unwrap(),
            "Never"
        );
    }

    #[test]
    fn test_install_collapses_duplicates() {
        let mut document = existing();
        let users = document["users"].as_array_mut().unwrap();
        users.push(json!({"name": KEY, "user": {"token": "stale"}}));
        users.push(json!({"name": KEY, "user": {"token": "staler"}}));

        let (auth, endpoint) = entries_for("34.1.2.3", b"ca", false);
        install(&mut document, KEY, &auth, &endpoint).unwrap();

        let users = document["users"].as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(!serde_json::to_string(&document).unwrap().contains("stale"));
    }

    #[test]
    fn test_clear_after_install() {
        let mut document = existing();
        let (auth, endpoint) = entries_for("34.1.2.3", b"ca", false);
        install(&mut document, KEY, &auth, &endpoint).unwrap();

        clear(&mut document, KEY).unwrap();

        assert_eq!(document.get(CURRENT_CONTEXT).unwrap(), "");
        for list in [USERS, CLUSTERS, CONTEXTS] {
            assert_eq!(get_named(&document, list, KEY).unwrap(), &json!({}));
        }
        assert_eq!(without_key(&document, KEY), without_key(&existing(), KEY));
    }

    #[test]
    fn test_clear_keeps_unrelated_current_context() {
        let mut document = existing();

        clear(&mut document, KEY).unwrap();

        assert_eq!(document.get(CURRENT_CONTEXT).unwrap(), "minikube");
        assert_eq!(get_named(&document, USERS, KEY).unwrap(), &json!({}));
    }

    #[test]
    fn test_rejects_non_list() {
        let mut document = json!({"users": "oops"});
        let (auth, endpoint) = entries_for("34.1.2.3", b"ca", false);
        assert!(install(&mut document, KEY, &auth, &endpoint).is_err());
        assert!(install(&mut json!(["not", "a", "mapping"]), KEY, &auth, &endpoint).is_err());
    }

    #[test]
    fn test_null_lists_are_replaced() {
        let mut document: Value = serde_yaml::from_str("apiVersion: v1\nkind: Config\nusers: null\nclusters:\ncontexts: ~\n").unwrap();
        let (auth, endpoint) = entries_for("34.1.2.3", b"ca", false);

        install(&mut document, KEY, &auth, &endpoint).unwrap();

        for list in [USERS, CLUSTERS, CONTEXTS] {
            assert!(get_named(&document, list, KEY).is_some());
        }
    }
}
