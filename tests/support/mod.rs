// Helper functions are shared across multiple test crates; not every helper is
// referenced in each test module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use vault_bootstrap::bootstrap::{BootstrapOptions, Bootstrapper};
use vault_bootstrap::bundle::CredentialBundle;
use vault_bootstrap::replica::ReplicaRole;
use vault_bootstrap::secrets::{SecretStore, SecretVersion};
use vault_bootstrap::vault::{RaftJoinRequest, VaultClient};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub(crate) const SECRET_ID: &str = "vault-unseal-keys";
pub(crate) const LEADER_ADDR: &str = "https://vault-0.vault-internal:8200";
pub(crate) const KEYS_BASE64: [&str; 5] = [
    "a2V5LTE=", "a2V5LTI=", "a2V5LTM=", "a2V5LTQ=", "a2V5LTU=",
];
pub(crate) const ROOT_TOKEN: &str = "hvs.root-token";

/// In-memory secret store that records every write.
#[derive(Debug, Default)]
pub(crate) struct MemorySecretStore {
    // `None` value: the secret exists but has no current version.
    values: Mutex<HashMap<String, Option<String>>>,
    failing_puts: Mutex<usize>,
    put_attempts: Mutex<usize>,
    puts: Mutex<Vec<String>>,
}

impl MemorySecretStore {
    pub(crate) fn empty_secret(id: &str) -> Self {
        let store = Self::default();
        store.values.lock().unwrap().insert(id.to_string(), None);
        store
    }

    pub(crate) fn with_value(id: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap()
            .insert(id.to_string(), Some(value.to_string()));
        store
    }

    pub(crate) fn fail_next_puts(&self, count: usize) {
        *self.failing_puts.lock().unwrap() = count;
    }

    pub(crate) fn value(&self, id: &str) -> Option<String> {
        self.values.lock().unwrap().get(id).cloned().flatten()
    }

    pub(crate) fn put_attempts(&self) -> usize {
        *self.put_attempts.lock().unwrap()
    }

    pub(crate) fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }
}

impl SecretStore for MemorySecretStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.values.lock().unwrap().contains_key(id))
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        match self.values.lock().unwrap().get(id) {
            Some(value) => Ok(value.clone()),
            None => anyhow::bail!("ResourceNotFoundException: secret {id} not found"),
        }
    }

    async fn put(&self, id: &str, value: &str) -> Result<SecretVersion> {
        *self.put_attempts.lock().unwrap() += 1;
        {
            let mut failing = self.failing_puts.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                anyhow::bail!("AccessDeniedException: not authorized to update {id}");
            }
        }
        let mut values = self.values.lock().unwrap();
        if !values.contains_key(id) {
            anyhow::bail!("ResourceNotFoundException: secret {id} not found");
        }
        values.insert(id.to_string(), Some(value.to_string()));
        let mut puts = self.puts.lock().unwrap();
        puts.push(value.to_string());
        Ok(SecretVersion {
            arn: Some(format!("arn:aws:secretsmanager:eu-west-1:000000000000:secret:{id}")),
            version_id: Some(format!("v{}", puts.len())),
        })
    }
}

pub(crate) fn stored_bundle() -> CredentialBundle {
    CredentialBundle {
        keys: Vec::new(),
        keys_base64: KEYS_BASE64.iter().map(ToString::to_string).collect(),
        recovery_keys: Vec::new(),
        recovery_keys_base64: Vec::new(),
        root_token: ROOT_TOKEN.to_string(),
        secret_shares: Some(5),
        secret_threshold: Some(3),
    }
}

pub(crate) fn stored_bundle_json() -> String {
    stored_bundle().to_secret_string().unwrap()
}

pub(crate) fn options(role: ReplicaRole) -> BootstrapOptions {
    BootstrapOptions {
        secret_id: SECRET_ID.to_string(),
        role,
        join_request: Some(RaftJoinRequest {
            leader_api_addr: LEADER_ADDR.to_string(),
            ..RaftJoinRequest::default()
        }),
        secret_shares: 5,
        secret_threshold: 3,
        persist_retry_delay: Duration::from_millis(5),
        check_interval: Duration::from_millis(20),
    }
}

pub(crate) fn bootstrapper(
    server: &MockServer,
    store: MemorySecretStore,
    role: ReplicaRole,
) -> Bootstrapper<MemorySecretStore> {
    let vault = VaultClient::new(&server.uri()).unwrap();
    Bootstrapper::new(vault, store, options(role))
}

pub(crate) async fn mount_health(server: &MockServer, initialized: bool, sealed: bool) {
    let status = match (initialized, sealed) {
        (false, _) => 501,
        (true, true) => 503,
        (true, false) => 200,
    };
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "initialized": initialized,
            "sealed": sealed,
            "standby": false,
            "version": "1.17.2",
        })))
        .mount(server)
        .await;
}

/// Mounts `sys/unseal` so that the `threshold`-th share unseals the server.
/// Shares past the threshold must never be submitted.
pub(crate) async fn mount_unseal_shares(server: &MockServer, threshold: usize) {
    for (index, key) in KEYS_BASE64.iter().enumerate() {
        let submitted = index + 1;
        let (progress, sealed, expected): (usize, bool, u64) = if submitted < threshold {
            (submitted, true, 1)
        } else if submitted == threshold {
            (0, false, 1)
        } else {
            (0, false, 0)
        };
        Mock::given(method("POST"))
            .and(path("/v1/sys/unseal"))
            .and(body_json(json!({ "key": key })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sealed": sealed,
                "t": threshold,
                "n": KEYS_BASE64.len(),
                "progress": progress,
            })))
            .expect(expected)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v1/sys/seal-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sealed": false,
            "t": threshold,
            "n": KEYS_BASE64.len(),
            "progress": 0,
        })))
        .mount(server)
        .await;
}

pub(crate) async fn forbid(server: &MockServer, http_method: &str, api_path: &str) {
    Mock::given(method(http_method))
        .and(path(api_path))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

pub(crate) async fn forbid_mutations(server: &MockServer) {
    forbid(server, "POST", "/v1/sys/init").await;
    forbid(server, "POST", "/v1/sys/storage/raft/join").await;
    forbid(server, "POST", "/v1/sys/unseal").await;
}
