use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Certificate, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::bundle::{CredentialBundle, null_as_empty};

// `sys/health` reports standby, DR/performance secondaries, uninitialized and
// sealed servers with these codes. All of them carry a regular health body.
const HEALTH_BODY_STATUSES: [u16; 7] = [200, 429, 472, 473, 474, 501, 503];

#[derive(Debug, Clone)]
pub struct VaultClient {
    base_url: String,
    client: Client,
}

/// Connection options for [`VaultClient`].
#[derive(Debug, Clone, Default)]
pub struct VaultClientOptions<'a> {
    pub ca_cert: Option<&'a Path>,
    pub skip_verify: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub initialized: bool,
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub server_time_utc: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SealStatus {
    pub sealed: bool,
    #[serde(default)]
    pub t: i64,
    #[serde(default)]
    pub n: i64,
    #[serde(default)]
    pub progress: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys_base64: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recovery_keys: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recovery_keys_base64: Vec<String>,
    pub root_token: String,
}

impl InitResponse {
    #[must_use]
    pub fn into_bundle(self, shares: u8, threshold: u8) -> CredentialBundle {
        CredentialBundle {
            keys: self.keys,
            keys_base64: self.keys_base64,
            recovery_keys: self.recovery_keys,
            recovery_keys_base64: self.recovery_keys_base64,
            root_token: self.root_token,
            secret_shares: Some(shares),
            secret_threshold: Some(threshold),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RaftJoinRequest {
    pub leader_api_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_ca_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_client_cert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_client_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaftJoinResponse {
    #[serde(default)]
    pub joined: bool,
}

impl VaultClient {
    /// Creates a client for the server at `base_url` with default options.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, &VaultClientOptions::default())
    }

    /// Creates a client with an optional CA bundle, TLS verification toggle
    /// and request timeout.
    ///
    /// # Errors
    /// Returns an error if the CA bundle cannot be read or parsed, or if the
    /// HTTP client cannot be built.
    pub fn with_options(base_url: &str, options: &VaultClientOptions<'_>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(path) = options.ca_cert {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read Vault CA cert {}", path.display()))?;
            let cert = Certificate::from_pem(&pem)
                .with_context(|| format!("Failed to parse Vault CA cert {}", path.display()))?;
            builder = builder.add_root_certificate(cert);
        }
        if options.skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("Failed to build Vault HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Reads `sys/health`.
    ///
    /// # Errors
    /// Returns an error on transport failure, an unexpected status, or an
    /// unparseable body.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint("sys/health");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Vault health request failed")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Vault health response body")?;
        if !HEALTH_BODY_STATUSES.contains(&status.as_u16()) {
            anyhow::bail!("Vault health check failed with status {status}: {text}");
        }
        serde_json::from_str(&text).context("Failed to parse Vault health response")
    }

    /// Initializes the server with the given key split.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server rejects it, for
    /// example because it is already initialized.
    pub async fn init(&self, shares: u8, threshold: u8) -> Result<InitResponse> {
        #[derive(Serialize)]
        struct InitRequest {
            secret_shares: u8,
            secret_threshold: u8,
        }
        self.post_json(
            "sys/init",
            &InitRequest {
                secret_shares: shares,
                secret_threshold: threshold,
            },
        )
        .await
    }

    /// Asks the server to join the raft cluster led by `leader_api_addr`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server rejects it. A
    /// response with `joined: false` is returned as-is; callers decide.
    pub async fn raft_join(&self, request: &RaftJoinRequest) -> Result<RaftJoinResponse> {
        self.post_json("sys/storage/raft/join", request).await
    }

    /// Submits one unseal key share.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server rejects the share.
    pub async fn unseal(&self, key: &str) -> Result<SealStatus> {
        #[derive(Serialize)]
        struct UnsealRequest<'a> {
            key: &'a str,
        }
        self.post_json("sys/unseal", &UnsealRequest { key }).await
    }

    /// Reads `sys/seal-status`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the body cannot be parsed.
    pub async fn seal_status(&self) -> Result<SealStatus> {
        let url = self.endpoint("sys/seal-status");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Vault request failed: sys/seal-status")?;
        Self::parse_response(response)
            .await
            .context("Vault response parse failed: sys/seal-status")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn post_json<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Vault request failed: {path}"))?;
        Self::parse_response(response)
            .await
            .with_context(|| format!("Vault response parse failed: {path}"))
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Vault response body")?;
        if !status.is_success() {
            if status == StatusCode::BAD_REQUEST {
                if let Some(errors) = api_errors(&text) {
                    anyhow::bail!("Vault rejected the request ({status}): {errors}");
                }
            }
            anyhow::bail!("Vault API error ({status}): {text}");
        }
        serde_json::from_str(&text).context("Failed to parse Vault response")
    }
}

fn api_errors(text: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        errors: Vec<String>,
    }
    let body: ErrorBody = serde_json::from_str(text).ok()?;
    if body.errors.is_empty() {
        None
    } else {
        Some(body.errors.join("; "))
    }
}
