use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::replica::ReplicaRole;
use crate::utils;
use crate::vault::RaftJoinRequest;

mod defaults;
mod validation;

pub const DEFAULT_CONFIG_PATH: &str = "vault-bootstrap.toml";
const ENV_PREFIX: &str = "VAULT_BOOTSTRAP";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub secret_id: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub check_interval: Duration,
    pub log_level: String,
    #[serde(default)]
    pub hostname: String,
    pub init: InitSettings,
    #[serde(default)]
    pub raft: RaftSettings,
    pub vault: VaultSettings,
    #[serde(default)]
    pub aws: AwsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InitSettings {
    pub secret_shares: u8,
    pub secret_threshold: u8,
    #[serde(deserialize_with = "deserialize_duration")]
    pub persist_retry_delay: Duration,
}

/// Join parameters for follower replicas. TLS fields hold either PEM text or
/// `@<path>` to read it from a file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RaftSettings {
    #[serde(default)]
    pub leader_api_addr: Option<String>,
    #[serde(default)]
    pub leader_ca_cert: Option<String>,
    #[serde(default)]
    pub leader_client_cert: Option<String>,
    #[serde(default)]
    pub leader_client_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultSettings {
    pub addr: String,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    pub skip_verify: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AwsSettings {
    #[serde(default)]
    pub region: Option<String>,
}

impl Settings {
    /// Loads settings from defaults, the optional config file and
    /// `VAULT_BOOTSTRAP__*` environment variables.
    ///
    /// # Errors
    /// Returns error if configuration parsing fails (e.g. invalid format).
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut s = Config::builder();

        s = defaults::apply_defaults(s)?;

        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        s = s.add_source(File::from(path).required(false));

        // e.g. VAULT_BOOTSTRAP__INIT__SECRET_SHARES=7
        s = s.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR),
        );

        s.build()?.try_deserialize()
    }

    /// Merges CLI arguments (and their legacy environment variables) into the
    /// settings, overriding values if present.
    pub fn merge_with_args(&mut self, args: &crate::Args) {
        if let Some(secret_id) = &args.secret_id {
            secret_id.clone_into(&mut self.secret_id);
        }
        if let Some(check_interval) = args.check_interval {
            self.check_interval = check_interval;
        }
        if let Some(log_level) = &args.log_level {
            log_level.clone_into(&mut self.log_level);
        }
        if let Some(hostname) = &args.hostname {
            hostname.clone_into(&mut self.hostname);
        }
        if let Some(shares) = args.secret_shares {
            self.init.secret_shares = shares;
        }
        if let Some(threshold) = args.secret_threshold {
            self.init.secret_threshold = threshold;
        }
        if let Some(addr) = &args.leader_api_addr {
            self.raft.leader_api_addr = Some(addr.clone());
        }
        if let Some(ca_cert) = &args.leader_ca_cert {
            self.raft.leader_ca_cert = Some(ca_cert.clone());
        }
        if let Some(client_cert) = &args.leader_client_cert {
            self.raft.leader_client_cert = Some(client_cert.clone());
        }
        if let Some(client_key) = &args.leader_client_key {
            self.raft.leader_client_key = Some(client_key.clone());
        }
        if let Some(addr) = &args.vault_addr {
            addr.clone_into(&mut self.vault.addr);
        }
        if let Some(ca_cert) = &args.vault_ca_cert {
            self.vault.ca_cert = Some(ca_cert.clone());
        }
        if let Some(skip_verify) = args.vault_skip_verify {
            self.vault.skip_verify = skip_verify;
        }
        if let Some(timeout) = args.vault_timeout {
            self.vault.timeout = timeout;
        }
        if let Some(region) = &args.aws_region {
            self.aws.region = Some(region.clone());
        }
    }

    /// Validates configuration values for correctness.
    ///
    /// # Errors
    /// Returns error if any setting is missing, invalid or out of range.
    pub fn validate(&self) -> Result<()> {
        validation::validate_settings(self)
    }

    /// Resolves this replica's bootstrap role from the configured hostname.
    ///
    /// # Errors
    /// Returns error if the hostname carries no ordinal suffix.
    pub fn replica_role(&self) -> Result<ReplicaRole> {
        ReplicaRole::from_hostname(&self.hostname)
    }

    /// Builds the raft join request, reading any `@<path>` TLS material.
    /// Returns `None` when no leader address is configured.
    ///
    /// # Errors
    /// Returns error if a referenced TLS file cannot be read.
    pub fn raft_join_request(&self) -> Result<Option<RaftJoinRequest>> {
        let Some(leader_api_addr) = self
            .raft
            .leader_api_addr
            .as_deref()
            .filter(|addr| !addr.trim().is_empty())
        else {
            return Ok(None);
        };
        Ok(Some(RaftJoinRequest {
            leader_api_addr: leader_api_addr.to_string(),
            leader_ca_cert: utils::read_optional_inline_or_file(
                self.raft.leader_ca_cert.as_deref(),
            )?,
            leader_client_cert: utils::read_optional_inline_or_file(
                self.raft.leader_client_cert.as_deref(),
            )?,
            leader_client_key: utils::read_optional_inline_or_file(
                self.raft.leader_client_key.as_deref(),
            )?,
        }))
    }
}

/// Parses a duration such as `10s` or `1m30s`. A bare integer is taken as
/// seconds.
///
/// # Errors
/// Returns error if the value is neither an integer nor a humantime duration.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| format!("invalid duration {raw:?}: {e}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
