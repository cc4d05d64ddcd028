use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bundle::CredentialBundle;
use crate::config::Settings;
use crate::replica::ReplicaRole;
use crate::secrets::SecretStore;
use crate::utils;
use crate::vault::{RaftJoinRequest, VaultClient};

/// Failure of a bootstrap step, split by how the caller must react.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Continuing could lose the unseal keys or leave a half-bootstrapped
    /// cluster. The process must exit.
    #[error("fatal: {0:#}")]
    Fatal(anyhow::Error),
    /// Logged; the next tick starts over from a fresh health read.
    #[error("{0:#}")]
    Transient(anyhow::Error),
}

impl BootstrapError {
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<anyhow::Error> for BootstrapError {
    fn from(err: anyhow::Error) -> Self {
        Self::Transient(err)
    }
}

/// Mutating actions taken during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub initialized: bool,
    pub joined: bool,
    pub unsealed: bool,
}

impl TickReport {
    /// True when the server was already initialized and unsealed.
    #[must_use]
    pub fn is_steady(&self) -> bool {
        !(self.initialized || self.joined || self.unsealed)
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub secret_id: String,
    pub role: ReplicaRole,
    pub join_request: Option<RaftJoinRequest>,
    pub secret_shares: u8,
    pub secret_threshold: u8,
    pub persist_retry_delay: Duration,
    pub check_interval: Duration,
}

impl BootstrapOptions {
    /// Resolves the replica role and join material from validated settings.
    ///
    /// # Errors
    /// Returns [`BootstrapError::Fatal`] if the hostname carries no ordinal
    /// or referenced TLS material cannot be read.
    pub fn from_settings(settings: &Settings) -> Result<Self, BootstrapError> {
        let role = settings.replica_role().map_err(BootstrapError::Fatal)?;
        let join_request = settings
            .raft_join_request()
            .context("Failed to load raft join TLS material")
            .map_err(BootstrapError::Fatal)?;
        Ok(Self {
            secret_id: settings.secret_id.clone(),
            role,
            join_request,
            secret_shares: settings.init.secret_shares,
            secret_threshold: settings.init.secret_threshold,
            persist_retry_delay: settings.init.persist_retry_delay,
            check_interval: settings.check_interval,
        })
    }
}

/// Drives one Vault replica from uninitialized/sealed to unsealed.
pub struct Bootstrapper<S> {
    vault: VaultClient,
    store: S,
    options: BootstrapOptions,
}

impl<S: SecretStore> Bootstrapper<S> {
    pub fn new(vault: VaultClient, store: S, options: BootstrapOptions) -> Self {
        Self {
            vault,
            store,
            options,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Confirms the secret exists and can be read; the leader also confirms
    /// it can be written.
    ///
    /// Only the leader ever writes the secret. Followers, and a leader whose
    /// secret already holds a credential bundle, skip the write probe since
    /// it would replace the keys.
    ///
    /// # Errors
    /// Every failure is [`BootstrapError::Fatal`].
    pub async fn verify_secret_access(&self) -> Result<(), BootstrapError> {
        let id = self.options.secret_id.as_str();
        let role = self.options.role;
        let exists = self
            .store
            .exists(id)
            .await
            .with_context(|| format!("Failed to describe secret {id:?}"))
            .map_err(BootstrapError::Fatal)?;
        if !exists {
            return Err(BootstrapError::Fatal(anyhow::anyhow!(
                "Secret {id:?} does not exist"
            )));
        }

        let current = self
            .store
            .get(id)
            .await
            .with_context(|| format!("Failed to read secret {id:?}"))
            .map_err(BootstrapError::Fatal)?;
        if !role.is_leader() {
            info!("Read access to secret {id:?} confirmed. Write probe skipped for {role}.");
            return Ok(());
        }
        if let Some(value) = current.as_deref() {
            if CredentialBundle::from_secret_string(value).is_ok() {
                info!(
                    "Secret {id:?} already holds a credential bundle. Read access confirmed; \
                     write probe skipped for {role}."
                );
                return Ok(());
            }
        }

        let probe = time::OffsetDateTime::now_utc()
            .unix_timestamp_nanos()
            .to_string();
        self.store
            .put(id, &probe)
            .await
            .with_context(|| format!("Failed to write secret {id:?}"))
            .map_err(BootstrapError::Fatal)?;
        let read_back = self
            .store
            .get(id)
            .await
            .with_context(|| format!("Failed to read back secret {id:?}"))
            .map_err(BootstrapError::Fatal)?;
        if read_back.as_deref() != Some(probe.as_str()) {
            return Err(BootstrapError::Fatal(anyhow::anyhow!(
                "Secret {id:?} did not return the value just written"
            )));
        }
        info!("Read and write access to secret {id:?} confirmed.");
        Ok(())
    }

    /// Runs an immediate check, then one per `check_interval`, until
    /// `shutdown` flips to true. Ticks never overlap.
    ///
    /// # Errors
    /// Returns only on a [`BootstrapError::Fatal`]; transient failures are
    /// logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), BootstrapError> {
        info!(
            "Bootstrap loop enabled. role={}, check_interval={:?}",
            self.options.role, self.options.check_interval
        );
        let mut ticker = tokio::time::interval(self.options.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received. Stopping bootstrap loop.");
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown signal received. Stopping bootstrap loop.");
                    break;
                }
                instant = ticker.tick() => {
                    debug!("Tick at {:?}", instant);
                    match self.check_status().await {
                        Ok(report) if report.is_steady() => {}
                        Ok(report) => info!("Bootstrap tick completed: {report:?}"),
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => error!("Checking vault failed: {err}"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Performs one health check and whatever bootstrap steps it calls for.
    ///
    /// # Errors
    /// Returns [`BootstrapError::Transient`] when a step fails and
    /// [`BootstrapError::Fatal`] when the credential bundle cannot be encoded.
    pub async fn check_status(&self) -> Result<TickReport, BootstrapError> {
        debug!("Checking vault status");
        let health = self.vault.health().await.context("Read health")?;
        debug!("Got vault status: {health:?}");

        let mut report = TickReport::default();
        if health.initialized && !health.sealed {
            debug!("Nothing to do");
            return Ok(report);
        }

        if !health.initialized {
            debug!("Vault replica: {}", self.options.role);
            match self.options.role {
                ReplicaRole::Leader => {
                    self.initialize().await?;
                    report.initialized = true;
                }
                ReplicaRole::Follower(_) => {
                    self.join().await.context("Raft join")?;
                    report.joined = true;
                }
            }
        }

        if health.sealed {
            self.unseal().await.context("Unseal")?;
            report.unsealed = true;
        }

        Ok(report)
    }

    async fn initialize(&self) -> Result<(), BootstrapError> {
        let shares = self.options.secret_shares;
        let threshold = self.options.secret_threshold;
        info!("Initializing vault server (shares={shares}, threshold={threshold})...");

        let response = self
            .vault
            .init(shares, threshold)
            .await
            .context("Initialize")?;
        let bundle = response.into_bundle(shares, threshold);
        info!(
            "Vault server initialized with {} key shares. Storing credentials in secret {:?}...",
            bundle.unseal_keys().len(),
            self.options.secret_id
        );

        let secret_string = bundle.to_secret_string().map_err(BootstrapError::Fatal)?;
        let version = self.persist_bundle(&secret_string).await;
        info!(
            "Updated secret arn={} version={}",
            version.arn.as_deref().unwrap_or("-"),
            version.version_id.as_deref().unwrap_or("-")
        );
        info!("Initialization process completed");
        Ok(())
    }

    /// Writes the bundle until the store accepts it. These are the only
    /// copies of the unseal keys, so there is no attempt limit.
    async fn persist_bundle(&self, secret_string: &str) -> crate::secrets::SecretVersion {
        let id = self.options.secret_id.as_str();
        let (version, attempts) = utils::retry_forever_with_sleep(
            || self.store.put(id, secret_string),
            tokio::time::sleep,
            |attempt, err| {
                error!("Cannot update secret {id:?} (attempt {attempt}): {err:#}");
            },
            self.options.persist_retry_delay,
        )
        .await;
        if attempts > 1 {
            warn!("Secret {id:?} updated after {attempts} attempts");
        }
        version
    }

    async fn join(&self) -> anyhow::Result<()> {
        let request = self.options.join_request.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No leader API address configured for {}", self.options.role)
        })?;
        info!("Joining raft cluster via {}...", request.leader_api_addr);

        let response = self.vault.raft_join(request).await?;
        if !response.joined {
            anyhow::bail!(
                "Leader {} did not accept the join request",
                request.leader_api_addr
            );
        }
        info!("Joined raft cluster successfully");
        Ok(())
    }

    async fn unseal(&self) -> anyhow::Result<()> {
        let id = self.options.secret_id.as_str();
        info!("Fetching unseal keys from secret {id:?}...");
        let value = self
            .store
            .get(id)
            .await
            .with_context(|| format!("Get secret {id:?}"))?
            .ok_or_else(|| anyhow::anyhow!("Secret {id:?} holds no value"))?;
        let bundle = CredentialBundle::from_secret_string(&value)?;
        let keys = bundle.unseal_keys();
        if keys.is_empty() {
            anyhow::bail!("Credential bundle in secret {id:?} holds no unseal keys");
        }

        info!("Unseal keys received, unsealing vault server...");
        let submitted = submit_unseal_shares(&self.vault, keys).await?;
        info!("Vault server unsealed successfully after {submitted} key share(s)");

        match self.vault.seal_status().await {
            Ok(status) => debug!(
                "Seal status after unseal: sealed={}, t={}, n={}",
                status.sealed, status.t, status.n
            ),
            Err(err) => warn!("Could not read seal status after unseal: {err:#}"),
        }
        Ok(())
    }
}

/// Submits shares in order until the server reports no pending progress.
/// Returns the number of shares submitted.
async fn submit_unseal_shares(vault: &VaultClient, keys: &[String]) -> anyhow::Result<usize> {
    for (index, key) in keys.iter().enumerate() {
        let status = vault
            .unseal(key)
            .await
            .with_context(|| format!("Unseal shard {index}"))?;
        info!(
            "Unseal progress: {} (threshold {})",
            status.progress, status.t
        );
        if status.progress <= 0 {
            return Ok(index + 1);
        }
    }
    anyhow::bail!(
        "Submitted all {} stored key shares but the server is still sealed",
        keys.len()
    );
}
