use anyhow::Result;

use super::Settings;
use crate::logging;
use crate::replica::ReplicaRole;

pub(crate) fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.secret_id.trim().is_empty() {
        anyhow::bail!("secret_id is required (set SECRETSMANAGER_SECRET_ID)");
    }
    if settings.check_interval.is_zero() {
        anyhow::bail!("check_interval must be greater than 0");
    }
    logging::parse_log_level(&settings.log_level)?;
    validate_init_settings(settings)?;
    if settings.vault.addr.trim().is_empty() {
        anyhow::bail!("vault.addr must not be empty");
    }
    if settings.vault.timeout.is_zero() {
        anyhow::bail!("vault.timeout must be greater than 0");
    }
    let role = settings.replica_role()?;
    if let ReplicaRole::Follower(ordinal) = role {
        let has_leader = settings
            .raft
            .leader_api_addr
            .as_deref()
            .is_some_and(|addr| !addr.trim().is_empty());
        if !has_leader {
            anyhow::bail!(
                "raft.leader_api_addr is required for follower replica (ordinal {ordinal})"
            );
        }
    }
    Ok(())
}

fn validate_init_settings(settings: &Settings) -> Result<()> {
    let init = &settings.init;
    if init.secret_shares == 0 {
        anyhow::bail!("init.secret_shares must be greater than 0");
    }
    if init.secret_threshold == 0 {
        anyhow::bail!("init.secret_threshold must be greater than 0");
    }
    if init.secret_threshold > init.secret_shares {
        anyhow::bail!("init.secret_threshold must be <= init.secret_shares");
    }
    if init.persist_retry_delay.is_zero() {
        anyhow::bail!("init.persist_retry_delay must be greater than 0");
    }
    Ok(())
}
