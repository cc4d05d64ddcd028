use config::{ConfigBuilder, ConfigError, builder::DefaultState};

const DEFAULT_CHECK_INTERVAL: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SECRET_SHARES: u64 = 5;
const DEFAULT_SECRET_THRESHOLD: u64 = 3;
const DEFAULT_PERSIST_RETRY_DELAY: &str = "3s";
const DEFAULT_VAULT_ADDR: &str = "https://127.0.0.1:8200";
const DEFAULT_VAULT_SKIP_VERIFY: bool = false;
const DEFAULT_VAULT_TIMEOUT: &str = "60s";

pub(crate) fn apply_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("secret_id", "")?
        .set_default("check_interval", DEFAULT_CHECK_INTERVAL)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("hostname", "")?
        .set_default("init.secret_shares", DEFAULT_SECRET_SHARES)?
        .set_default("init.secret_threshold", DEFAULT_SECRET_THRESHOLD)?
        .set_default("init.persist_retry_delay", DEFAULT_PERSIST_RETRY_DELAY)?
        .set_default("vault.addr", DEFAULT_VAULT_ADDR)?
        .set_default("vault.skip_verify", DEFAULT_VAULT_SKIP_VERIFY)?
        .set_default("vault.timeout", DEFAULT_VAULT_TIMEOUT)
}
