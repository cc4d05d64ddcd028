use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::builder::BoolishValueParser;

use crate::config::parse_duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (default: vault-bootstrap.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Secrets Manager secret holding the unseal keys and root token
    #[arg(long, env = "SECRETSMANAGER_SECRET_ID")]
    pub secret_id: Option<String>,

    /// Interval between health checks (e.g. 10s)
    #[arg(long, env = "CHECK_INTERVAL", value_parser = parse_duration)]
    pub check_interval: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", allow_hyphen_values = true)]
    pub log_level: Option<String>,

    /// Replica hostname; its numeric suffix selects the bootstrap role
    #[arg(long, env = "HOSTNAME")]
    pub hostname: Option<String>,

    /// Number of unseal key shares generated at initialization
    #[arg(long, env = "VAULT_SECRET_SHARES")]
    pub secret_shares: Option<u8>,

    /// Number of key shares required to unseal
    #[arg(long, env = "VAULT_SECRET_THRESHOLD")]
    pub secret_threshold: Option<u8>,

    /// API address of the leader replica, used by followers to join
    #[arg(long, env = "RAFT_LEADER_API_ADDR")]
    pub leader_api_addr: Option<String>,

    /// Leader CA certificate (PEM or @<path>)
    #[arg(long, env = "RAFT_LEADER_CA_CERT")]
    pub leader_ca_cert: Option<String>,

    /// Client certificate presented to the leader (PEM or @<path>)
    #[arg(long, env = "RAFT_LEADER_CLIENT_CERT")]
    pub leader_client_cert: Option<String>,

    /// Client key presented to the leader (PEM or @<path>)
    #[arg(long, env = "RAFT_LEADER_CLIENT_KEY")]
    pub leader_client_key: Option<String>,

    /// Address of the local Vault server
    #[arg(long, env = "VAULT_ADDR")]
    pub vault_addr: Option<String>,

    /// CA bundle used to verify the local Vault server
    #[arg(long = "vault-cacert", env = "VAULT_CACERT")]
    pub vault_ca_cert: Option<PathBuf>,

    /// Disable TLS verification towards the local Vault server
    #[arg(long, env = "VAULT_SKIP_VERIFY", value_parser = BoolishValueParser::new())]
    pub vault_skip_verify: Option<bool>,

    /// Timeout for each Vault API request (e.g. 60s)
    #[arg(long, env = "VAULT_CLIENT_TIMEOUT", value_parser = parse_duration)]
    pub vault_timeout: Option<Duration>,

    /// AWS region of the secret (defaults to the SDK region chain)
    #[arg(long)]
    pub aws_region: Option<String>,

    /// Run a single check and exit (disable the polling loop)
    #[arg(long)]
    pub oneshot: bool,
}
