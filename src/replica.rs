use std::fmt;

use anyhow::{Context, Result};

/// Bootstrap role of this replica, derived from its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    /// Ordinal 0: initializes the cluster.
    Leader,
    /// Any other ordinal: joins the leader.
    Follower(u32),
}

impl ReplicaRole {
    /// Resolves the role from an ordinal-suffixed hostname such as
    /// `vault-0` or `vault-12`.
    ///
    /// # Errors
    /// Returns an error if the hostname does not end in a decimal digit or
    /// the ordinal does not fit in a `u32`.
    pub fn from_hostname(hostname: &str) -> Result<Self> {
        let ordinal = parse_ordinal(hostname)?;
        Ok(Self::from_ordinal(ordinal))
    }

    #[must_use]
    pub fn from_ordinal(ordinal: u32) -> Self {
        if ordinal == 0 {
            Self::Leader
        } else {
            Self::Follower(ordinal)
        }
    }

    #[must_use]
    pub fn is_leader(self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => write!(f, "leader (ordinal 0)"),
            Self::Follower(ordinal) => write!(f, "follower (ordinal {ordinal})"),
        }
    }
}

fn parse_ordinal(hostname: &str) -> Result<u32> {
    let hostname = hostname.trim();
    let prefix_len = hostname.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let digits = &hostname[prefix_len..];
    if digits.is_empty() {
        anyhow::bail!("Hostname {hostname:?} does not end with a replica ordinal");
    }
    digits
        .parse()
        .with_context(|| format!("Replica ordinal in hostname {hostname:?} is out of range"))
}
