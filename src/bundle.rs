use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Unseal key shares and root token produced by cluster initialization.
///
/// Stored verbatim as the secret value. The key names match the JSON the
/// server returns from `sys/init`, so bundles written by older sidecars still
/// parse; the share/threshold fields are optional for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub keys_base64: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recovery_keys: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recovery_keys_base64: Vec<String>,
    pub root_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_shares: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_threshold: Option<u8>,
}

impl CredentialBundle {
    /// Serializes the bundle for storage.
    ///
    /// # Errors
    /// Returns an error if JSON encoding fails.
    pub fn to_secret_string(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to encode credential bundle")
    }

    /// Parses a stored secret value.
    ///
    /// # Errors
    /// Returns an error if the value is not a credential bundle.
    pub fn from_secret_string(value: &str) -> Result<Self> {
        serde_json::from_str(value).context("Failed to decode credential bundle")
    }

    /// Unseal shares in stored order. Base64 shares are preferred; the hex
    /// form is used only when no base64 shares were stored.
    #[must_use]
    pub fn unseal_keys(&self) -> &[String] {
        if self.keys_base64.is_empty() {
            &self.keys
        } else {
            &self.keys_base64
        }
    }
}

/// Accepts `null` where a list is expected. Bundles written by the historical
/// sidecar encode absent recovery keys that way.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
