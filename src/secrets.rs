use std::future::Future;

use anyhow::Result;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use tracing::debug;

/// Identifies the version produced by a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretVersion {
    pub arn: Option<String>,
    pub version_id: Option<String>,
}

/// Durable key-value store holding the credential bundle.
///
/// Writes overwrite the current value unconditionally.
pub trait SecretStore {
    /// Reports whether the secret `id` exists.
    fn exists(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Reads the current value of `id`. `Ok(None)` means the secret exists
    /// but holds no value yet.
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Replaces the current value of `id`.
    fn put(&self, id: &str, value: &str) -> impl Future<Output = Result<SecretVersion>> + Send;
}

/// [`SecretStore`] backed by AWS Secrets Manager.
#[derive(Debug, Clone)]
pub struct AwsSecretsManager {
    client: Client,
}

impl AwsSecretsManager {
    /// Loads AWS configuration from the environment (credentials chain,
    /// `AWS_REGION`, profile files), optionally pinning the region.
    pub async fn from_env(region: Option<&str>) -> Self {
        let sdk_config = if let Some(region) = region {
            aws_config::from_env()
                .region(Region::new(region.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };
        Self {
            client: Client::new(&sdk_config),
        }
    }
}

impl SecretStore for AwsSecretsManager {
    async fn exists(&self, id: &str) -> Result<bool> {
        match self.client.describe_secret().secret_id(id).send().await {
            Ok(output) => {
                debug!("Described secret {:?}", output.arn());
                Ok(true)
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(err) => Err(anyhow::anyhow!(
                "Describe secret {id:?}: {}",
                DisplayErrorContext(err)
            )),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<String>> {
        match self.client.get_secret_value().secret_id(id).send().await {
            Ok(output) => Ok(output.secret_string().map(str::to_string)),
            // A secret created without a value has no AWSCURRENT version yet.
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(err) => Err(anyhow::anyhow!(
                "Get secret value {id:?}: {}",
                DisplayErrorContext(err)
            )),
        }
    }

    async fn put(&self, id: &str, value: &str) -> Result<SecretVersion> {
        let output = self
            .client
            .update_secret()
            .secret_id(id)
            .secret_string(value)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("Update secret {id:?}: {}", DisplayErrorContext(err)))?;
        Ok(SecretVersion {
            arn: output.arn().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }
}
