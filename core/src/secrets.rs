use std::fmt;

use async_trait::async_trait;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use serde_json::Value;

use crate::error::CredentialError;

/// Read access to a managed secret store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Raw string payload of the secret `name`.
    async fn secret_string(&self, name: &str) -> Result<String, CredentialError>;
}

/// Registry API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Pulls the key out of a JSON secret payload such as
    /// `{"MED_DEVICE_API_KEY": "..."}`.
    pub fn from_payload(payload: &str, key: &str) -> Result<Self, CredentialError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|_| CredentialError::MalformedPayload)?;
        match value.get(key).and_then(Value::as_str).map(str::trim) {
            Some(api_key) if !api_key.is_empty() => Ok(Self::new(api_key)),
            _ => Err(CredentialError::MissingKey(key.to_string())),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    pub fn new(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }

    /// Loads the ambient AWS credentials and pins the client to `region`.
    pub async fn from_region(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(aws_sdk_secretsmanager::Client::new(&config))
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn secret_string(&self, name: &str) -> Result<String, CredentialError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|err| CredentialError::Store(DisplayErrorContext(&err).to_string()))?;

        output
            .secret_string()
            .map(str::to_owned)
            .ok_or(CredentialError::MissingSecretString)
    }
}

/// Fixed payload, for running without AWS.
#[derive(Clone)]
pub struct StaticSecretStore {
    payload: String,
}

impl StaticSecretStore {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Wraps a bare key the way the managed secret stores it.
    pub fn with_api_key(key_name: &str, api_key: &str) -> Self {
        let mut payload = serde_json::Map::new();
        payload.insert(key_name.to_string(), Value::String(api_key.to_string()));
        Self::new(Value::Object(payload).to_string())
    }
}

impl fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecretStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn secret_string(&self, _name: &str) -> Result<String, CredentialError> {
        Ok(self.payload.clone())
    }
}
