use async_trait::async_trait;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::{ConfigError, UpstreamError};
use crate::profile::UpstreamProfile;
use crate::secrets::ApiKey;

/// The external device registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceCatalog: Send + Sync {
    /// Raw registry response for one identifier, at most one row.
    async fn search(&self, api_key: &ApiKey, udi_di: &str) -> Result<Value, UpstreamError>;
}

/// data.go.kr open API client.
#[derive(Debug, Clone)]
pub struct DataGoKrCatalog {
    client: reqwest::Client,
    endpoint: String,
    profile: UpstreamProfile,
}

impl DataGoKrCatalog {
    pub fn new_w_client(client: reqwest::Client, endpoint: impl Into<String>, profile: UpstreamProfile) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            profile,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self::new_w_client(client, config.endpoint.clone(), config.profile))
    }
}

#[async_trait]
impl DeviceCatalog for DataGoKrCatalog {
    async fn search(&self, api_key: &ApiKey, udi_di: &str) -> Result<Value, UpstreamError> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("serviceKey", api_key.expose()),
                ("type", "json"),
                ("numOfRows", "1"),
                ("pageNo", "1"),
                (self.profile.identifier_param(), udi_di),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        Ok(res.json::<Value>().await?)
    }
}
