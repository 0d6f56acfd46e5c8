use std::time::Duration;

use reqwest::header::HeaderValue;

use crate::error::ConfigError;
use crate::profile::UpstreamProfile;

pub const DEFAULT_SECRET_NAME: &str = "prod/MedicalDeviceApiKey";
pub const DEFAULT_SECRET_KEY: &str = "MED_DEVICE_API_KEY";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub secret: SecretConfig,
    pub upstream: UpstreamConfig,
    pub response: ResponseConfig,
    /// Reduce scanned GS1 strings to their GTIN before the lookup.
    pub normalize_barcodes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretConfig {
    pub name: String,
    /// Entry in the secret's JSON payload that holds the API key.
    pub key: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub profile: UpstreamProfile,
    pub endpoint: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseConfig {
    pub not_found: NotFoundStyle,
    pub cors: CorsHeaders,
}

/// How an empty registry result is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundStyle {
    /// 200 with `"productFound": false`.
    Flag,
    /// 404 with only a message.
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsHeaders {
    pub allow_origin: String,
    pub allow_headers: String,
    pub allow_methods: String,
    /// Also send `content-type: application/json` on non-empty bodies.
    pub content_type: bool,
}

impl Default for CorsHeaders {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_headers: "Content-Type".to_string(),
            allow_methods: "GET, POST, OPTIONS".to_string(),
            content_type: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let profile = UpstreamProfile::StandardCode;
        Self {
            secret: SecretConfig {
                name: DEFAULT_SECRET_NAME.to_string(),
                key: DEFAULT_SECRET_KEY.to_string(),
                region: DEFAULT_REGION.to_string(),
            },
            upstream: UpstreamConfig {
                profile,
                endpoint: profile.default_endpoint().to_string(),
                timeout: DEFAULT_TIMEOUT,
            },
            response: ResponseConfig {
                not_found: NotFoundStyle::Flag,
                cors: CorsHeaders::default(),
            },
            normalize_barcodes: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any name -> value source; unset or blank
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Config::default();

        if let Some(name) = var("MED_DEVICE_SECRET_NAME") {
            config.secret.name = name;
        }
        if let Some(key) = var("MED_DEVICE_SECRET_KEY") {
            config.secret.key = key;
        }
        if let Some(region) = var("AWS_REGION") {
            config.secret.region = region;
        }

        if let Some(value) = var("DEVICE_API_PROFILE") {
            config.upstream.profile = UpstreamProfile::parse(&value).ok_or(ConfigError::InvalidValue {
                name: "DEVICE_API_PROFILE",
                value,
            })?;
        }
        config.upstream.endpoint = var("DEVICE_API_URL")
            .unwrap_or_else(|| config.upstream.profile.default_endpoint().to_string());
        if let Some(value) = var("DEVICE_API_TIMEOUT_SECS") {
            config.upstream.timeout = match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "DEVICE_API_TIMEOUT_SECS",
                        value,
                    })
                }
            };
        }

        if let Some(value) = var("NOT_FOUND_STYLE") {
            config.response.not_found = match value.trim().to_ascii_lowercase().as_str() {
                "flag" => NotFoundStyle::Flag,
                "status" => NotFoundStyle::Status,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "NOT_FOUND_STYLE",
                        value,
                    })
                }
            };
        }
        if let Some(origin) = var("ALLOWED_ORIGIN") {
            config.response.cors.allow_origin = header_value("ALLOWED_ORIGIN", origin)?;
        }
        if let Some(headers) = var("ALLOWED_HEADERS") {
            config.response.cors.allow_headers = header_value("ALLOWED_HEADERS", headers)?;
        }
        if let Some(methods) = var("ALLOWED_METHODS") {
            config.response.cors.allow_methods = header_value("ALLOWED_METHODS", methods)?;
        }
        if let Some(value) = var("EMIT_CONTENT_TYPE") {
            config.response.cors.content_type = parse_flag("EMIT_CONTENT_TYPE", value)?;
        }

        if let Some(value) = var("NORMALIZE_UDI_BARCODE") {
            config.normalize_barcodes = parse_flag("NORMALIZE_UDI_BARCODE", value)?;
        }

        Ok(config)
    }
}

/// Values sent back verbatim as response headers.
fn header_value(name: &'static str, value: String) -> Result<String, ConfigError> {
    match HeaderValue::from_str(&value) {
        Ok(_) => Ok(value),
        Err(_) => Err(ConfigError::InvalidValue { name, value }),
    }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
