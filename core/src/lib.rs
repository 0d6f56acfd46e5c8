//! Medical device lookup by UDI-DI.
//!
//! One request handler, shared by the Lambda entrypoint and the local dev
//! server: resolve the registry API key from the secret store, query the
//! data.go.kr device registry once, and reshape the first match.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handler;
pub mod invocation;
pub mod profile;
pub mod record;
pub mod secrets;
pub mod udi;

pub use catalog::{DataGoKrCatalog, DeviceCatalog};
pub use config::{Config, CorsHeaders, NotFoundStyle};
pub use error::{ConfigError, CredentialError, LookupError, UpstreamError};
pub use handler::DeviceLookupHandler;
pub use invocation::{Invocation, LookupRequest, Reply};
pub use profile::UpstreamProfile;
pub use record::{DeviceRecord, Lookup};
pub use secrets::{ApiKey, AwsSecretStore, SecretStore, StaticSecretStore};
pub use udi::UdiBarcode;
