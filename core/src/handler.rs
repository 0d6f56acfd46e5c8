use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::{DataGoKrCatalog, DeviceCatalog};
use crate::config::{Config, NotFoundStyle};
use crate::error::{ConfigError, LookupError};
use crate::invocation::{
    Invocation, Reply, HEADER_ALLOW_HEADERS, HEADER_ALLOW_METHODS, HEADER_ALLOW_ORIGIN,
    HEADER_CONTENT_TYPE,
};
use crate::record::{DeviceRecord, Lookup};
use crate::secrets::{ApiKey, AwsSecretStore, SecretStore};

const NOT_FOUND_MESSAGE: &str = "No product details found for this UDI-DI.";

/// Answers device lookups: preflight, validation, credential resolution,
/// one registry query and normalization. Holds no per-call state, so one
/// instance serves every invocation.
pub struct DeviceLookupHandler {
    config: Config,
    secrets: Box<dyn SecretStore>,
    catalog: Box<dyn DeviceCatalog>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FoundBody<'a> {
    product_found: bool,
    #[serde(flatten)]
    record: &'a DeviceRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    product_found: Option<bool>,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl DeviceLookupHandler {
    pub fn new(config: Config, secrets: Box<dyn SecretStore>, catalog: Box<dyn DeviceCatalog>) -> Self {
        Self {
            config,
            secrets,
            catalog,
        }
    }

    /// Handler backed by AWS Secrets Manager and the data.go.kr API.
    pub async fn connect(config: Config) -> Result<Self, ConfigError> {
        let secrets = AwsSecretStore::from_region(config.secret.region.clone()).await;
        let catalog = DataGoKrCatalog::from_config(&config.upstream)?;
        Ok(Self::new(config, Box::new(secrets), Box::new(catalog)))
    }

    pub async fn handle(&self, invocation: &Invocation) -> Reply {
        if invocation.is_preflight() {
            return self.reply(200, String::new());
        }

        match self.lookup(invocation).await {
            Ok(Lookup::Found(record)) => self.json(
                200,
                &FoundBody {
                    product_found: true,
                    record: &record,
                },
            ),
            Ok(Lookup::NotFound) => match self.config.response.not_found {
                NotFoundStyle::Flag => self.json(
                    200,
                    &NotFoundBody {
                        product_found: Some(false),
                        message: NOT_FOUND_MESSAGE,
                    },
                ),
                NotFoundStyle::Status => self.json(
                    404,
                    &NotFoundBody {
                        product_found: None,
                        message: NOT_FOUND_MESSAGE,
                    },
                ),
            },
            Err(err) => {
                match &err {
                    LookupError::MissingIdentifier | LookupError::InvalidBody => {
                        warn!(%err, "rejected lookup request")
                    }
                    _ => error!(%err, "device lookup failed"),
                }
                self.json(
                    err.status_code(),
                    &ErrorBody {
                        error: err.public_message(),
                    },
                )
            }
        }
    }

    /// Validates before touching any collaborator; the store is read
    /// before the registry is called.
    pub async fn lookup(&self, invocation: &Invocation) -> Result<Lookup, LookupError> {
        let request = invocation.lookup_request()?;
        let udi_di = if self.config.normalize_barcodes {
            request.normalized()
        } else {
            request.udi_di().to_string()
        };

        let payload = self.secrets.secret_string(&self.config.secret.name).await?;
        let api_key = ApiKey::from_payload(&payload, &self.config.secret.key)?;

        info!(udi_di = %udi_di, requested = %request.udi_di(), "looking up device");
        let response = self.catalog.search(&api_key, &udi_di).await?;

        let profile = self.config.upstream.profile;
        profile.check_result(&response)?;
        match profile.first_item(&response) {
            Some(item) => Ok(Lookup::Found(DeviceRecord::from_item(item, profile, &udi_di))),
            None => {
                warn!(udi_di = %udi_di, "no device details found");
                Ok(Lookup::NotFound)
            }
        }
    }

    fn json<T: Serialize>(&self, status_code: u16, body: &T) -> Reply {
        match serde_json::to_string(body) {
            Ok(body) => self.reply(status_code, body),
            Err(err) => {
                error!(%err, "failed to encode response body");
                self.reply(500, r#"{"error":"An unexpected server error occurred."}"#.to_string())
            }
        }
    }

    fn reply(&self, status_code: u16, body: String) -> Reply {
        let cors = &self.config.response.cors;
        let mut headers = vec![
            (HEADER_ALLOW_ORIGIN, cors.allow_origin.clone()),
            (HEADER_ALLOW_HEADERS, cors.allow_headers.clone()),
            (HEADER_ALLOW_METHODS, cors.allow_methods.clone()),
        ];
        if cors.content_type && !body.is_empty() {
            headers.push((HEADER_CONTENT_TYPE, "application/json".to_string()));
        }
        Reply {
            status_code,
            headers,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockDeviceCatalog;
    use crate::error::{CredentialError, UpstreamError};
    use crate::profile::UpstreamProfile;
    use crate::secrets::MockSecretStore;
    use reqwest::Method;
    use serde_json::{json, Value};

    const SECRET: &str = "s3cr3t-service-key";

    fn secret_payload() -> String {
        json!({ "MED_DEVICE_API_KEY": SECRET }).to_string()
    }

    fn store_returning_key() -> MockSecretStore {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_secret_string()
            .withf(|name| name == "prod/MedicalDeviceApiKey")
            .returning(|_| Ok(secret_payload()));
        secrets
    }

    fn untouched() -> (MockSecretStore, MockDeviceCatalog) {
        let mut secrets = MockSecretStore::new();
        secrets.expect_secret_string().times(0);
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().times(0);
        (secrets, catalog)
    }

    fn build_handler(config: Config, secrets: MockSecretStore, catalog: MockDeviceCatalog) -> DeviceLookupHandler {
        DeviceLookupHandler::new(config, Box::new(secrets), Box::new(catalog))
    }

    fn product_info_config() -> Config {
        let mut config = Config::default();
        config.upstream.profile = UpstreamProfile::ProductInfo;
        config
    }

    fn lookup_post(udi_di: &str) -> Invocation {
        Invocation::new(Method::POST).with_body(json!({ "udiDi": udi_di }).to_string())
    }

    fn assert_cors(reply: &Reply) {
        assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(reply.header("Access-Control-Allow-Headers"), Some("Content-Type"));
        assert_eq!(reply.header("Access-Control-Allow-Methods"), Some("GET, POST, OPTIONS"));
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let (secrets, catalog) = untouched();
        let handler = build_handler(Config::default(), secrets, catalog);

        let invocation = Invocation::new(Method::OPTIONS)
            .with_query("udiDi", "08801234567890")
            .with_body("not json at all");
        let reply = handler.handle(&invocation).await;

        assert_eq!(reply.status_code, 200);
        assert!(reply.body.is_empty());
        assert_cors(&reply);
        assert_eq!(reply.header("content-type"), None);
    }

    #[tokio::test]
    async fn missing_identifier_is_rejected_without_collaborators() {
        let cases = [
            Invocation::new(Method::GET),
            Invocation::new(Method::POST).with_body("{}"),
            Invocation::new(Method::POST).with_body(r#"{"udiDi": ""}"#),
            Invocation::new(Method::POST).with_body("{udiDi: 0880"),
        ];
        for invocation in cases {
            let (secrets, catalog) = untouched();
            let handler = build_handler(Config::default(), secrets, catalog);

            let reply = handler.handle(&invocation).await;

            assert_eq!(reply.status_code, 400);
            assert!(reply.json().unwrap()["error"].is_string());
            assert_cors(&reply);
        }
    }

    #[tokio::test]
    async fn store_failure_is_server_error() {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_secret_string()
            .times(1)
            .returning(|_| Err(CredentialError::Store("ResourceNotFoundException".into())));
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().times(0);
        let handler = build_handler(Config::default(), secrets, catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert_eq!(reply.status_code, 500);
        assert_eq!(reply.json().unwrap(), json!({"error": "API key not configured on the server."}));
    }

    #[tokio::test]
    async fn payload_without_key_never_leaks_secret() {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_secret_string()
            .returning(|_| Ok(json!({ "WRONG_NAME": SECRET }).to_string()));
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().times(0);
        let handler = build_handler(Config::default(), secrets, catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert!((500..600).contains(&reply.status_code));
        assert!(!reply.body.contains(SECRET));
        assert!(reply.json().unwrap()["error"].is_string());
    }

    #[tokio::test]
    async fn non_json_payload_never_leaks_secret() {
        let mut secrets = MockSecretStore::new();
        secrets.expect_secret_string().returning(|_| Ok(SECRET.to_string()));
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().times(0);
        let handler = build_handler(Config::default(), secrets, catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert_eq!(reply.status_code, 500);
        assert!(!reply.body.contains(SECRET));
    }

    #[tokio::test]
    async fn found_item_is_projected() {
        let mut catalog = MockDeviceCatalog::new();
        catalog
            .expect_search()
            .withf(|key, udi_di| key.expose() == SECRET && udi_di == "08801234567890")
            .times(1)
            .returning(|_, _| {
                Ok(json!({"body": {"items": [
                    {"ENTP_NAME": "Acme", "PRDL_NM": "X1", "PRDT_NM": "Widget"}
                ]}}))
            });
        let handler = build_handler(product_info_config(), store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.header("content-type"), Some("application/json"));
        assert_eq!(
            reply.json().unwrap(),
            json!({
                "productFound": true,
                "udiDi": "08801234567890",
                "brand": "Acme",
                "model": "X1",
                "productName": "Widget"
            })
        );
    }

    #[tokio::test]
    async fn standard_code_item_is_projected() {
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().returning(|_, _| {
            Ok(json!({"response": {"header": {"resultCode": "00"}, "body": {"items": {"item": [
                {"diCd": "08801234567890", "bsshNm": "Acme", "mdlNm": "X1", "prdlstNm": "Widget", "prmitNo": "1-234"}
            ]}}}}))
        });
        let handler = build_handler(Config::default(), store_returning_key(), catalog);

        let reply = handler
            .handle(&Invocation::new(Method::GET).with_query("udiDi", "08801234567890"))
            .await;

        let body = reply.json().unwrap();
        assert_eq!(body["brand"], "Acme");
        assert_eq!(body["model"], "X1");
        assert_eq!(body["productName"], "Widget");
        assert_eq!(body.as_object().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn empty_result_is_flagged_not_found() {
        let mut catalog = MockDeviceCatalog::new();
        catalog
            .expect_search()
            .returning(|_, _| Ok(json!({"body": {"items": [], "totalCount": 0}})));
        let handler = build_handler(product_info_config(), store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("08800000000000")).await;

        assert_eq!(reply.status_code, 200);
        assert_eq!(
            reply.json().unwrap(),
            json!({"productFound": false, "message": "No product details found for this UDI-DI."})
        );
    }

    #[tokio::test]
    async fn empty_result_as_404_when_configured() {
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().returning(|_, _| Ok(json!({"body": {}})));
        let mut config = product_info_config();
        config.response.not_found = NotFoundStyle::Status;
        let handler = build_handler(config, store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("08800000000000")).await;

        assert_eq!(reply.status_code, 404);
        let body = reply.json().unwrap();
        assert!(body.get("productFound").is_none());
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn upstream_timeout_is_well_formed_server_error() {
        let mut catalog = MockDeviceCatalog::new();
        catalog
            .expect_search()
            .times(1)
            .returning(|_, _| Err(UpstreamError::Timeout));
        let handler = build_handler(Config::default(), store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert!((500..600).contains(&reply.status_code));
        let body: Value = serde_json::from_str(&reply.body).unwrap();
        assert!(body["error"].is_string());
        assert_cors(&reply);
    }

    #[tokio::test]
    async fn upstream_status_is_server_error() {
        let mut catalog = MockDeviceCatalog::new();
        catalog
            .expect_search()
            .returning(|_, _| Err(UpstreamError::Status(503)));
        let handler = build_handler(Config::default(), store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert_eq!(reply.status_code, 502);
        assert_eq!(
            reply.json().unwrap(),
            json!({"error": "Failed to retrieve product details from external API."})
        );
    }

    #[tokio::test]
    async fn rejected_result_code_is_not_reported_as_not_found() {
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().times(1).returning(|_, _| {
            Ok(json!({"response": {
                "header": {"resultCode": "30", "resultMsg": "SERVICE_KEY_IS_NOT_REGISTERED_ERROR"},
                "body": {"items": ""}
            }}))
        });
        let handler = build_handler(Config::default(), store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("08801234567890")).await;

        assert_eq!(reply.status_code, 502);
        let body = reply.json().unwrap();
        assert!(body.get("productFound").is_none());
        assert_eq!(body["error"], "Failed to retrieve product details from external API.");
    }

    #[tokio::test]
    async fn scanned_barcode_is_looked_up_by_gtin() {
        let mut catalog = MockDeviceCatalog::new();
        catalog
            .expect_search()
            .withf(|_, udi_di| udi_di == "08801234567890")
            .times(1)
            .returning(|_, _| Ok(json!({"body": {"items": [{"ENTP_NAME": "Acme"}]}})));
        let handler = build_handler(product_info_config(), store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post("0108801234567890172612311012345")).await;

        let body = reply.json().unwrap();
        assert_eq!(body["udiDi"], "08801234567890");
        assert_eq!(body["model"], "N/A");
    }

    #[tokio::test]
    async fn normalization_can_be_disabled() {
        let raw = "0108801234567890172612311012345";
        let mut catalog = MockDeviceCatalog::new();
        catalog
            .expect_search()
            .withf(move |_, udi_di| udi_di == raw)
            .times(1)
            .returning(|_, _| Ok(json!({"body": {"items": []}})));
        let mut config = product_info_config();
        config.normalize_barcodes = false;
        let handler = build_handler(config, store_returning_key(), catalog);

        let reply = handler.handle(&lookup_post(raw)).await;

        assert_eq!(reply.status_code, 200);
    }

    #[tokio::test]
    async fn repeated_lookup_is_byte_identical() {
        let mut catalog = MockDeviceCatalog::new();
        catalog.expect_search().times(2).returning(|_, _| {
            Ok(json!({"body": {"items": [
                {"ENTP_NAME": "Acme", "PRDL_NM": "X1", "PRDT_NM": "Widget", "UDI_DI": "08801234567890"}
            ]}}))
        });
        let handler = build_handler(product_info_config(), store_returning_key(), catalog);

        let first = handler.handle(&lookup_post("08801234567890")).await;
        let second = handler.handle(&lookup_post("08801234567890")).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn content_type_can_be_omitted() {
        let (secrets, catalog) = untouched();
        let mut config = Config::default();
        config.response.cors.content_type = false;
        config.response.cors.allow_origin = "https://shop.example".into();
        let handler = build_handler(config, secrets, catalog);

        let reply = handler.handle(&Invocation::new(Method::GET)).await;

        assert_eq!(reply.header("content-type"), None);
        assert_eq!(reply.header("access-control-allow-origin"), Some("https://shop.example"));
    }
}
