use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::Query,
    http::{HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use dotenvy::dotenv;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use udi_core::{Config, DataGoKrCatalog, DeviceLookupHandler, Invocation, Reply, StaticSecretStore};

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), GenericError> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let handler = match std::env::var("MED_DEVICE_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => {
            warn!("using MED_DEVICE_API_KEY from the environment instead of the secret store");
            let secrets = StaticSecretStore::with_api_key(&config.secret.key, api_key.trim());
            let catalog = DataGoKrCatalog::from_config(&config.upstream)?;
            DeviceLookupHandler::new(config, Box::new(secrets), Box::new(catalog))
        }
        _ => DeviceLookupHandler::connect(config).await?,
    };

    let router = router(Arc::new(handler));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn router(handler: Arc<DeviceLookupHandler>) -> Router {
    Router::new()
        .route("/device", get(lookup).post(lookup).options(lookup))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(handler))
}

// Query and body are decoded here rather than by rejecting extractors, so a
// malformed request still gets the handler's JSON error and CORS headers.
async fn lookup(
    Extension(handler): Extension<Arc<DeviceLookupHandler>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> HttpReply {
    let mut invocation = Invocation::new(method).with_body_bytes(&body);
    invocation.query = match Query::<HashMap<String, String>>::try_from_uri(&uri) {
        Ok(Query(query)) => query,
        Err(err) => {
            warn!(error = %err, "ignoring undecodable query string");
            HashMap::new()
        }
    };
    HttpReply(handler.handle(&invocation).await)
}

/// Carries a handler reply out through axum unchanged.
pub struct HttpReply(pub Reply);

impl IntoResponse for HttpReply {
    fn into_response(self) -> Response {
        let Reply {
            status_code,
            headers,
            body,
        } = self.0;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() =
            StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        for (name, value) in headers {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    response.headers_mut().insert(name, value);
                }
                Err(_) => warn!(header = name, "dropping header with invalid value"),
            }
        }
        response
    }
}
