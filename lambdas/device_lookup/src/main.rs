use lambda_http::{run, service_fn, tracing};
use lambda_http::{Body, Error, Request, RequestExt, Response};
use udi_core::invocation::UDI_DI_FIELD;
use udi_core::{Config, DeviceLookupHandler, Invocation, Reply};

async fn function_handler(handler: &DeviceLookupHandler, event: Request) -> Result<Response<Body>, Error> {
    let reply = handler.handle(&invocation(&event)).await;
    into_response(reply)
}

fn invocation(event: &Request) -> Invocation {
    let mut invocation = Invocation::new(event.method().clone());

    if let Some(udi_di) = event.query_string_parameters().first(UDI_DI_FIELD) {
        invocation = invocation.with_query(UDI_DI_FIELD, udi_di);
    }

    match event.body() {
        Body::Empty => invocation,
        Body::Text(text) => invocation.with_body(text.as_str()),
        Body::Binary(bytes) => invocation.with_body_bytes(bytes),
    }
}

fn into_response(reply: Reply) -> Result<Response<Body>, Error> {
    let mut builder = Response::builder().status(reply.status_code);
    for (name, value) in &reply.headers {
        builder = builder.header(*name, value.as_str());
    }

    let body = if reply.body.is_empty() {
        Body::Empty
    } else {
        Body::from(reply.body)
    };
    Ok(builder.body(body)?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!(
        profile = ?config.upstream.profile,
        endpoint = %config.upstream.endpoint,
        secret = %config.secret.name,
        "starting device lookup"
    );
    let handler = DeviceLookupHandler::connect(config).await?;
    let handler = &handler;

    run(service_fn(move |event: Request| async move { function_handler(handler, event).await })).await
}
