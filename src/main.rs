//! Rotor Runtime - Example line protocol server
//!
//! Serves a small HTTP handler behind the gateway adapter, routed by ARN and
//! wrapped in whichever middleware the environment configures.

use bytes::Bytes;
use hyper::Request;
use rotor::prelude::*;
use tracing_subscriber::EnvFilter;

/// Greets the caller and reports what the runtime knows about the request.
fn hello(ctx: &Context, request: Request<Bytes>, response: &mut ResponseWriter) {
    let name = request
        .headers()
        .get("x-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("World");

    let body = serde_json::json!({
        "message": format!("Hello, {}!", name),
        "method": request.method().as_str(),
        "path": request.uri().to_string(),
        "request_id": ctx.invocation().map(|inv| inv.aws_request_id.as_str()),
        "region": ctx.runtime_session().map(|s| s.region.as_str()),
    });

    if let Err(err) = response.json(&body) {
        response.write_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.text(err.to_string());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> rotor::Result<()> {
    // stdout carries protocol output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Rotor line protocol server...");

    let config = LineConfig::from_env()?;
    tracing::debug!(
        shutdown_millis = config.shutdown_millis,
        strip_base_paths = config.strip_base_paths,
        arn_pattern = %config.arn_pattern,
        "Loaded configuration"
    );

    let gateway = GatewayHandler::new(config.strip_base_paths, http_fn(hello));
    let mut mux = Mux::new()
        .match_arn(config.arn_regex()?, gateway)
        .use_middleware(EarlyTimeout::from_config(&config));

    if config.has_session() {
        mux = mux.use_middleware(WithRuntimeSession::from_config(&config)?);
        tracing::info!("Runtime session middleware enabled");
    }
    if config.resource_attributes.is_some() {
        mux = mux.use_middleware(WithResourceAttributes::from_config(&config)?);
        tracing::info!("Resource attributes middleware enabled");
    }

    LineServer::new(mux).run().await
}
