use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use deepl_bridge::command;
use deepl_bridge::config::Config;
use deepl_bridge::security::API_KEY_HEADER;
use deepl_bridge::service::{AppContext, TranslationService};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

type SharedService = Arc<TranslationService>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deepl_bridge=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("Starting DeepL bridge");

    let config = Config::from_env()?;
    let port = config.port;
    if config.bridge_api_key.is_none() {
        warn!("BRIDGE_API_KEY not set, command endpoint is unauthenticated");
    }

    let context = AppContext::from_config(config)?;
    let service = Arc::new(TranslationService::new(context)?);

    let state = service.verify_api_key().await;
    info!("DeepL session state: {}", state);

    let app = Router::new()
        .route("/health", get(health))
        .route("/data", post(data))
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(service): State<SharedService>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "state": service.state().await,
    }))
}

async fn data(
    State(service): State<SharedService>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    let reply = command::handle_request(&service, provided, &body).await;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body))
}
