#![deny(clippy::print_stdout, clippy::print_stderr)]

mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod request;
pub mod stream;
pub mod unary;
pub mod upstream;

pub use cli::Cli;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use models::ModelAllowlist;
pub use upstream::UpstreamClient;

use std::convert::Infallible;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use bytes::Bytes;
use http::HeaderMap;
use http::HeaderValue;
use http::StatusCode;
use http::header::CACHE_CONTROL;
use http::header::CONNECTION;
use http::header::CONTENT_TYPE;
use msgbridge_protocol::client::ClientRequest;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::stream::StreamOutcome;
use crate::stream::StreamTranslator;

/// Largest accepted request body. Inline base64 images make chat requests
/// far bigger than axum's default limit.
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared, read-only request context.
#[derive(Debug, Clone)]
pub struct AppState {
    pub models: ModelAllowlist,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self {
            models: cfg.models.clone(),
            upstream: UpstreamClient::new(&cfg.upstream_endpoint),
        }
    }
}

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.debug);

    let cfg = GatewayConfig::from_cli(&cli)?;
    let state = AppState::from_config(&cfg);
    info!(
        upstream = state.upstream.messages_url(),
        default_model = cfg.models.default_model(),
        "forwarding chat completions"
    );

    let app = build_app(state, &cfg.cors_origins);
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    info!("msgbridge listening on http://{}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,msgbridge_server=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .with_state(state);

    if !cors_origins.is_empty() {
        let cors = if cors_origins.iter().any(|o| o == "*") {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins = cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect::<Vec<HeaderValue>>();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        };
        app = app.layer(cors);
    }
    app.layer(TraceLayer::new_for_http())
}

/// `chatcmpl-<uuid>`, the id format clients expect for completions.
pub(crate) fn new_completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

pub(crate) fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "msgbridge: chat completions served by a messages API backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "code": StatusCode::NOT_FOUND.as_u16(),
            "message": "Path not found",
        })),
    )
}

async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.models.to_model_list())
}

async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match proxy_chat(state, headers, body).await {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    }
}

async fn proxy_chat(
    state: AppState,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> error::Result<Response> {
    let api_key = upstream::bearer_token(&headers)?;
    let body = body.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let req: ClientRequest =
        serde_json::from_slice(&body).map_err(|e| GatewayError::BadRequest(e.to_string()))?;

    let model = state.models.resolve(req.model.as_deref()).to_string();
    if req.model.as_deref() != Some(model.as_str()) {
        debug!(requested = ?req.model, model = %model, "using default model");
    }

    let upstream_req = request::translate_request(&req, &model, req.stream)?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        match serde_json::to_string(&upstream_req) {
            Ok(json) => debug!("upstream request: {json}"),
            Err(e) => debug!("upstream request not printable: {e}"),
        }
    }

    let resp = state.upstream.send(&api_key, &upstream_req).await?;
    if req.stream {
        stream_reply(resp, model).await
    } else {
        unary_reply(resp, &model).await
    }
}

async fn unary_reply(resp: reqwest::Response, model: &str) -> error::Result<Response> {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(GatewayError::UpstreamUnavailable)?;
    let reply = unary::translate_response(status, &body, model)?;
    Ok(Json(reply).into_response())
}

async fn stream_reply(resp: reqwest::Response, model: String) -> error::Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        // Nothing has been streamed yet, so the client can still get a
        // regular JSON error carrying the upstream status.
        let body = resp
            .bytes()
            .await
            .map_err(GatewayError::UpstreamUnavailable)?;
        return Err(match unary::translate_response(status, &body, &model) {
            Err(e) => e,
            Ok(_) => unary::status_error(status),
        });
    }

    let translator = StreamTranslator::new(model);
    let upstream = resp.bytes_stream();
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(64);
    tokio::spawn(async move {
        match stream::pump(upstream, translator, tx).await {
            Ok(StreamOutcome::Completed { chunks, text_len }) => {
                debug!(chunks, text_len, "stream completed");
            }
            Ok(StreamOutcome::ClientDisconnected) => info!("client disconnected mid-stream"),
            Err(e) => warn!("stream aborted: {e}"),
        }
    });

    let mut r = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    let headers = r.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(r)
}
