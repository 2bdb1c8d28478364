//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the review, health and version handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Map dispatch failures to status codes
//! - Bind server to listener, with or without TLS

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::Options;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::net::tls::{load_tls_config, TlsError};
use crate::observability::metrics;
use crate::webhook::{DispatchError, ReviewKind, WebhookDispatcher};

const REVIEW_PREFIX: &str = "/authorize/";

/// How long in-flight requests may run once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: WebhookDispatcher,
    pub max_body_bytes: usize,
}

/// HTTP server for the review webhooks.
pub struct HttpServer {
    router: Router,
    options: Options,
}

impl HttpServer {
    pub fn new(options: Options, dispatcher: WebhookDispatcher) -> Self {
        let state = AppState {
            dispatcher,
            max_body_bytes: options.max_body_bytes,
        };
        let router = Self::build_router(&options, state);
        Self { router, options }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(options: &Options, state: AppState) -> Router {
        Router::new()
            .route("/authorize/{kind}", post(review_handler))
            .route("/health", get(health_handler))
            .route("/version", get(version_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(options.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process calls.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        if self.options.tls.is_enabled() {
            let tls = load_tls_config(&self.options.tls).await?;
            tracing::info!(address = %addr, "HTTPS server starting");

            let handle = axum_server::Handle::new();
            let drain = handle.clone();
            tokio::spawn(async move {
                shutdown.triggered().await;
                drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
            });

            axum_server::from_tcp_rustls(listener.into_std()?, tls)
                .handle(handle)
                .serve(app)
                .await?;
        } else {
            tracing::info!(address = %addr, "HTTP server starting");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.triggered().await })
                .await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Status code for a review that could not be answered.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::UnknownKind(_) => StatusCode::NOT_FOUND,
        DispatchError::Decode(_) => StatusCode::BAD_REQUEST,
        DispatchError::Provider(_) | DispatchError::AuthorizationDisabled => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Answers `POST /authorize/{kind}`.
///
/// The kind is taken from the raw path segment and resolved before the
/// body is read, so an unknown kind is always 404.
async fn review_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(&request);
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let raw_kind = request
        .uri()
        .path()
        .strip_prefix(REVIEW_PREFIX)
        .unwrap_or_default()
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        client_ip = %client_ip,
        kind = %raw_kind,
        "Review request"
    );

    let kind = match ReviewKind::from_str(&raw_kind) {
        Ok(kind) => kind,
        Err(err) => return reject(&request_id, "unknown", err, start),
    };

    let body = match axum::body::to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Unable to read request body");
            metrics::record_review(kind.as_str(), "decode_error", start);
            return (StatusCode::BAD_REQUEST, "unable to read request body").into_response();
        }
    };

    match state.dispatcher.answer(kind, &body) {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                client_ip = %client_ip,
                kind = kind.as_str(),
                outcome = response.outcome(),
                "Review answered"
            );
            metrics::record_review(kind.as_str(), response.outcome(), start);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => reject(&request_id, kind.as_str(), err, start),
    }
}

fn reject(request_id: &str, kind: &'static str, err: DispatchError, start: Instant) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(request_id = %request_id, kind, error = %err, "Review failed");
    } else {
        tracing::warn!(request_id = %request_id, kind, error = %err, "Review rejected");
    }
    metrics::record_review(kind, err.outcome(), start);
    (status, err.to_string()).into_response()
}

async fn health_handler() -> &'static str {
    "OK\n"
}

async fn version_handler() -> String {
    format!("{}\n", env!("CARGO_PKG_VERSION"))
}
