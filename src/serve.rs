//! Purpose: Provide the HTTP extraction endpoint for carve.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based server mapping the three request shapes onto the pipeline.
//! Invariants: Error kinds map to HTTP statuses in exactly one place here;
//! bodies follow the published `{error}` / `{error, details}` contract.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: The transport body cap sits above the business ceiling (base64
//! slack) so the typed 413 governs every upload the platform admits.

use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use carve::api::{
    Error, ErrorKind, ExtractionRequest, Extractor, Limits, normalize_get, normalize_post,
};

#[derive(Clone, Copy, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub limits: Limits,
    pub allow_non_loopback: bool,
}

#[derive(Clone)]
struct AppState {
    extractor: Extractor,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let state = Arc::new(AppState {
        extractor: Extractor::new(config.limits)?,
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(extract_get).post(extract_post))
        .route("/extract", get(extract_get).post(extract_post))
        .layer(DefaultBodyLimit::max(transport_body_limit(&config.limits)))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, "serving extraction endpoint");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_detail("re-run with --allow-non-loopback or use a loopback address"));
    }

    if config.limits.max_upload_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-upload-bytes must be greater than zero"));
    }

    if config.limits.max_response_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-response-bytes must be greater than zero"));
    }

    if config.limits.download_timeout.is_zero() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--download-timeout must be greater than zero"));
    }

    Ok(())
}

fn transport_body_limit(limits: &Limits) -> usize {
    limits
        .max_upload_bytes
        .saturating_mul(4)
        .saturating_div(3)
        .saturating_add(64 * 1024)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn extract_get(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let request = match normalize_get(query.as_deref()) {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };
    run_extraction(&state, request).await
}

async fn extract_post(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body_is_base64 = transfer_encoding_is_base64(&headers);
    let request = match normalize_post(query.as_deref(), body, body_is_base64) {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };
    run_extraction(&state, request).await
}

async fn run_extraction(state: &AppState, request: ExtractionRequest) -> Response {
    match state.extractor.extract(request).await {
        Ok(merged) => json_response(merged),
        Err(err) => error_response(err),
    }
}

fn transfer_encoding_is_base64(headers: &HeaderMap) -> bool {
    headers
        .get("content-transfer-encoding")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("base64"))
}

fn json_response(payload: serde_json::Value) -> Response {
    Json(payload).into_response()
}

fn error_response(err: Error) -> Response {
    let status = status_for(err.kind());
    let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::warn!(error = %err, "request failed during processing");
        json!({ "error": "Failed to process file", "details": err.details_text() })
    } else {
        json!({ "error": err.message().unwrap_or("invalid request") })
    };
    (status, Json(body)).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest | ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge | ErrorKind::ResponseTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Download | ErrorKind::Decode | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> ServeConfig {
        ServeConfig {
            bind: "127.0.0.1:0".parse().expect("bind"),
            limits: Limits::default(),
            allow_non_loopback: false,
        }
    }

    #[test]
    fn non_loopback_bind_requires_opt_in() {
        let config = ServeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            ..loopback_config()
        };
        let err = validate_config(&config).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let config = ServeConfig {
            allow_non_loopback: true,
            ..config
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_ceilings_are_rejected() {
        let mut config = loopback_config();
        config.limits.max_upload_bytes = 0;
        assert!(validate_config(&config).is_err());

        let mut config = loopback_config();
        config.limits.max_response_bytes = 0;
        assert!(validate_config(&config).is_err());

        let mut config = loopback_config();
        config.limits.download_timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn status_mapping_follows_the_contract() {
        assert_eq!(status_for(ErrorKind::InvalidRequest), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::PayloadTooLarge),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(ErrorKind::ResponseTooLarge),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(ErrorKind::Download),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ErrorKind::Decode),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn transfer_encoding_header_detection_is_lenient() {
        let mut headers = HeaderMap::new();
        assert!(!transfer_encoding_is_base64(&headers));
        headers.insert("content-transfer-encoding", "BASE64 ".parse().expect("value"));
        assert!(transfer_encoding_is_base64(&headers));
        headers.insert("content-transfer-encoding", "binary".parse().expect("value"));
        assert!(!transfer_encoding_is_base64(&headers));
    }

    #[test]
    fn transport_cap_leaves_room_for_base64_expansion() {
        let limits = Limits::default();
        assert!(transport_body_limit(&limits) > limits.max_upload_bytes * 4 / 3);
    }
}
