use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use ::time::{format_description::well_known, OffsetDateTime};

use crate::{
    error::ScanError,
    geo::{self, GeoClient},
    parser,
    scanner::{NmapScanner, PortScanner, ScannerConfig},
    target,
    types::{Geolocation, ScanReport, ScanRequest},
};

/// Everything needed to run the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub scanner: ScannerConfig,
    /// `None` disables enrichment and the `geolocation` field is left out.
    pub geo_url: Option<String>,
    pub geo_timeout: Duration,
    pub ui_dir: PathBuf,
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3001)),
            scanner: ScannerConfig::default(),
            geo_url: Some(geo::DEFAULT_GEO_URL.to_string()),
            geo_timeout: Duration::from_secs(5),
            ui_dir: PathBuf::from("ui"),
            cors_origin: None,
        }
    }
}

/// Read-only per-process state. Nothing here is mutated by requests.
#[derive(Clone)]
pub struct AppState {
    scanner: Arc<dyn PortScanner>,
    geo: Option<GeoClient>,
}

impl AppState {
    pub fn new(scanner: Arc<dyn PortScanner>, geo: Option<GeoClient>) -> Self {
        Self { scanner, geo }
    }
}

/// API routes only. Split out so tests can drive it without the static file service.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/scan", post(post_scan))
        .route("/health", get(get_health))
        .with_state(state)
}

/// Full application: API, static UI fallback, tracing and optional CORS.
pub fn app(state: AppState, config: &ServerConfig) -> Result<Router> {
    let static_svc = ServeDir::new(&config.ui_dir).append_index_html_on_directories(true);

    let mut app = api_router(state)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = config.cors_origin.as_deref() {
        let origin = HeaderValue::from_str(origin)
            .with_context(|| format!("invalid CORS origin: {origin}"))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }
    Ok(app)
}

/// Build state from config, bind and serve until `shutdown` is cancelled.
pub async fn spawn_server(config: ServerConfig, shutdown: CancellationToken) -> Result<()> {
    let scanner = NmapScanner::new(config.scanner.clone());
    match scanner.version().await {
        Ok(v) => info!("using {v}"),
        Err(e) => warn!("nmap does not look usable, scans will fail: {e}"),
    }

    let geo = match config.geo_url.as_deref() {
        Some(url) => Some(GeoClient::new(url, config.geo_timeout)?),
        None => None,
    };
    let state = AppState::new(Arc::new(scanner), geo);
    let app = app(state, &config)?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("serving on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn post_scan(
    State(app): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanReport>, ScanError> {
    // An unreadable body is reported the same way as a missing target.
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let host = req.target.as_deref().ok_or(ScanError::InvalidTarget)?;
    let host = target::validate(host)?;
    let mode = req.scan_mode();

    info!(host, mode = mode.as_str(), "starting scan");
    let raw = app
        .scanner
        .scan(host, mode)
        .await
        .inspect_err(|e| error!(host, "scan failed: {e}"))?;

    let parsed = parser::parse_nmap_output(&raw);
    info!(host, ports = parsed.ports.len(), "scan parsed");

    let geolocation = match &app.geo {
        Some(geo) => Some(Geolocation::from(geo.lookup(host).await)),
        None => None,
    };

    let scan_time = if parsed.scan_time.is_empty() {
        ScanReport::UNKNOWN_SCAN_TIME.to_string()
    } else {
        parsed.scan_time
    };

    Ok(Json(ScanReport {
        target: host.to_string(),
        ports: parsed.ports,
        scan_time,
        scanned_at: now_rfc3339(),
        geolocation,
    }))
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
