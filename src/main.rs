use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nmap_web_rs::geo::DEFAULT_GEO_URL;
use nmap_web_rs::scanner::ScannerConfig;
use nmap_web_rs::server::{self, ServerConfig};

/// nmap-web-rs: run nmap from the browser and get the results back as JSON.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nmap-web-rs",
    version,
    about = "Run nmap from the browser and get the results back as JSON.",
    long_about = None
)]
struct Cli {
    /// Address the HTTP server listens on.
    #[arg(long, default_value = "127.0.0.1:3001")]
    bind: SocketAddr,

    /// nmap executable to run.
    #[arg(long = "nmap-bin", default_value = "nmap")]
    nmap_bin: PathBuf,

    /// Max nmap processes running at the same time.
    #[arg(long = "max-concurrent-scans", default_value_t = 4)]
    max_concurrent_scans: usize,

    /// Kill a scan after this many seconds (0 = never).
    #[arg(long = "scan-timeout-secs", default_value_t = 600)]
    scan_timeout_secs: u64,

    /// Geolocation URL; `{target}` is replaced with the scanned host.
    #[arg(long = "geo-url", default_value = DEFAULT_GEO_URL)]
    geo_url: String,

    /// Geolocation request timeout in milliseconds.
    #[arg(long = "geo-timeout-ms", default_value_t = 5000)]
    geo_timeout_ms: u64,

    /// Skip geolocation entirely.
    #[arg(long = "no-geo", default_value_t = false)]
    no_geo: bool,

    /// Directory with the static web UI.
    #[arg(long = "ui-dir", default_value = "ui")]
    ui_dir: PathBuf,

    /// Allow cross-origin requests from this origin (e.g. http://localhost:3000).
    #[arg(long = "cors-origin")]
    cors_origin: Option<String>,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        ServerConfig {
            bind: cli.bind,
            scanner: ScannerConfig {
                binary: cli.nmap_bin,
                max_concurrent: cli.max_concurrent_scans,
                timeout: (cli.scan_timeout_secs > 0)
                    .then(|| Duration::from_secs(cli.scan_timeout_secs)),
            },
            geo_url: (!cli.no_geo).then_some(cli.geo_url),
            geo_timeout: Duration::from_millis(cli.geo_timeout_ms),
            ui_dir: cli.ui_dir,
            cors_origin: cli.cors_origin,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nmap_web_rs=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    info!(
        bind = %cli.bind,
        nmap = %cli.nmap_bin.display(),
        max_concurrent = cli.max_concurrent_scans,
        timeout_secs = cli.scan_timeout_secs,
        geo = !cli.no_geo,
        ui_dir = %cli.ui_dir.display(),
        "nmap-web-rs configuration"
    );

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down");
        on_ctrl_c.cancel();
    });

    server::spawn_server(cli.into(), shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_server_config() {
        let cli = Cli::parse_from(["nmap-web-rs"]);
        let cfg = ServerConfig::from(cli);
        assert_eq!(cfg.bind.port(), 3001);
        assert_eq!(cfg.scanner.timeout, Some(Duration::from_secs(600)));
        assert_eq!(cfg.geo_url.as_deref(), Some(DEFAULT_GEO_URL));
    }

    #[test]
    fn zero_timeout_and_no_geo() {
        let cli = Cli::parse_from(["nmap-web-rs", "--scan-timeout-secs", "0", "--no-geo"]);
        let cfg = ServerConfig::from(cli);
        assert_eq!(cfg.scanner.timeout, None);
        assert!(cfg.geo_url.is_none());
    }
}
