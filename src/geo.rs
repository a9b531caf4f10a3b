use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::GeoInfo;

pub const DEFAULT_GEO_URL: &str = "https://ipinfo.io/{target}/json";

/// Shape of the lookup service's reply. Everything is optional; `loc` is `"lat,long"`.
#[derive(Debug, Deserialize)]
struct GeoReply {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    loc: Option<String>,
}

impl From<GeoReply> for GeoInfo {
    fn from(r: GeoReply) -> Self {
        let (latitude, longitude) = r.loc.as_deref().map(split_loc).unwrap_or((0.0, 0.0));
        GeoInfo {
            country: r.country.unwrap_or_default(),
            region: r.region.unwrap_or_default(),
            city: r.city.unwrap_or_default(),
            latitude,
            longitude,
        }
    }
}

/// `"37.4,-122.1"` -> `(37.4, -122.1)`. Missing or unparseable halves become `0.0`.
fn split_loc(loc: &str) -> (f64, f64) {
    let mut parts = loc.split(',').map(|p| p.trim().parse::<f64>().unwrap_or(0.0));
    let lat = parts.next().unwrap_or(0.0);
    let lon = parts.next().unwrap_or(0.0);
    (lat, lon)
}

/// Best-effort HTTP geolocation lookup keyed by the scan target.
#[derive(Debug, Clone)]
pub struct GeoClient {
    http: reqwest::Client,
    url_template: String,
}

impl GeoClient {
    /// `url_template` must contain `{target}`, which is replaced by the host being looked up.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build geolocation HTTP client")?;
        Ok(Self {
            http,
            url_template: url_template.into(),
        })
    }

    pub fn url_for(&self, target: &str) -> String {
        self.url_template.replace("{target}", target)
    }

    /// Look up `target`. Any failure is logged and turned into `None`.
    pub async fn lookup(&self, target: &str) -> Option<GeoInfo> {
        match self.try_lookup(target).await {
            Ok(info) => {
                debug!(host = target, ?info, "geolocation resolved");
                Some(info)
            }
            Err(e) => {
                warn!(host = target, "geolocation lookup failed: {e:#}");
                None
            }
        }
    }

    async fn try_lookup(&self, target: &str) -> Result<GeoInfo> {
        let url = self.url_for(target);
        let reply: GeoReply = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .context("unexpected geolocation body")?;
        Ok(reply.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_is_split_into_floats() {
        assert_eq!(split_loc("37.3860,-122.0838"), (37.386, -122.0838));
        assert_eq!(split_loc("garbage"), (0.0, 0.0));
        assert_eq!(split_loc("12.5"), (12.5, 0.0));
    }

    #[test]
    fn missing_fields_default() {
        let reply: GeoReply = serde_json::from_str(r#"{"city":"Paris"}"#).unwrap();
        let info = GeoInfo::from(reply);
        assert_eq!(info.city, "Paris");
        assert_eq!(info.country, "");
        assert_eq!((info.latitude, info.longitude), (0.0, 0.0));
    }

    #[test]
    fn template_substitution() {
        let c = GeoClient::new(DEFAULT_GEO_URL, Duration::from_secs(1)).unwrap();
        assert_eq!(c.url_for("8.8.8.8"), "https://ipinfo.io/8.8.8.8/json");
    }

    #[tokio::test]
    async fn unreachable_service_yields_none() {
        // Port 1 on loopback is reliably closed.
        let c = GeoClient::new("http://127.0.0.1:1/{target}", Duration::from_millis(500)).unwrap();
        assert!(c.lookup("example.com").await.is_none());
    }
}
