use serde::{Deserialize, Serialize};

/// Which nmap argument template to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Default port set (`-F`).
    #[default]
    Quick,
    /// Every TCP port (`-p-`).
    Full,
}

impl ScanMode {
    /// Lenient parse used for the request field: anything unrecognized is `Quick`.
    pub fn from_request(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("full") => ScanMode::Full,
            _ => ScanMode::Quick,
        }
    }

    /// nmap flags for this mode. The target is appended by the caller.
    pub fn nmap_args(self) -> &'static [&'static str] {
        match self {
            ScanMode::Quick => &["-T4", "-F"],
            ScanMode::Full => &["-T4", "-p-"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Quick => "quick",
            ScanMode::Full => "full",
        }
    }
}

/// One `<port>/<proto> <state> <service>` line from the report.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
}

/// What the parser extracts from a report. `scan_time` is empty when no timing line was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    pub ports: Vec<PortRecord>,
    pub scan_time: String,
}

/// Approximate physical location of a target.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Geolocation as it appears on the wire: an object, or a marker string when the lookup failed.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Geolocation {
    Found(GeoInfo),
    Unavailable(String),
}

impl Geolocation {
    pub const UNAVAILABLE: &'static str = "unavailable";

    pub fn unavailable() -> Self {
        Geolocation::Unavailable(Self::UNAVAILABLE.to_string())
    }
}

impl From<Option<GeoInfo>> for Geolocation {
    fn from(v: Option<GeoInfo>) -> Self {
        v.map(Geolocation::Found).unwrap_or_else(Geolocation::unavailable)
    }
}

/// Body of a successful `POST /scan`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub target: String,
    pub ports: Vec<PortRecord>,
    pub scan_time: String,
    pub scanned_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

impl ScanReport {
    /// Reported in place of an empty `scanTime`.
    pub const UNKNOWN_SCAN_TIME: &'static str = "unknown";
}

/// Body of `POST /scan`. Both fields are optional at the serde level so a missing
/// target can be answered with the same 400 as a malformed one.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub target: Option<String>,
    /// Kept as raw JSON: a non-string value is just an unrecognized mode, not a bad request.
    #[serde(default)]
    pub scan_type: Option<serde_json::Value>,
}

impl ScanRequest {
    pub fn scan_mode(&self) -> ScanMode {
        ScanMode::from_request(self.scan_type.as_ref().and_then(serde_json::Value::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scan_type_falls_back_to_quick() {
        assert_eq!(ScanMode::from_request(None), ScanMode::Quick);
        assert_eq!(ScanMode::from_request(Some("aggressive")), ScanMode::Quick);
        assert_eq!(ScanMode::from_request(Some("FULL")), ScanMode::Full);
        assert_eq!(ScanMode::from_request(Some("quick")), ScanMode::Quick);
    }

    #[test]
    fn non_string_scan_type_still_parses_as_quick() {
        for body in [
            r#"{"target":"example.com","scanType":1}"#,
            r#"{"target":"example.com","scanType":["full"]}"#,
            r#"{"target":"example.com","scanType":null}"#,
        ] {
            let req: ScanRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.target.as_deref(), Some("example.com"));
            assert_eq!(req.scan_mode(), ScanMode::Quick, "body: {body}");
        }
        let req: ScanRequest =
            serde_json::from_str(r#"{"target":"example.com","scanType":"full"}"#).unwrap();
        assert_eq!(req.scan_mode(), ScanMode::Full);
    }

    #[test]
    fn full_mode_scans_every_port() {
        assert!(ScanMode::Full.nmap_args().contains(&"-p-"));
        assert!(ScanMode::Quick.nmap_args().contains(&"-F"));
    }

    #[test]
    fn report_serializes_camel_case_and_omits_missing_geo() {
        let report = ScanReport {
            target: "example.com".into(),
            ports: vec![],
            scan_time: "1.00 seconds".into(),
            scanned_at: "2024-01-01T00:00:00Z".into(),
            geolocation: None,
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["scanTime"], "1.00 seconds");
        assert!(v.get("geolocation").is_none());
    }

    #[test]
    fn failed_geo_is_a_marker_string() {
        let g: Geolocation = None.into();
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(v, serde_json::json!("unavailable"));
    }
}
