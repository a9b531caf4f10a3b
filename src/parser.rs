use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ParsedOutput, PortRecord};

// ASCII classes on purpose: nmap output is ASCII and `\w` in `regex` is Unicode-aware.
static PORT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)/(tcp|udp)\s+([A-Za-z0-9_]+)\s+([A-Za-z0-9_]+)")
        .expect("valid port line pattern")
});

static SCAN_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"scanned in (.+)$").expect("valid scan time pattern"));

/// Extract port records and the elapsed-time string from nmap's normal text output.
///
/// Each line is looked at on its own:
/// - `22/tcp open ssh` style lines become a [`PortRecord`] (state lowercased, service kept as-is)
/// - the first line containing `scanned in <value>` sets `scan_time`
/// - everything else is skipped
///
/// Never fails. A report with nothing recognizable gives an empty port list and an empty
/// `scan_time`; substituting a placeholder is up to the caller.
pub fn parse_nmap_output(output: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();

    for raw_line in output.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(record) = parse_port_line(line) {
            parsed.ports.push(record);
        }

        if parsed.scan_time.is_empty() {
            if let Some(caps) = SCAN_TIME_RE.captures(line) {
                parsed.scan_time = caps[1].to_string();
            }
        }
    }

    parsed
}

fn parse_port_line(line: &str) -> Option<PortRecord> {
    let caps = PORT_LINE_RE.captures(line)?;
    // Numbers that don't fit a port are treated like any other unrecognized line.
    let port = caps[1].parse::<u16>().ok()?;
    Some(PortRecord {
        port,
        protocol: caps[2].to_string(),
        state: caps[3].to_lowercase(),
        service: caps[4].to_string(),
    })
}
