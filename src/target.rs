use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScanError;

// Octets are only checked for digit count, so 999.999.999.999 is accepted.
static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,3}\.){3}[0-9]{1,3}$").expect("valid ipv4 pattern"));

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]{1,61}[a-zA-Z0-9](?:\.[a-zA-Z]{2,})+$")
        .expect("valid domain pattern")
});

/// Syntactic check for a scan target: dotted-quad IPv4 or a domain name.
///
/// This says nothing about reachability or whether the name resolves.
pub fn is_valid_target(target: &str) -> bool {
    IPV4_RE.is_match(target) || DOMAIN_RE.is_match(target)
}

/// Like [`is_valid_target`] but as a `Result`, for use with `?` in the handler.
pub fn validate(target: &str) -> Result<&str, ScanError> {
    if is_valid_target(target) {
        Ok(target)
    } else {
        Err(ScanError::InvalidTarget)
    }
}
