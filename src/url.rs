//! Base URL normalization. Every URL the engine compares, stores or probes goes
//! through [`normalize`], so string equality is enough for deduplication.

use std::fmt;
use std::str::FromStr;

use crate::error::{DiscoveryError, Result};

/// Normalized `scheme://host:port` root, no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseUrl(String);

/// Trims whitespace, strips trailing slashes and lowercases scheme and authority.
/// Idempotent.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw
        .trim_start()
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let (authority, path) = match rest.find('/') {
                Some(i) => rest.split_at(i),
                None => (rest, ""),
            };
            format!(
                "{}://{}{}",
                scheme.to_ascii_lowercase(),
                authority.to_ascii_lowercase(),
                path
            )
        }
        None => trimmed.to_string(),
    }
}

impl BaseUrl {
    /// Normalizes and validates `raw`. Only `http` and `https` URLs with a host
    /// and without query or fragment are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        let parsed = reqwest::Url::parse(&normalized)
            .map_err(|e| DiscoveryError::InvalidUrl(format!("{raw:?}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(DiscoveryError::InvalidUrl(format!(
                "{raw:?}: unsupported scheme {}",
                parsed.scheme()
            )));
        }
        if parsed.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(DiscoveryError::InvalidUrl(format!("{raw:?}: missing host")));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(DiscoveryError::InvalidUrl(format!(
                "{raw:?}: query and fragment are not allowed"
            )));
        }
        Ok(BaseUrl(normalized))
    }

    /// `http://{host}:{port}`, as used for every generated candidate.
    pub fn from_host(host: &str, port: u16) -> Self {
        BaseUrl(normalize(&format!("http://{host}:{port}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Joins `path` onto the base, inserting the leading slash when missing.
    pub fn join(&self, path: &str) -> String {
        join_path(&self.0, path)
    }
}

pub(crate) fn join_path(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BaseUrl {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        BaseUrl::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slashes_and_whitespace() {
        assert_eq!(normalize("  http://10.0.0.5:8000///  "), "http://10.0.0.5:8000");
        assert_eq!(normalize("http://10.0.0.5:8000/ /"), "http://10.0.0.5:8000");
    }

    #[test]
    fn normalize_lowercases_scheme_and_host_only() {
        assert_eq!(
            normalize("HTTP://RaspberryPi.LOCAL:8000/Api/"),
            "http://raspberrypi.local:8000/Api"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "HTTP://X.Y.Z:8000/",
            " http://a/  /",
            "https://Host/Path//",
            "not a url/",
            "",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn parse_accepts_http_and_https() {
        let url = BaseUrl::parse("HTTP://192.168.1.100:8000/").unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.100:8000");
        assert!(BaseUrl::parse("https://drinkmaster.example").is_ok());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(BaseUrl::parse("").is_err());
        assert!(BaseUrl::parse("192.168.1.100:8000").is_err());
        assert!(BaseUrl::parse("ftp://192.168.1.100").is_err());
        assert!(BaseUrl::parse("http://host:8000/?x=1").is_err());
    }

    #[test]
    fn join_inserts_leading_slash() {
        let base = BaseUrl::from_host("192.168.1.100", 8000);
        assert_eq!(base.join("/a/b"), "http://192.168.1.100:8000/a/b");
        assert_eq!(base.join("a/b"), "http://192.168.1.100:8000/a/b");
    }
}
