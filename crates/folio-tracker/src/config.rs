use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid FOLIO_API_URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("FOLIO_API_URL must use http or https, got {0}")]
    UnsupportedScheme(String),
}

/// Where the tracker sends its payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub api_url: Url,
}

impl TrackerConfig {
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(api_url.trim())?;
        match parsed.scheme() {
            "http" | "https" => Ok(Self { api_url: parsed }),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Reads `FOLIO_API_URL`, falling back to the local development server.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("FOLIO_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(&raw)
    }

    /// `path` appended to the API base, keeping any path prefix the base
    /// carries (`https://host/prefix` + `/api/x` is `https://host/prefix/api/x`).
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(TrackerConfig::new("https://api.example.com").is_ok());
        assert_eq!(
            TrackerConfig::new(DEFAULT_API_URL).expect("default").api_url.as_str(),
            "http://localhost:8000/"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let config = TrackerConfig::new("https://example.com/portfolio-api").expect("config");
        assert_eq!(
            config.endpoint("/api/stats/track").expect("url").as_str(),
            "https://example.com/portfolio-api/api/stats/track"
        );

        let trailing = TrackerConfig::new("https://example.com/portfolio-api/").expect("config");
        assert_eq!(
            trailing.endpoint("/api/contact/submit").expect("url").as_str(),
            "https://example.com/portfolio-api/api/contact/submit"
        );

        let bare = TrackerConfig::new(DEFAULT_API_URL).expect("config");
        assert_eq!(
            bare.endpoint("/api/stats/event").expect("url").as_str(),
            "http://localhost:8000/api/stats/event"
        );
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(matches!(
            TrackerConfig::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            TrackerConfig::new("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
