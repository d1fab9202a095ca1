/// Retention window applied to `visits` and `events` by the daily cleanup.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub geoip_path: String,
    pub retention_days: u32,
    pub cors_origins: Vec<String>,
    pub environment: Environment,
    pub duckdb_memory_limit: String,
    pub rate_limit_disable: bool,
    pub request_logging: bool,
    /// Serve `GET /metrics` and record per-request counters.
    pub enable_metrics: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("FOLIO_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("FOLIO_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            geoip_path: std::env::var("FOLIO_GEOIP_PATH")
                .unwrap_or_else(|_| "./GeoLite2-City.mmdb".to_string()),
            retention_days: std::env::var("FOLIO_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|days| *days > 0)
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            cors_origins: std::env::var("FOLIO_CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:4321".to_string())
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            environment: {
                let raw = std::env::var("FOLIO_ENVIRONMENT")
                    .unwrap_or_else(|_| "development".to_string());
                match raw.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                }
            },
            duckdb_memory_limit: std::env::var("FOLIO_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            rate_limit_disable: env_flag("FOLIO_RATE_LIMIT_DISABLE", false),
            request_logging: env_flag("FOLIO_REQUEST_LOGGING", true),
            enable_metrics: env_flag("FOLIO_ENABLE_METRICS", true),
        })
    }
}
