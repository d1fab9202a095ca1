use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info, warn};

use folio_core::{config::Config, store::StatsStore};

use crate::{enrich::GeoReader, metrics::HttpMetrics};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const RATE_LIMIT_MAX_REQUESTS: usize = 60;
/// Map size at which `check_rate_limit` sweeps idle IPs inline.
const RATE_LIMIT_SWEEP_THRESHOLD: usize = 10_000;
const RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// Persistence for visits, events and contact messages.
    pub store: Arc<dyn StatsStore>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// MaxMind City database, if one is present at `config.geoip_path`.
    /// Loaded once; `None` leaves geo to the CDN headers.
    pub geoip: Option<Arc<GeoReader>>,

    /// Prometheus counters, present when `FOLIO_ENABLE_METRICS` is on.
    pub metrics: Option<Arc<HttpMetrics>>,

    /// Per-IP sliding-window rate limiter for the POST routes.
    ///
    /// Key: IP address string. Value: deque of request timestamps within the
    /// last 60 seconds. Limit: 60 requests per IP per window. Keys whose
    /// window has emptied are removed.
    rate_limiter: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl AppState {
    /// Construct a new `AppState` wrapping the given store and config.
    ///
    /// The GeoIP database is opened here; a missing or unreadable file is
    /// logged and geo enrichment falls back to CDN headers.
    pub fn new(store: Arc<dyn StatsStore>, config: Config) -> Self {
        let geoip = if std::path::Path::new(&config.geoip_path).exists() {
            match maxminddb::Reader::open_readfile(&config.geoip_path) {
                Ok(reader) => Some(Arc::new(reader)),
                Err(e) => {
                    warn!(geoip_path = %config.geoip_path, error = %e, "Failed to open GeoIP database");
                    None
                }
            }
        } else {
            warn!(
                geoip_path = %config.geoip_path,
                "GeoIP database not found. Geo fields come from CDN headers only."
            );
            None
        };

        let metrics = if config.enable_metrics {
            match HttpMetrics::new() {
                Ok(metrics) => Some(Arc::new(metrics)),
                Err(e) => {
                    warn!(error = %e, "Failed to register metrics; /metrics disabled");
                    None
                }
            }
        } else {
            None
        };

        Self {
            store,
            config: Arc::new(config),
            geoip,
            metrics,
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check whether `ip` is within the 60 req/min rate limit.
    ///
    /// Returns `true` if the request should proceed, `false` if it should be
    /// rejected with 429. Slides the window on every call.
    pub async fn check_rate_limit(&self, ip: &str) -> bool {
        if self.config.rate_limit_disable {
            return true;
        }
        let now = Instant::now();
        let mut map = self.rate_limiter.lock().await;
        if map.len() >= RATE_LIMIT_SWEEP_THRESHOLD {
            sweep_expired(&mut map, now);
        }
        let window = map.entry(ip.to_string()).or_default();
        prune_window(window, now);
        if window.len() >= RATE_LIMIT_MAX_REQUESTS {
            return false;
        }
        window.push_back(now);
        true
    }

    /// Drop every IP whose window no longer holds a request.
    pub async fn sweep_rate_limiter(&self) {
        let mut map = self.rate_limiter.lock().await;
        let before = map.len();
        sweep_expired(&mut map, Instant::now());
        debug!(removed = before - map.len(), tracked = map.len(), "Rate limiter swept");
    }

    /// Number of IPs currently holding a rate-limit window.
    pub async fn rate_limited_ips(&self) -> usize {
        self.rate_limiter.lock().await.len()
    }

    /// Run one retention pass with the configured window.
    pub async fn run_retention_once(&self) {
        self.sweep_rate_limiter().await;
        match self.store.delete_older_than(self.config.retention_days).await {
            Ok(report) => info!(
                retention_days = self.config.retention_days,
                visits_deleted = report.visits_deleted,
                events_deleted = report.events_deleted,
                "Retention cleanup ran"
            ),
            Err(e) => error!(error = %e, "Retention cleanup failed; will retry next cycle"),
        }
    }

    /// Background loop: delete expired visits and events once a day.
    ///
    /// The first pass runs immediately at startup. A failed pass is logged
    /// and does not stop the loop.
    pub async fn run_retention_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(RETENTION_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_retention_once().await;
        }
    }
}

/// Drop timestamps older than the window.
fn prune_window(window: &mut VecDeque<Instant>, now: Instant) {
    while window
        .front()
        .is_some_and(|t| now.duration_since(*t) > RATE_LIMIT_WINDOW)
    {
        window.pop_front();
    }
}

fn sweep_expired(map: &mut HashMap<String, VecDeque<Instant>>, now: Instant) {
    map.retain(|_, window| {
        prune_window(window, now);
        !window.is_empty()
    });
}
