//! Relational store abstraction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{contact::ContactMessage, event::Event, event::Visit};

/// Bounds for the `days` window of [`StatsStore::get_summary`].
pub const SUMMARY_MIN_DAYS: u32 = 1;
pub const SUMMARY_MAX_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCount {
    pub url: String,
    pub visits: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferrerCount {
    pub source: String,
    pub visits: i64,
}

/// Aggregates over the trailing `period_days` of visits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub period_days: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_visits: i64,
    /// Distinct session ids; sessions are per-tab so this over-counts people.
    pub unique_visitors: i64,
    pub devices: BTreeMap<String, i64>,
    pub top_pages: Vec<PageCount>,
    pub top_referrers: Vec<ReferrerCount>,
}

/// One row of the `daily_visits` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyVisitsRow {
    pub day: String,
    pub visits: i64,
    pub unique_sessions: i64,
    pub avg_time_on_page: Option<f64>,
    pub avg_scroll_depth: Option<f64>,
}

/// One row of the `popular_pages` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularPageRow {
    pub page_url: String,
    pub page_title: Option<String>,
    pub visits: i64,
    pub unique_sessions: i64,
    pub avg_time_on_page: Option<f64>,
}

/// One row of the `traffic_sources` view. `source` is `"direct"` for visits
/// without a referrer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSourceRow {
    pub source: String,
    pub visits: i64,
    pub unique_sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cutoff: DateTime<Utc>,
    pub visits_deleted: usize,
    pub events_deleted: usize,
}

#[async_trait::async_trait]
pub trait StatsStore: Send + Sync + 'static {
    async fn insert_visit(&self, visit: &Visit) -> anyhow::Result<()>;

    async fn insert_event(&self, event: &Event) -> anyhow::Result<()>;

    /// Returns the stored row id.
    async fn insert_contact_message(&self, message: &ContactMessage) -> anyhow::Result<String>;

    async fn get_summary(&self, days: u32) -> anyhow::Result<SummaryResult>;

    async fn daily_visits(&self, limit: usize) -> anyhow::Result<Vec<DailyVisitsRow>>;

    async fn popular_pages(&self, limit: usize) -> anyhow::Result<Vec<PopularPageRow>>;

    async fn traffic_sources(&self, limit: usize) -> anyhow::Result<Vec<TrafficSourceRow>>;

    /// Delete `visits` and `events` rows older than `days`. Contact messages
    /// are kept.
    async fn delete_older_than(&self, days: u32) -> anyhow::Result<CleanupReport>;

    async fn ping(&self) -> anyhow::Result<()>;
}
