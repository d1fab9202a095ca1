use async_trait::async_trait;

use folio_core::contact::ContactMessage;
use folio_core::event::{Event, Visit};
use folio_core::store::{
    CleanupReport, DailyVisitsRow, PopularPageRow, StatsStore, SummaryResult, TrafficSourceRow,
};

use crate::DuckDbBackend;

#[async_trait]
impl StatsStore for DuckDbBackend {
    async fn insert_visit(&self, visit: &Visit) -> anyhow::Result<()> {
        DuckDbBackend::insert_visit(self, visit).await
    }

    async fn insert_event(&self, event: &Event) -> anyhow::Result<()> {
        DuckDbBackend::insert_event(self, event).await
    }

    async fn insert_contact_message(&self, message: &ContactMessage) -> anyhow::Result<String> {
        DuckDbBackend::insert_contact_message(self, message).await
    }

    async fn get_summary(&self, days: u32) -> anyhow::Result<SummaryResult> {
        crate::queries::summary::get_summary_inner(self, days).await
    }

    async fn daily_visits(&self, limit: usize) -> anyhow::Result<Vec<DailyVisitsRow>> {
        DuckDbBackend::daily_visits(self, limit).await
    }

    async fn popular_pages(&self, limit: usize) -> anyhow::Result<Vec<PopularPageRow>> {
        DuckDbBackend::popular_pages(self, limit).await
    }

    async fn traffic_sources(&self, limit: usize) -> anyhow::Result<Vec<TrafficSourceRow>> {
        DuckDbBackend::traffic_sources(self, limit).await
    }

    async fn delete_older_than(&self, days: u32) -> anyhow::Result<CleanupReport> {
        DuckDbBackend::delete_older_than(self, days).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        DuckDbBackend::ping(self).await
    }
}
