use anyhow::Result;
use chrono::{DateTime, Utc};

use folio_core::store::CleanupReport;

use crate::{schema::sql_timestamp, DuckDbBackend};

impl DuckDbBackend {
    /// Delete `visits` and `events` rows created more than `days` days ago.
    ///
    /// Both deletes run in one transaction. `contact_messages` is never
    /// touched.
    pub async fn delete_older_than(&self, days: u32) -> Result<CleanupReport> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.delete_before(cutoff).await
    }

    pub(crate) async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport> {
        let cutoff_str = sql_timestamp(&cutoff);
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let visits_deleted = tx.execute(
            "DELETE FROM visits WHERE created_at < ?1",
            duckdb::params![cutoff_str],
        )?;
        let events_deleted = tx.execute(
            "DELETE FROM events WHERE created_at < ?1",
            duckdb::params![cutoff_str],
        )?;
        tx.commit()?;

        tracing::info!(
            visits_deleted,
            events_deleted,
            cutoff = %cutoff,
            "Retention cleanup complete"
        );
        Ok(CleanupReport {
            cutoff,
            visits_deleted,
            events_deleted,
        })
    }
}
