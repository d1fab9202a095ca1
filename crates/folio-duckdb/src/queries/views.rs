//! Readers for the reporting views declared in [`crate::schema`].

use anyhow::Result;

use folio_core::store::{DailyVisitsRow, PopularPageRow, TrafficSourceRow};

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Most recent days first.
    pub async fn daily_visits(&self, limit: usize) -> Result<Vec<DailyVisitsRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT CAST(day AS VARCHAR), visits, unique_sessions, \
                    CAST(avg_time_on_page AS DOUBLE), CAST(avg_scroll_depth AS DOUBLE) \
             FROM daily_visits \
             ORDER BY day DESC \
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(duckdb::params![limit as i64], |row| {
            Ok(DailyVisitsRow {
                day: row.get(0)?,
                visits: row.get(1)?,
                unique_sessions: row.get(2)?,
                avg_time_on_page: row.get(3)?,
                avg_scroll_depth: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn popular_pages(&self, limit: usize) -> Result<Vec<PopularPageRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT page_url, page_title, visits, unique_sessions, \
                    CAST(avg_time_on_page AS DOUBLE) \
             FROM popular_pages \
             ORDER BY visits DESC, page_url ASC \
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(duckdb::params![limit as i64], |row| {
            Ok(PopularPageRow {
                page_url: row.get(0)?,
                page_title: row.get(1)?,
                visits: row.get(2)?,
                unique_sessions: row.get(3)?,
                avg_time_on_page: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn traffic_sources(&self, limit: usize) -> Result<Vec<TrafficSourceRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT source, visits, unique_sessions \
             FROM traffic_sources \
             ORDER BY visits DESC, source ASC \
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(duckdb::params![limit as i64], |row| {
            Ok(TrafficSourceRow {
                source: row.get(0)?,
                visits: row.get(1)?,
                unique_sessions: row.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
