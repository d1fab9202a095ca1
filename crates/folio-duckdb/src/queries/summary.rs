use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;

use folio_core::store::{PageCount, ReferrerCount, SummaryResult};

use crate::{schema::sql_timestamp, DuckDbBackend};

const TOP_N: i64 = 10;

pub(crate) async fn get_summary_inner(db: &DuckDbBackend, days: u32) -> Result<SummaryResult> {
    let conn = db.conn.lock().await;
    let end_date = Utc::now();
    let start_date = end_date - chrono::Duration::days(i64::from(days));
    let start_str = sql_timestamp(&start_date);

    let (total_visits, unique_visitors): (i64, i64) = conn
        .prepare("SELECT COUNT(*), COUNT(DISTINCT session_id) FROM visits WHERE created_at >= ?1")?
        .query_row(duckdb::params![start_str], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut devices = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT device_type, COUNT(*) FROM visits \
             WHERE created_at >= ?1 \
             GROUP BY device_type",
        )?;
        let rows = stmt.query_map(duckdb::params![start_str], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (device, count) = row?;
            devices.insert(device, count);
        }
    }

    let mut top_pages = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT page_url, COUNT(*) AS visits FROM visits \
             WHERE created_at >= ?1 \
             GROUP BY page_url \
             ORDER BY visits DESC, page_url ASC \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(duckdb::params![start_str, TOP_N], |row| {
            Ok(PageCount {
                url: row.get(0)?,
                visits: row.get(1)?,
            })
        })?;
        for row in rows {
            top_pages.push(row?);
        }
    }

    let mut top_referrers = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT COALESCE(NULLIF(referrer, ''), 'direct') AS source, COUNT(*) AS visits \
             FROM visits \
             WHERE created_at >= ?1 \
             GROUP BY 1 \
             ORDER BY visits DESC, source ASC \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(duckdb::params![start_str, TOP_N], |row| {
            Ok(ReferrerCount {
                source: row.get(0)?,
                visits: row.get(1)?,
            })
        })?;
        for row in rows {
            top_referrers.push(row?);
        }
    }

    Ok(SummaryResult {
        period_days: days,
        start_date,
        end_date,
        total_visits,
        unique_visitors,
        devices,
        top_pages,
        top_referrers,
    })
}

impl DuckDbBackend {
    pub async fn get_summary(&self, days: u32) -> Result<SummaryResult> {
        get_summary_inner(self, days).await
    }
}
