use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use folio_core::{
    contact::ContactMessage,
    event::{Event, Visit},
    privacy::short_session,
};

use crate::schema::{init_sql, sql_timestamp};

/// The DuckDB relational store for visits, events and contact messages.
///
/// DuckDB is single-writer, so the connection sits behind
/// `Arc<tokio::sync::Mutex<_>>`; the struct is cheap to share across Axum
/// handlers and every write is serialised through the lock.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    /// Runs the schema init SQL so all tables, indexes and views exist.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only; data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert one visit row.
    ///
    /// Always an INSERT: a second engagement flush for the same page load
    /// produces a second row. The `scroll_depth` and `device_type` CHECK
    /// constraints reject out-of-range rows with an error.
    pub async fn insert_visit(&self, visit: &Visit) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO visits (
                id, session_id, ip_hash,
                country, city,
                user_agent, device_type, browser, browser_version, os, os_version,
                screen_width, screen_height,
                page_url, page_title, referrer,
                time_on_page, scroll_depth,
                created_at
            ) VALUES (
                ?1,  ?2,  ?3,
                ?4,  ?5,
                ?6,  ?7,  ?8,  ?9,  ?10, ?11,
                ?12, ?13,
                ?14, ?15, ?16,
                ?17, ?18,
                ?19
            )"#,
            duckdb::params![
                visit.id,
                visit.session_id,
                visit.ip_hash,
                visit.country,
                visit.city,
                visit.user_agent,
                visit.device_type.as_str(),
                visit.browser,
                visit.browser_version,
                visit.os,
                visit.os_version,
                visit.screen_width.map(i64::from),
                visit.screen_height.map(i64::from),
                visit.page_url,
                visit.page_title,
                visit.referrer,
                visit.time_on_page.map(i64::from),
                visit.scroll_depth.map(i64::from),
                sql_timestamp(&visit.created_at),
            ],
        )?;
        tracing::debug!(
            session = short_session(&visit.session_id),
            page = %visit.page_url,
            "Inserted visit"
        );
        Ok(())
    }

    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO events (id, session_id, event_type, event_data, page_url, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            duckdb::params![
                event.id,
                event.session_id,
                event.event_type,
                event.event_data,
                event.page_url,
                sql_timestamp(&event.created_at),
            ],
        )?;
        tracing::debug!(
            session = short_session(&event.session_id),
            event_type = %event.event_type,
            "Inserted event"
        );
        Ok(())
    }

    /// Insert a contact message and return its id.
    ///
    /// Messages outside 10–5000 characters are rejected by the table CHECK.
    pub async fn insert_contact_message(&self, message: &ContactMessage) -> Result<String> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO contact_messages (
                id, name, email, subject, message, ip_address, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            duckdb::params![
                message.id,
                message.name,
                message.email,
                message.subject,
                message.message,
                message.ip_address,
                message.status.as_str(),
                sql_timestamp(&message.created_at),
            ],
        )?;
        Ok(message.id.clone())
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    ///
    /// Called by the health endpoints. Returns an error if the connection
    /// is unavailable (file locked, disk full, etc.).
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Acquire the DuckDB connection lock for direct queries.
    ///
    /// Intended for integration tests that need to verify stored data.
    /// Production code should use the typed methods above.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
