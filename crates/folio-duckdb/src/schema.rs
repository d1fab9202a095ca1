/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// Tables use `IF NOT EXISTS` and views use `CREATE OR REPLACE`, so the batch
/// is safe to re-run on every startup.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `FOLIO_DUCKDB_MEMORY`, default `"1GB"`).
///
/// The CHECK constraints are the last line of defence for the row
/// invariants: the ingestion endpoint validates first, but a direct write
/// with `scroll_depth = 150` or a 9-character message still fails here.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- VISITS (one row per page view or engagement flush)
-- ===========================================
CREATE TABLE IF NOT EXISTS visits (
    id              VARCHAR PRIMARY KEY,           -- UUID v4
    session_id      VARCHAR NOT NULL,              -- per-tab correlation key, not an identity
    ip_hash         VARCHAR(16) NOT NULL,          -- sha256(ip)[0:16]; raw IP is never stored

    -- Geo (CDN headers or GeoIP)
    country         VARCHAR,
    city            VARCHAR,

    -- User Agent
    user_agent      VARCHAR,
    device_type     VARCHAR NOT NULL
                    CHECK (device_type IN ('mobile', 'tablet', 'desktop', 'bot')),
    browser         VARCHAR,
    browser_version VARCHAR,
    os              VARCHAR,
    os_version      VARCHAR,

    -- Client
    screen_width    INTEGER,
    screen_height   INTEGER,

    -- Page
    page_url        VARCHAR NOT NULL,
    page_title      VARCHAR,
    referrer        VARCHAR,

    -- Engagement
    time_on_page    INTEGER CHECK (time_on_page >= 0),                  -- seconds
    scroll_depth    INTEGER CHECK (scroll_depth BETWEEN 0 AND 100),     -- percent, high-water mark

    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_visits_created_at ON visits(created_at);
CREATE INDEX IF NOT EXISTS idx_visits_session    ON visits(session_id);
CREATE INDEX IF NOT EXISTS idx_visits_page_url   ON visits(page_url, created_at);

-- ===========================================
-- EVENTS (discrete interactions)
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id              VARCHAR PRIMARY KEY,           -- UUID v4
    session_id      VARCHAR NOT NULL,
    event_type      VARCHAR NOT NULL,              -- open set: 'project_click', 'resume_download', ...
    event_data      VARCHAR NOT NULL DEFAULT '{{}}',  -- JSON object string
    page_url        VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);
CREATE INDEX IF NOT EXISTS idx_events_type_date  ON events(event_type, created_at);
CREATE INDEX IF NOT EXISTS idx_events_session    ON events(session_id);

-- ===========================================
-- CONTACT MESSAGES
-- Not subject to retention cleanup.
-- ===========================================
CREATE TABLE IF NOT EXISTS contact_messages (
    id              VARCHAR PRIMARY KEY,           -- UUID v4
    name            VARCHAR NOT NULL,
    email           VARCHAR NOT NULL,
    subject         VARCHAR,
    message         VARCHAR NOT NULL
                    CHECK (length(message) BETWEEN 10 AND 5000),
    ip_address      VARCHAR,                       -- raw IP, spam prevention only
    status          VARCHAR NOT NULL DEFAULT 'new'
                    CHECK (status IN ('new', 'read', 'replied', 'archived')),
    created_at      TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_contact_messages_status ON contact_messages(status, created_at);

-- ===========================================
-- REPORTING VIEWS (computed on read)
-- ===========================================
CREATE OR REPLACE VIEW daily_visits AS
SELECT
    CAST(created_at AS DATE)                AS day,
    COUNT(*)                                AS visits,
    COUNT(DISTINCT session_id)              AS unique_sessions,
    AVG(time_on_page)                       AS avg_time_on_page,
    AVG(scroll_depth)                       AS avg_scroll_depth
FROM visits
GROUP BY CAST(created_at AS DATE);

CREATE OR REPLACE VIEW popular_pages AS
SELECT
    page_url,
    MAX(page_title)                         AS page_title,
    COUNT(*)                                AS visits,
    COUNT(DISTINCT session_id)              AS unique_sessions,
    AVG(time_on_page)                       AS avg_time_on_page
FROM visits
GROUP BY page_url;

CREATE OR REPLACE VIEW traffic_sources AS
SELECT
    COALESCE(NULLIF(referrer, ''), 'direct') AS source,
    COUNT(*)                                AS visits,
    COUNT(DISTINCT session_id)              AS unique_sessions
FROM visits
GROUP BY COALESCE(NULLIF(referrer, ''), 'direct');
"#
    )
}

/// Format a timestamp the way it is bound into `TIMESTAMP` parameters.
pub(crate) fn sql_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}
