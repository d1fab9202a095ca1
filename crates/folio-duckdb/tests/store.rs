use std::sync::Arc;

use chrono::{Duration, Utc};
use folio_core::{
    contact::{ContactMessage, ContactPayload},
    event::{DeviceType, Event, EventPayload, Visit},
    store::StatsStore,
};
use folio_duckdb::DuckDbBackend;
use serde_json::json;

fn sample_visit(session_id: &str, page_url: &str) -> Visit {
    Visit {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        ip_hash: "6694f83c9f476da3".to_string(),
        country: Some("DE".to_string()),
        city: None,
        user_agent: Some("Mozilla/5.0".to_string()),
        device_type: DeviceType::Desktop,
        browser: Some("Chrome".to_string()),
        browser_version: Some("120.0".to_string()),
        os: Some("Mac OSX".to_string()),
        os_version: None,
        screen_width: Some(1920),
        screen_height: Some(1080),
        page_url: page_url.to_string(),
        page_title: Some("Home".to_string()),
        referrer: None,
        time_on_page: None,
        scroll_depth: None,
        created_at: Utc::now(),
    }
}

fn sample_contact(message: &str) -> ContactMessage {
    ContactMessage::from_payload(
        ContactPayload {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: None,
            message: message.to_string(),
        },
        "1.2.3.4".to_string(),
        Utc::now(),
    )
}

async fn count(db: &DuckDbBackend, table: &str) -> i64 {
    let conn = db.conn_for_test().await;
    conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))
        .expect("prepare count")
        .query_row([], |row| row.get(0))
        .expect("count rows")
}

#[tokio::test]
async fn test_store_dyn_dispatch() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    let store: Arc<dyn StatsStore> = db.clone();

    store.ping().await.expect("ping");
    store
        .insert_visit(&sample_visit("s1", "/"))
        .await
        .expect("insert visit");
    assert_eq!(count(&db, "visits").await, 1);
}

#[tokio::test]
async fn test_scroll_depth_over_100_rejected_by_constraint() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let mut visit = sample_visit("s1", "/");
    visit.scroll_depth = Some(150);

    let result = db.insert_visit(&visit).await;
    assert!(result.is_err(), "scroll_depth 150 must violate the CHECK");
    assert_eq!(count(&db, "visits").await, 0);
}

#[tokio::test]
async fn test_scroll_depth_boundaries_accepted() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    for depth in [0, 100] {
        let mut visit = sample_visit("s1", "/");
        visit.scroll_depth = Some(depth);
        db.insert_visit(&visit).await.expect("boundary depth");
    }
    assert_eq!(count(&db, "visits").await, 2);
}

#[tokio::test]
async fn test_engagement_flush_is_a_second_row() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.insert_visit(&sample_visit("s1", "/blog"))
        .await
        .expect("page view");

    let mut flush = sample_visit("s1", "/blog");
    flush.time_on_page = Some(12);
    flush.scroll_depth = Some(40);
    db.insert_visit(&flush).await.expect("flush");

    let conn = db.conn_for_test().await;
    let (rows, with_engagement): (i64, i64) = conn
        .prepare(
            "SELECT COUNT(*), COUNT(scroll_depth) FROM visits WHERE session_id = 's1'",
        )
        .expect("prepare")
        .query_row([], |row| Ok((row.get(0)?, row.get(1)?)))
        .expect("query");
    assert_eq!(rows, 2);
    assert_eq!(with_engagement, 1);
}

#[tokio::test]
async fn test_event_data_stored_as_json_text() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let payload = EventPayload {
        session_id: "s1".to_string(),
        event_type: "project_click".to_string(),
        event_data: json!({ "project": "compiler", "position": 2 })
            .as_object()
            .cloned()
            .expect("object"),
        page_url: "/projects".to_string(),
    };
    let event = Event::from_payload(payload, Utc::now()).expect("event");
    db.insert_event(&event).await.expect("insert event");

    let conn = db.conn_for_test().await;
    let stored: String = conn
        .prepare("SELECT event_data FROM events WHERE id = ?1")
        .expect("prepare")
        .query_row(folio_duckdb::duckdb::params![event.id], |row| row.get(0))
        .expect("query");
    let value: serde_json::Value = serde_json::from_str(&stored).expect("json");
    assert_eq!(value["project"], "compiler");
    assert_eq!(value["position"], 2);
}

#[tokio::test]
async fn test_contact_message_length_constraint() {
    let db = DuckDbBackend::open_in_memory().expect("db");

    assert!(db
        .insert_contact_message(&sample_contact("too short"))
        .await
        .is_err());

    let msg = sample_contact("long enough message");
    let id = db.insert_contact_message(&msg).await.expect("insert");
    assert_eq!(id, msg.id);

    let conn = db.conn_for_test().await;
    let (status, subject): (String, String) = conn
        .prepare("SELECT status, subject FROM contact_messages WHERE id = ?1")
        .expect("prepare")
        .query_row(folio_duckdb::duckdb::params![id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .expect("query");
    assert_eq!(status, "new");
    assert_eq!(subject, "No subject");
}

#[tokio::test]
async fn test_summary_counts_window() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    db.insert_visit(&sample_visit("s1", "/")).await.expect("v1");
    db.insert_visit(&sample_visit("s1", "/blog")).await.expect("v2");
    let mut mobile = sample_visit("s2", "/blog");
    mobile.device_type = DeviceType::Mobile;
    mobile.referrer = Some("https://news.ycombinator.com/".to_string());
    db.insert_visit(&mobile).await.expect("v3");

    let mut old = sample_visit("s3", "/old");
    old.created_at = Utc::now() - Duration::days(40);
    db.insert_visit(&old).await.expect("old");

    let summary = db.get_summary(30).await.expect("summary");
    assert_eq!(summary.period_days, 30);
    assert_eq!(summary.total_visits, 3);
    assert_eq!(summary.unique_visitors, 2);
    assert_eq!(summary.devices.get("desktop"), Some(&2));
    assert_eq!(summary.devices.get("mobile"), Some(&1));
    assert_eq!(summary.top_pages[0].url, "/blog");
    assert_eq!(summary.top_pages[0].visits, 2);
    assert_eq!(summary.top_referrers[0].source, "direct");
    assert_eq!(summary.top_referrers[0].visits, 2);
}

#[tokio::test]
async fn test_reporting_views() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let mut a = sample_visit("s1", "/blog");
    a.time_on_page = Some(10);
    a.scroll_depth = Some(40);
    let mut b = sample_visit("s2", "/blog");
    b.time_on_page = Some(20);
    b.scroll_depth = Some(80);
    b.referrer = Some("https://github.com/".to_string());
    let c = sample_visit("s2", "/");
    for v in [&a, &b, &c] {
        db.insert_visit(v).await.expect("insert");
    }

    let daily = db.daily_visits(7).await.expect("daily");
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].visits, 3);
    assert_eq!(daily[0].unique_sessions, 2);
    assert_eq!(daily[0].avg_time_on_page, Some(15.0));
    assert_eq!(daily[0].avg_scroll_depth, Some(60.0));

    let pages = db.popular_pages(10).await.expect("pages");
    assert_eq!(pages[0].page_url, "/blog");
    assert_eq!(pages[0].visits, 2);
    assert_eq!(pages[1].page_url, "/");
    assert_eq!(pages[1].avg_time_on_page, None);

    let sources = db.traffic_sources(10).await.expect("sources");
    assert_eq!(sources[0].source, "direct");
    assert_eq!(sources[0].visits, 2);
    assert_eq!(sources[1].source, "https://github.com/");
}
