//! Per-tab session identifiers.
//!
//! A session id is a correlation key for the visits and events of one
//! browser tab. It is not an identity: it is never tied to a person and it
//! never expires while the tab lives.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rand::Rng;

/// Storage key under which the id is kept.
pub const SESSION_STORAGE_KEY: &str = "portfolio_session_id";

/// Returned when there is no browser context to hold an id. Nothing is
/// tracked for it.
pub const SERVER_SIDE_RENDER: &str = "server-side-render";

const SUFFIX_LEN: usize = 7;

/// Tab-scoped key/value storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-process storage; one instance stands for one tab.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

/// Return the tab's session id, creating and storing one on first use.
///
/// `None` means there is no browser context; the sentinel
/// [`SERVER_SIDE_RENDER`] is returned and nothing is stored.
pub fn get_or_create_session_id(storage: Option<&dyn SessionStorage>) -> String {
    let Some(storage) = storage else {
        return SERVER_SIDE_RENDER.to_string();
    };
    if let Some(existing) = storage.get(SESSION_STORAGE_KEY) {
        return existing;
    }
    let id = generate_session_id();
    storage.set(SESSION_STORAGE_KEY, &id);
    id
}

/// `false` for the server-side sentinel.
pub fn is_tracking_available(session_id: &str) -> bool {
    session_id != SERVER_SIDE_RENDER
}

/// `"{unix_millis}-{7 base36 chars}"`.
fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx: u8 = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}
