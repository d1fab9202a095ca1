use tokio::time::Instant;
use tracing::debug;

use folio_core::{event::MAX_SCROLL_DEPTH, privacy::short_session};

use crate::flush::{EngagementPayload, FlushStrategy};

/// Scroll position sample, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    /// `round(100 * (top + viewport) / document)`, clamped to `0..=100`.
    ///
    /// `None` for a zero or non-finite document height.
    pub fn depth_percent(&self) -> Option<u32> {
        if !self.document_height.is_finite() || self.document_height <= 0.0 {
            return None;
        }
        let raw = 100.0 * (self.scroll_top + self.viewport_height) / self.document_height;
        if !raw.is_finite() {
            return None;
        }
        Some(raw.round().clamp(0.0, f64::from(MAX_SCROLL_DEPTH)) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Time-on-page and scroll tracking for one page load.
///
/// Hiding the page and unloading it both flush; each flush measures from the
/// same start instant, so a hide followed by a close sends two payloads.
pub struct EngagementSession {
    session_id: String,
    page_url: String,
    started: Instant,
    max_scroll_depth: u32,
    stopped: bool,
    flush: Box<dyn FlushStrategy>,
}

impl EngagementSession {
    pub fn start(session_id: String, page_url: String, flush: Box<dyn FlushStrategy>) -> Self {
        debug!(
            session = short_session(&session_id),
            page = %page_url,
            "Engagement tracking started"
        );
        Self {
            session_id,
            page_url,
            started: Instant::now(),
            max_scroll_depth: 0,
            stopped: false,
            flush,
        }
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        if self.stopped {
            return;
        }
        if let Some(depth) = metrics.depth_percent() {
            self.max_scroll_depth = self.max_scroll_depth.max(depth);
        }
    }

    pub fn max_scroll_depth(&self) -> u32 {
        self.max_scroll_depth
    }

    /// Whole seconds since start, rounded to nearest.
    pub fn time_on_page(&self) -> u32 {
        let millis = self.started.elapsed().as_millis();
        u32::try_from((millis + 500) / 1000).unwrap_or(u32::MAX)
    }

    /// Flushes when the page becomes hidden.
    pub fn on_visibility_change(&mut self, visibility: Visibility) -> Option<EngagementPayload> {
        match visibility {
            Visibility::Hidden => self.flush_now(),
            Visibility::Visible => None,
        }
    }

    pub fn on_unload(&mut self) -> Option<EngagementPayload> {
        self.flush_now()
    }

    /// Detach from the page; later triggers do nothing.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn flush_now(&mut self) -> Option<EngagementPayload> {
        if self.stopped {
            return None;
        }
        let payload = EngagementPayload {
            session_id: self.session_id.clone(),
            page_url: self.page_url.clone(),
            time_on_page: self.time_on_page(),
            scroll_depth: self.max_scroll_depth,
        };
        self.flush.flush(payload.clone());
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<EngagementPayload>>>);

    impl FlushStrategy for Collect {
        fn flush(&self, payload: EngagementPayload) {
            self.0.lock().expect("lock").push(payload);
        }
    }

    fn metrics(scroll_top: f64) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top,
            viewport_height: 1000.0,
            document_height: 5000.0,
        }
    }

    #[test]
    fn depth_formula() {
        assert_eq!(metrics(0.0).depth_percent(), Some(20));
        assert_eq!(metrics(1000.0).depth_percent(), Some(40));
        assert_eq!(metrics(4000.0).depth_percent(), Some(100));
        // Overscroll clamps.
        assert_eq!(metrics(4500.0).depth_percent(), Some(100));
        let empty = ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 800.0,
            document_height: 0.0,
        };
        assert_eq!(empty.depth_percent(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_keeps_high_water_mark() {
        let sink = Collect::default();
        let mut session =
            EngagementSession::start("s".into(), "/blog".into(), Box::new(sink.clone()));

        session.on_scroll(metrics(1000.0)); // 40%
        session.on_scroll(ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 500.0,
            document_height: 5000.0,
        }); // 10%
        let payload = session
            .on_visibility_change(Visibility::Hidden)
            .expect("flushed");

        assert_eq!(payload.scroll_depth, 40);
        assert_eq!(sink.0.lock().expect("lock").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hide_then_close_sends_two_payloads() {
        let sink = Collect::default();
        let mut session =
            EngagementSession::start("s".into(), "/blog".into(), Box::new(sink.clone()));

        tokio::time::advance(Duration::from_secs(12)).await;
        session.on_visibility_change(Visibility::Hidden);
        tokio::time::advance(Duration::from_secs(8)).await;
        session.on_unload();

        let sent = sink.0.lock().expect("lock");
        let times: Vec<u32> = sent.iter().map(|p| p.time_on_page).collect();
        assert_eq!(times, vec![12, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn visible_does_not_flush() {
        let sink = Collect::default();
        let mut session =
            EngagementSession::start("s".into(), "/".into(), Box::new(sink.clone()));
        assert!(session.on_visibility_change(Visibility::Visible).is_none());
        assert!(sink.0.lock().expect("lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn time_rounds_to_nearest_second() {
        let sink = Collect::default();
        let session = EngagementSession::start("s".into(), "/".into(), Box::new(sink));
        tokio::time::advance(Duration::from_millis(2499)).await;
        assert_eq!(session.time_on_page(), 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(session.time_on_page(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_session_ignores_triggers() {
        let sink = Collect::default();
        let mut session =
            EngagementSession::start("s".into(), "/".into(), Box::new(sink.clone()));
        session.stop();
        session.on_scroll(metrics(4000.0));
        assert!(session.on_unload().is_none());
        assert_eq!(session.max_scroll_depth(), 0);
        assert!(sink.0.lock().expect("lock").is_empty());
    }
}
