use std::sync::Arc;

use crate::session::SessionStorage;

/// What the tracker knows about the page it runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// Path of the current page, e.g. `/blog/rust`.
    pub path: String,
    pub title: String,
    /// Empty for direct navigation.
    pub referrer: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The environment can hand off a request that survives page teardown.
    pub beacon: bool,
}

/// A live browser context. Its absence means server-side rendering.
#[derive(Clone)]
pub struct PageContext {
    pub storage: Arc<dyn SessionStorage>,
    pub page: PageInfo,
    pub capabilities: Capabilities,
}

impl PageContext {
    pub fn new(storage: Arc<dyn SessionStorage>, page: PageInfo) -> Self {
        Self {
            storage,
            page,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_beacon(mut self, beacon: bool) -> Self {
        self.capabilities.beacon = beacon;
        self
    }
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("page", &self.page)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
