/// Re-export `Config` from `folio-core` for use within this crate.
///
/// All environment-variable parsing lives in `folio-core` so it can be
/// shared with integration tests without depending on the full server.
pub use folio_core::config::{Config, Environment};
