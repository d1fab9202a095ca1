//! Shared types for the portfolio analytics pipeline.
//!
//! Wire payloads are used on both sides of the HTTP boundary: the tracker
//! serializes them and the server deserializes and validates them with the
//! same rules.

pub mod config;
pub mod contact;
pub mod error;
pub mod event;
pub mod privacy;
pub mod store;
