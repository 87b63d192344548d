//! Shared building blocks for the recalldb workspace: configuration, the
//! typed error, collaborator traits, record types and the deterministic cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;
