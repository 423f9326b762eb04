//! Naamani-E2E: browser-driven page-state verification for the Lalita Sahasranama site
//!
//! Drives Chrome over the DevTools Protocol: one browser per run, one isolated
//! page per test case, bounded waits, computed-style observation and
//! simulated input, with site suites on top.

pub mod error;
pub mod config;

pub mod cdp;
pub mod session;
pub mod page;
pub mod expect;
pub mod probe;
pub mod runner;
pub mod suites;

// Re-exports
pub use error::{Error, Result};

/// Naamani-E2E library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
