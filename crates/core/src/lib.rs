//! wax-core
//!
//! Heuristic repair engine that cleans up an analysis database after
//! auto-analysis of an x86 image.
//!
//! The engine removes spurious data cross-references, materializes alignment
//! padding between functions, repairs truncated function boundaries, types
//! pointers found in data segments, and retypes four-character tag
//! immediates. It talks to the database only through the [`db::AnalysisDb`]
//! port, so any host can plug in; [`db::MemoryDb`] is the in-memory
//! implementation used by the CLI and the tests.

pub mod model;
pub mod analysis;
pub mod db;
pub mod backends;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
