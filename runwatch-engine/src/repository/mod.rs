//! Repository layer
//!
//! Repositories abstract the remote read API. They provide a narrow,
//! trait-based interface so the scheduler can be driven by the HTTP client
//! in production and by scripted fetchers in tests.

mod runs;

// Re-export traits
pub use runs::RunFetcher;

#[cfg(test)]
pub(crate) use runs::testing;
