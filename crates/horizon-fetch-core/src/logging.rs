//! Logging facilities for Horizon Fetch.
//!
//! Horizon Fetch uses the `tracing` crate for instrumentation. Nothing is
//! printed unless the application installs a subscriber:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_fetch=debug")
//!     .init();
//! ```
//!
//! Every event carries one of the [`targets`] below, so a filter directive
//! can select a single subsystem (for example only the collector).

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_fetch_core::signal";
    /// Thread affinity checks.
    pub const THREAD: &str = "horizon_fetch_core::thread_check";
    /// Notification collector target.
    pub const COLLECTOR: &str = "horizon_fetch::collector";
    /// Change stream target.
    pub const STREAM: &str = "horizon_fetch::stream";
    /// Result-set data source target.
    pub const SOURCE: &str = "horizon_fetch::source";
    /// Composite data source target.
    pub const COMPOSITE: &str = "horizon_fetch::composite";
    /// In-memory collaborator target.
    pub const MEMORY: &str = "horizon_fetch::memory";
}
