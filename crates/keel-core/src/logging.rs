//! Logging facilities for Keel.
//!
//! Keel uses the `tracing` crate for instrumentation. To see logs, install a
//! tracing subscriber in the host application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!     // application code...
//! }
//! ```
//!
//! All Keel log records carry a per-subsystem `target:` so hosts can filter
//! with standard `tracing` directives, e.g. `keel_core::store=trace`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "keel_core::signal";
    /// Store and subscription target.
    pub const STORE: &str = "keel_core::store";
    /// Combobox interaction engine target.
    pub const COMBOBOX: &str = "keel::combobox";
}
