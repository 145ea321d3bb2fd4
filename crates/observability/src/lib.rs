//! Process-wide tracing/logging setup.

pub mod tracing;

/// Initialize observability for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}
