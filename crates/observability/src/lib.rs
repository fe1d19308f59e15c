//! Process-wide logging setup shared by the petty cash binaries.

/// Subscriber construction (filters, JSON formatting).
pub mod subscriber;

pub use subscriber::DEFAULT_DIRECTIVE;

/// Initialize structured logging for the process.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    subscriber::init(DEFAULT_DIRECTIVE);
}
