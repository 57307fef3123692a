//! Process-wide tracing setup shared by the binaries.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize JSON logging filtered by `RUST_LOG`, falling back to `info`.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init() {
    subscriber::install("info", LogFormat::Json);
}

/// Initialize logging with an explicit fallback filter and output format.
pub fn init_with(default_filter: &str, format: LogFormat) {
    subscriber::install(default_filter, format);
}
