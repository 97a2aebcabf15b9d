//! # Tracing Setup
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show all debug logs
//! - `RUST_LOG=sales_service=trace` - Trace the service crate only
//! - Default: `info,sales=debug,sqlx=warn`

use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// Call once at process start. Later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sales=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
