//! Internal diagnostic logging (`spec.md` §4.13 ambient addition), distinct
//! from the user-facing [`crate::context::Frame::LogEntry`] trail: this is
//! `tracing` output about the framework itself (DSL parsing, config
//! loading, listener wiring), grounded on the teacher's `main.rs` subscriber
//! setup — a `tracing_subscriber::fmt` subscriber installed once as the
//! global default, level driven by `-v` repeats or `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `verbosity` is the number of
/// times `-v` appeared on the command line; `RUST_LOG`, when set, always
/// takes precedence over it, matching the teacher's `EnvFilter::try_from_default_env`
/// fallback chain.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    // Only the process's real entry point should install a subscriber;
    // tests and doctests that exercise this crate in isolation may run
    // concurrently and would otherwise race to set the global default.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
