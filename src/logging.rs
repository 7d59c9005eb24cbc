//! Log output for the demo binaries.
//!
//! The library only emits `tracing` events; nothing is printed unless a
//! binary (or test) installs a subscriber with [`init_tracing`].

use std::panic;
use std::thread;

use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::task::panic_message;

/// Installs a fmt subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when `RUST_LOG` is unset or invalid.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init()
        .is_ok()
}

/// Routes panics of every thread through `tracing` before the default
/// hook runs, so a crashing worker is logged with its thread name.
pub fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let thread = thread::current();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(
            thread = thread.name().unwrap_or("<unnamed>"),
            %location,
            "panic: {}",
            panic_message(info.payload())
        );
        default_hook(info);
    }));
}
