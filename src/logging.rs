//! tracing subscriber setup for the CLI.
//!
//! Logs go to stderr. `RUST_LOG` wins when set; otherwise the filter is
//! `content_sync=info`, or `content_sync=debug` with `--verbose`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "content_sync=debug"
    } else {
        "content_sync=info"
    }
}

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .ok();
}
