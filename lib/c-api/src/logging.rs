//! Logging for C hosts.

use libc::c_int;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn level(verbosity: c_int) -> LevelFilter {
    match verbosity {
        i32::MIN..=-1 => LevelFilter::ERROR,
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Send the library's logs to stderr.
///
/// `verbosity` 0 logs warnings, 1 info, 2 debug, 3 and above everything;
/// `$RUST_LOG` overrides it. ANSI colors are used if `use_color` is
/// non-zero. Returns 0, or 1 if a subscriber was already installed, in
/// which case nothing changes.
#[unsafe(no_mangle)]
pub extern "C" fn hdfsSetupTracing(verbosity: c_int, use_color: c_int) -> c_int {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(use_color != 0)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .compact();

    let filter_layer = EnvFilter::builder()
        .with_default_directive(level(verbosity).into())
        .from_env_lossy();

    match tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
