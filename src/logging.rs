//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `-v` flags on the command line (`-v` info, `-vv` debug, `-vvv` trace)
//! 2. `SITEWRIGHT_LOG` environment variable, any `EnvFilter` directive
//!    (e.g. `"debug"` or `"sitewright::planner=trace"`)
//! 3. default to `warn`
//!
//! Logs go to stderr so plan and summary output on stdout stays clean.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SITEWRIGHT_LOG";

/// Filter for a given `-v` count, falling back to the environment.
pub fn filter_for(verbosity: u8, env: Option<&str>) -> EnvFilter {
    if let Some(level) = level_for_verbosity(verbosity) {
        return EnvFilter::new(level);
    }
    env.map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn level_for_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(verbosity: u8) {
    let env = std::env::var(LOG_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity, env.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}
