//! Tracing setup for the `eip-automerge` binary.
//!
//! Logs go to stderr. Stdout belongs to `::error::` workflow commands and
//! `--dry-run` output, which Actions and scripts read back.
//!
//! The verbosity flag only raises this project's own targets; the HTTP
//! stack stays at `warn` so `--verbose` output remains readable in a CI log.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding filter directives for this bot. Takes
/// precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "AUTOMERGE_LOG";

/// Crate targets that follow the requested verbosity.
const PROJECT_TARGETS: [&str; 3] = ["eip_automerge", "eip_automerge_core", "eip_forge"];

/// Filter directives used when neither `AUTOMERGE_LOG` nor `RUST_LOG` is set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in PROJECT_TARGETS {
        directives.push_str(&format!(",{}={}", target, level));
    }
    directives
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Initialise the global tracing subscriber.
///
/// JSON lines carry the enclosing run span, so every event of a run can be
/// joined on its `run_id`. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = env_filter(level);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
