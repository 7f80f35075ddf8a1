//! Log setup for `nbmend`.
//!
//! The validation report and repair progress are printed on stdout, so
//! every tracing event (cycle checks and agent calls) goes to
//! stderr instead. `--verbose` lowers the default level to `DEBUG`, and
//! `--json` switches to one JSON object per event for CI log collectors.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber for this process.
///
/// `RUST_LOG` wins over `level` when set, e.g. `RUST_LOG=nbmend_core=trace`
/// to see every repair cycle. Later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
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
