//! Tracing subscriber setup for the CLI and for tests.

use std::{io::IsTerminal, sync::Once};

use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_ENV_VAR: &str = "FIXTURE_PIPELINE_LOG";

/// Installs the global fmt subscriber. Safe to call more than once.
///
/// `default_level` applies when `FIXTURE_PIPELINE_LOG` is unset or unparseable.
pub fn init(default_level: LevelFilter) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .with_env_var(LOG_ENV_VAR)
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();

        tracing::debug!("log level: {}", default_level);
    });
}
