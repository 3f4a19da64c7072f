//! # Observability
//!
//! Initializes `tracing` output for `dialogue-flow`.
//!
//! The flow controller emits structured events under these targets:
//!
//! - `dialogue_flow::controller`: conversation lifecycle and speaker choices
//! - `dialogue_flow::chain`: mention acceptance, rejection and chain resets
//! - `dialogue_flow::driver`: turn loop progress

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for initializing the observability system.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// The maximum log level to capture.
    pub level: Level,
    /// The target for the logs.
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

/// Defines the output target for logs.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Log to the console (stdout).
    #[default]
    Console,
    /// Log to a file.
    File(String),
}

/// Builds the filter used by [`init`].
///
/// `RUST_LOG` directives are honored; the configured level is applied to the
/// `dialogue_flow` targets on top of them.
pub fn filter_for(level: Level) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    Ok(EnvFilter::from_default_env().add_directive(format!("dialogue_flow={}", level).parse()?))
}

/// Initializes the global tracing subscriber.
///
/// Call once at the beginning of the embedding application.
///
/// # Errors
///
/// Fails if the filter directive cannot be parsed, the log file cannot be
/// created, or a global subscriber has already been installed.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::registry().with(filter_for(config.level)?);

    match config.target {
        LogTarget::Console => {
            let layer = fmt::layer().with_writer(std::io::stdout);
            subscriber.with(layer).try_init()?;
        }
        LogTarget::File(path) => {
            let file = std::fs::File::create(path)?;
            let layer = fmt::layer().with_writer(file);
            subscriber.with(layer).try_init()?;
        }
    };

    Ok(())
}
