//! Tracing setup for the `harness` binary.
//!
//! Logs always go to stderr; stdout is reserved for reports.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Shape of each log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// One flattened JSON object per event.
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            LogFormat::Text => fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr)
                .boxed(),
        }
    }
}

/// Filter used when `RUST_LOG` is unset: `level` for the harness crates,
/// warnings only for everything else.
pub fn default_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_ascii_lowercase();
    EnvFilter::new(format!("warn,harness_core={level},harness={level}"))
}

/// Install the global subscriber. Only the first call in a process wins.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let installed = tracing_subscriber::registry()
        .with(LogFormat::from_json_flag(json).layer())
        .with(filter)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
