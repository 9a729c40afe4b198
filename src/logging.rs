use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const DEFAULT_LOG_FILE: &str = "flood-monitor.log";

/// Initialize structured logging.
///
/// `RUST_LOG` wins over `log_level`. Console output goes to stderr, as JSON
/// when `format` is `"json"`. With a log file a daily-rolling JSON layer is
/// added; keep the returned guard alive until shutdown so buffered lines are
/// flushed.
pub fn init_logging(log_level: Option<&str>, log_file: Option<&Path>, format: &str) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))
        .context("Invalid log filter")?;

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true);
    let console_layer = if format == "json" {
        console_layer.json().boxed()
    } else {
        console_layer.with_ansi(true).boxed()
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .map_or_else(|| DEFAULT_LOG_FILE.to_string(), |n| n.to_string_lossy().into_owned());
            let (writer, guard) = non_blocking(rolling::daily(directory, file_name));

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global logger is already installed")?;

    debug!(format, file = ?log_file, "Logging initialized");
    Ok(guard)
}

/// Wall-clock timer for one pipeline stage.
///
/// Call [`finish`](Self::finish) on the success path. A timer dropped
/// without finishing means the stage bailed out early and is logged as such.
pub struct OperationTimer {
    stage: &'static str,
    start: Instant,
    finished: bool,
}

impl OperationTimer {
    /// Start timing `stage`
    #[must_use]
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            start: Instant::now(),
            finished: false,
        }
    }

    /// Elapsed time so far
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log the stage duration and return it in milliseconds
    pub fn finish(mut self) -> u128 {
        self.finished = true;
        let duration_ms = self.start.elapsed().as_millis();
        info!(stage = self.stage, duration_ms, "Stage completed");
        duration_ms
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished && !std::thread::panicking() {
            warn!(
                stage = self.stage,
                duration_ms = self.start.elapsed().as_millis(),
                "Stage aborted"
            );
        }
    }
}
