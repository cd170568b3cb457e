//! 日志初始化
//!
//! Console logging goes to stderr so it never mixes with the build output a
//! payload prints on stdout.

use crate::error::Result;
use runner_common::{LogConfig, RunnerConfig};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const LOG_FILE_NAME: &str = "pipeline-runner.log";

/// Keeps the non-blocking log writer alive until the run ends.
#[derive(Default)]
pub struct ObservabilityGuard {
    log_guard: Option<WorkerGuard>,
}

impl ObservabilityGuard {
    pub fn is_file_backed(&self) -> bool {
        self.log_guard.is_some()
    }
}

/// Initialize logging based on configuration
pub fn init_observability(config: &RunnerConfig) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();
    let observability = &config.observability;

    if config.is_console_logging() {
        init_subscriber_with_writer(std::io::stderr, true, config);
    } else {
        fs::create_dir_all(&observability.log.path)?;
        let (non_blocking, worker_guard) =
            build_file_writer(config.log_config(), config.should_rotate_logs())?;
        guard.log_guard = Some(worker_guard);
        init_subscriber_with_writer(non_blocking, false, config);
    }

    Ok(guard)
}

/// EnvFilter from config, RUST_LOG taking precedence
fn create_env_filter(config: &RunnerConfig) -> EnvFilter {
    let directive = config.get_filter_level();

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!("Failed to parse filter directive: {directive}. Falling back to: info");
        EnvFilter::new("info")
    })
}

fn init_subscriber_with_writer<W>(writer: W, use_ansi: bool, config: &RunnerConfig)
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(use_ansi)
        .with_writer(writer);

    // A subscriber installed earlier (tests) stays in place.
    tracing_subscriber::registry()
        .with(create_env_filter(config))
        .with(fmt_layer)
        .try_init()
        .ok();
}

fn build_file_writer(log_config: &LogConfig, rotate: bool) -> Result<(NonBlocking, WorkerGuard)> {
    if rotate {
        let appender = tracing_appender::rolling::daily(&log_config.path, LOG_FILE_NAME);
        Ok(tracing_appender::non_blocking(appender))
    } else {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(Path::new(&log_config.path).join(LOG_FILE_NAME))?;
        Ok(tracing_appender::non_blocking(file))
    }
}
