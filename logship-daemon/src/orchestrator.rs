//! Orchestrator -- assembles and runs the event pipeline.
//!
//! The orchestrator is the central coordinator of the daemon:
//! 1. Builds the plugin registry with every builtin input, filter, codec and output.
//! 2. Wires the pipeline from `PipelineConfig`.
//! 3. Runs the pipeline until its inputs finish or a shutdown signal arrives.
//!
//! # Shutdown
//!
//! SIGTERM/SIGINT cancel the root token. The pipeline then stops its inputs,
//! drains the filter and output channels, and reports its terminal state.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use logship_core::{Control, PipelineConfig};
use logship_pipeline::{Pipeline, PipelineState, builtin_registry};

/// Main orchestrator that owns the pipeline and the root cancellation token.
pub struct Orchestrator {
    config: PipelineConfig,
    pipeline: Pipeline,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Build the orchestrator from a configuration file path.
    ///
    /// Loads the file, applies environment overrides and validates it.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = PipelineConfig::load(config_path)
            .await
            .with_context(|| format!("failed to load config from {}", config_path.display()))?;
        Self::build_from_config(config)
    }

    /// Build the orchestrator from an already-loaded configuration.
    ///
    /// Plugins are not constructed until [`run`](Self::run); configuration
    /// errors in plugin sections surface there.
    pub fn build_from_config(config: PipelineConfig) -> Result<Self> {
        let registry = Arc::new(builtin_registry()?);
        let control = Arc::new(Control::new());

        tracing::info!(
            inputs = config.input.len(),
            filters = config.filter.len(),
            outputs = config.output.len(),
            worker = config.worker,
            chsize = config.chsize,
            "pipeline configured"
        );

        let pipeline = Pipeline::new(config.clone(), registry, control);
        Ok(Self {
            config,
            pipeline,
            cancel: CancellationToken::new(),
        })
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Root cancellation token. Cancelling it stops the pipeline.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    /// Start the pipeline and wait until it stops.
    ///
    /// Returns when every input has finished and the channels are drained,
    /// or when a shutdown signal cancels the root token.
    pub async fn run(&mut self) -> Result<()> {
        record_daemon_metrics();

        self.pipeline
            .start(self.cancel.clone())
            .context("failed to start pipeline")?;
        tracing::info!("pipeline started");

        let signal_cancel = self.cancel.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                _ = signal_cancel.cancelled() => {}
                result = wait_for_shutdown_signal() => {
                    match result {
                        Ok(()) => tracing::info!("shutdown signal received"),
                        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
                    }
                    signal_cancel.cancel();
                }
            }
        });

        let result = self.pipeline.wait().await;

        self.cancel.cancel();
        let _ = watcher.await;

        match result {
            Ok(()) => {
                tracing::info!(state = %self.pipeline.state(), "pipeline stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, state = %self.pipeline.state(), "pipeline failed");
                Err(anyhow::Error::new(e).context("pipeline terminated with an error"))
            }
        }
    }
}

/// Record daemon-level metrics at startup.
fn record_daemon_metrics() {
    metrics::gauge!(
        logship_core::metrics::DAEMON_BUILD_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Wait for SIGTERM or SIGINT (Ctrl-C).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("received Ctrl-C");
    Ok(())
}
