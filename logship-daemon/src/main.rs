//! logship daemon -- event pipeline process.
//!
//! # Usage
//!
//! ```bash
//! logship --config logship.yml
//! logship --config logship.yml --validate
//! logship --log-level debug --log-format pretty
//! logship version
//! ```

use anyhow::Result;
use clap::Parser;

use logship_core::PipelineConfig;
use logship_daemon::cli::{Command, DaemonCli, version_string};
use logship_daemon::{logging, metrics_server, orchestrator::Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    if let Some(Command::Version) = cli.command {
        println!("{}", version_string());
        return Ok(());
    }

    let mut config = PipelineConfig::load(&cli.config).await?;

    // CLI overrides beat the config file and environment variables.
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.general.log_format = format.clone();
    }
    config.validate()?;

    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "starting logship"
    );

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await?;

    tracing::info!("logship exited cleanly");
    Ok(())
}
