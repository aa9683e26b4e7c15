//! sensorpub - Main Entry Point
//!
//! Startup sequence: load configuration, connect to the broker (fatal on
//! failure - the service is meaningless without one), then run the publish
//! loop and the shutdown coordinator concurrently until a termination signal
//! arrives.

use clap::{Parser, Subcommand};
use sensorpub::config::SensorPubConfig;
use sensorpub::observability::init_default_logging;
use sensorpub::sensor::{Sensor, SensorIdentity};
use sensorpub::transport::mqtt::MqttClient;
use sensorpub::transport::Transport;
use sensorpub::{Publisher, ShutdownCoordinator, TelemetryResult};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Resilient MQTT telemetry publisher for simulated sensors
#[derive(Parser)]
#[command(name = "sensorpub")]
#[command(about = "Publishes simulated sensor readings to an MQTT broker")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the publisher
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting sensorpub v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_publisher(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> TelemetryResult<SensorPubConfig> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(SensorPubConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = vec!["sensorpub.toml", "config/sensorpub.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(SensorPubConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using built-in defaults");
            Ok(SensorPubConfig::default())
        }
    }
}

async fn run_publisher(config: SensorPubConfig) -> TelemetryResult<()> {
    let identity = match &config.sensor.name {
        Some(name) => SensorIdentity::Fixed(name.clone()),
        None => SensorIdentity::Random,
    };
    let sensor = Sensor::new(identity);
    info!(
        sensor = %sensor.name(),
        broker = %config.mqtt.broker_url,
        "starting telemetry publisher"
    );

    // The sensor name doubles as the MQTT client identity
    let mut transport = MqttClient::new(sensor.name(), config.mqtt.clone())?;

    // Initial connect failure is fatal: propagate to main, exit non-zero
    Transport::connect(&mut transport).await?;
    info!("connection is up");

    let transport = Arc::new(transport);

    // Register for termination notifications before starting the loop so no
    // signal window is missed
    let coordinator = ShutdownCoordinator::new()?;

    let publisher = Publisher::new(transport.clone(), sensor, &config.publish);
    let handle = publisher.spawn();

    // Blocks until a signal arrives, then drives the stop handshake
    coordinator.run(handle).await;

    transport.disconnect().await?;
    Ok(())
}

fn handle_config_command(config: SensorPubConfig, show: bool) -> TelemetryResult<()> {
    if show {
        println!("Current configuration:");
        match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                return Err(sensorpub::TelemetryError::internal(format!(
                    "failed to render configuration: {e}"
                )))
            }
        }
    }

    info!("Configuration validation complete");
    Ok(())
}
