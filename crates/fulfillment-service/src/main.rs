//! Main entry point for the fulfillment service.
//!
//! Loads configuration, builds the assignment engine on the configured
//! storage backend, seeds configured delivery persons, and serves the HTTP
//! API until interrupted.

use clap::Parser;
use fulfillment_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

use factory_registry::FactoryRegistry;

/// Command-line arguments for the fulfillment service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG takes precedence over --log-level.
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started fulfillment service");

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = FactoryRegistry::with_defaults().build_engine(config.clone())?;
	let engine = Arc::new(engine);
	engine.initialize().await?;

	let api_config = config.api_or_default();
	if api_config.enabled {
		tokio::select! {
			result = server::start_server(api_config, Arc::clone(&engine)) => {
				tracing::info!("API server finished");
				result?;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Received shutdown signal");
			}
		}
	} else {
		tracing::warn!("API server disabled; waiting for shutdown signal");
		tokio::signal::ctrl_c().await?;
	}

	engine.shutdown().await?;
	tracing::info!("Stopped fulfillment service");
	Ok(())
}
