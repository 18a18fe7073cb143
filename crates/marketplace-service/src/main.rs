//! Main entry point for the marketplace service.
//!
//! Loads the configuration, wires the storage and catalog backends it names
//! into a marketplace engine and serves the HTTP API.

use clap::Parser;
use marketplace_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the marketplace service.
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

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started marketplace");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.marketplace.id);

	let api_config = config.api.clone().filter(|api| api.enabled);
	let engine = Arc::new(factory_registry::build_marketplace_from_config(config)?);

	let Some(api_config) = api_config else {
		tracing::warn!("API server disabled, nothing to serve");
		return Ok(());
	};

	tokio::select! {
		result = server::start_server(api_config, engine) => {
			tracing::info!("API server finished");
			result?;
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Shutdown signal received");
		}
	}

	tracing::info!("Stopped marketplace");
	Ok(())
}
