//! Configuration module for the marketplace service.
//!
//! Configuration is read from TOML. `${VAR}` and `${VAR:-default}` references
//! are replaced by environment variables before parsing, and the parsed
//! configuration is validated before it is handed to the builder.
//!
//! ## Modular Configuration Support
//!
//! A file may pull in others with `include = ["catalog.toml"]`. Every
//! top-level section must appear in exactly one file.

mod loader;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, not the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the marketplace service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this marketplace instance.
	pub marketplace: MarketplaceConfig,
	/// Tax, delivery fee and commission rules.
	#[serde(default)]
	pub pricing: PricingConfig,
	/// Storage backends.
	pub storage: StorageConfig,
	/// Catalog backends.
	pub catalog: CatalogConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the marketplace instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketplaceConfig {
	/// Unique identifier for this marketplace instance.
	pub id: String,
}

/// Pricing rules applied at order creation and delivery completion.
///
/// Amounts may be written as strings (`"2.00"`) or numbers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PricingConfig {
	/// Fraction of the subtotal charged as tax.
	#[serde(default)]
	pub tax_rate: Decimal,
	/// Flat fee added to every order.
	#[serde(default)]
	pub delivery_fee: Decimal,
	/// Fraction of an order total paid to the delivery person.
	#[serde(default = "default_commission_rate")]
	pub commission_rate: Decimal,
}

impl Default for PricingConfig {
	fn default() -> Self {
		Self {
			tax_rate: Decimal::ZERO,
			delivery_fee: Decimal::ZERO,
			commission_rate: default_commission_rate(),
		}
	}
}

/// Returns the default commission rate of 10%.
fn default_commission_rate() -> Decimal {
	Decimal::new(10, 2)
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Upper bound for a single storage call, in milliseconds.
	#[serde(default = "default_storage_timeout_ms")]
	pub timeout_ms: u64,
}

/// Returns the default storage call timeout (5 seconds).
fn default_storage_timeout_ms() -> u64 {
	5_000
}

/// Configuration for the product catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of catalog implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration. Permissive when absent.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following include directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Storage call timeout as a Duration.
	pub fn storage_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.storage.timeout_ms)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.marketplace.id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Marketplace ID cannot be empty".into(),
			));
		}

		self.validate_pricing()?;

		validate_primary(
			"storage",
			&self.storage.primary,
			self.storage.implementations.keys(),
		)?;
		if self.storage.timeout_ms == 0 || self.storage.timeout_ms > 60_000 {
			return Err(ConfigError::Validation(
				"Storage timeout_ms must be between 1 and 60000".into(),
			));
		}

		validate_primary(
			"catalog",
			&self.catalog.primary,
			self.catalog.implementations.keys(),
		)?;

		if let Some(ref api) = self.api {
			if api.enabled && api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"API max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}

	fn validate_pricing(&self) -> Result<(), ConfigError> {
		let pricing = &self.pricing;
		if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate >= Decimal::ONE {
			return Err(ConfigError::Validation(format!(
				"Pricing tax_rate must be in [0, 1), got {}",
				pricing.tax_rate
			)));
		}
		if pricing.delivery_fee < Decimal::ZERO {
			return Err(ConfigError::Validation(format!(
				"Pricing delivery_fee cannot be negative, got {}",
				pricing.delivery_fee
			)));
		}
		if pricing.commission_rate < Decimal::ZERO || pricing.commission_rate > Decimal::ONE {
			return Err(ConfigError::Validation(format!(
				"Pricing commission_rate must be in [0, 1], got {}",
				pricing.commission_rate
			)));
		}
		Ok(())
	}
}

/// Checks that a section has implementations and that its primary is one of them.
fn validate_primary<'a>(
	section: &str,
	primary: &str,
	mut implementations: impl Iterator<Item = &'a String>,
) -> Result<(), ConfigError> {
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.any(|name| name == primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
