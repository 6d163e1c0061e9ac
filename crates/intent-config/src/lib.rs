// intent-config/src/lib.rs

use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod types;

pub use types::*;

use intent_types::U256;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "INTENT_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Loads the file (or defaults when no file is set), applies environment
	/// overrides and validates the result.
	pub fn load(&self) -> Result<EngineConfig, ConfigError> {
		let mut config = match &self.file_path {
			Some(path) => self.load_from_file(path)?,
			None => {
				debug!("No configuration file specified, using defaults");
				EngineConfig::default()
			}
		};

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	fn load_from_file(&self, path: &Path) -> Result<EngineConfig, ConfigError> {
		if !path.exists() {
			return Err(ConfigError::FileNotFound(path.display().to_string()));
		}
		info!("Loading configuration from {:?}", path);

		let content = std::fs::read_to_string(path)?;
		let content = substitute_env_vars(&content)?;

		match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => from_toml(&content),
			Some("json") => from_json(&content),
			Some("yaml") | Some("yml") => from_yaml(&content),
			_ => Err(ConfigError::ParseError(format!(
				"Unsupported config format: {:?}",
				path
			))),
		}
	}

	fn apply_env_overrides(&self, config: &mut EngineConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			debug!("Overriding log level from environment");
			config.engine.log_level = log_level;
		}

		if let Ok(fee) = env::var(format!("{}APP_FEE_BPS", self.env_prefix)) {
			config.quote.app_fee_bps = fee
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid app fee: {}", e)))?;
		}

		if let Ok(wait) = env::var(format!("{}QUOTE_WAIT_MS", self.env_prefix)) {
			config.quote.wait_budget_ms = wait.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid quote wait budget: {}", e))
			})?;
		}

		Ok(())
	}
}

/// Parses a TOML document
pub fn from_toml(contents: &str) -> Result<EngineConfig, ConfigError> {
	toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parses a JSON document
pub fn from_json(contents: &str) -> Result<EngineConfig, ConfigError> {
	serde_json::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parses a YAML document
pub fn from_yaml(contents: &str) -> Result<EngineConfig, ConfigError> {
	serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Replaces `${VAR_NAME}` patterns with environment values.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = regex::Regex::new(r"\$\{([^}]+)\}")
		.map_err(|e| ConfigError::ParseError(e.to_string()))?;

	let mut result = content.to_string();
	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

/// Checks cross-field constraints serde cannot express.
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
	if config.quote.app_fee_bps > 10_000 {
		return Err(ConfigError::ValidationError(format!(
			"app_fee_bps must be at most 10000, got {}",
			config.quote.app_fee_bps
		)));
	}

	if config.intent.slippage_bps > 10_000 {
		return Err(ConfigError::ValidationError(format!(
			"slippage_bps must be at most 10000, got {}",
			config.intent.slippage_bps
		)));
	}

	if config.quote.throttle_interval_ms == 0 {
		return Err(ConfigError::ValidationError(
			"throttle_interval_ms must be positive".to_string(),
		));
	}

	let routes = &config.routes;
	if routes.internal_chain.as_str().is_empty() || routes.native_chain.as_str().is_empty() {
		return Err(ConfigError::ValidationError(
			"Route chains must not be empty".to_string(),
		));
	}

	if routes.internal_chain == routes.native_chain {
		return Err(ConfigError::ValidationError(format!(
			"Internal chain '{}' cannot also be the native chain",
			routes.internal_chain
		)));
	}

	if routes
		.virtual_chains
		.iter()
		.any(|c| c == &routes.internal_chain || c == &routes.native_chain)
	{
		return Err(ConfigError::ValidationError(
			"Virtual chains must differ from the internal and native chains".to_string(),
		));
	}

	for (deployment, value) in &config.bridge.min_withdrawals {
		if U256::from_str_radix(value, 10).is_err() {
			return Err(ConfigError::ValidationError(format!(
				"Minimum withdrawal for {} is not an integer: {}",
				deployment, value
			)));
		}
	}

	Ok(())
}
