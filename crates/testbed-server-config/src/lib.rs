// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the testbed environment server.
//!
//! Layered from defaults, a TOML file and `TESTBED_*` environment variables,
//! in increasing precedence.
//!
//! ```ignore
//! let config = testbed_server_config::load_config()?;
//! println!("deploying into {}", config.environments.namespace);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use testbed_common_config::{load_secret_env, SecretString};
use tracing::{debug, info};

/// Environment variables consulted for the SQL password, in order.
pub const DATABASE_PASSWORD_VARS: [&str; 2] = ["TESTBED_DATABASE_PASSWORD", "MYSQL_ROOT_PASSWORD"];

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub environments: EnvironmentsConfig,
	pub database: DatabaseConfig,
	pub cache: CacheConfig,
	pub bus: BusConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TESTBED_*`)
/// 2. Config file (`/etc/testbed/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	let password = load_database_password()?;
	finalize(merged, password)
}

fn load_database_password() -> Result<Option<SecretString>, ConfigError> {
	for var in DATABASE_PASSWORD_VARS {
		if let Some(secret) = load_secret_env(var).map_err(|e| ConfigError::Secret(e.to_string()))? {
			debug!(var, "database password loaded");
			return Ok(Some(secret));
		}
	}
	Ok(None)
}

/// Finalize a merged layer into resolved config.
pub fn finalize(
	layer: ServerConfigLayer,
	database_password: Option<SecretString>,
) -> Result<ServerConfig, ConfigError> {
	let environments = layer.environments.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize(database_password);
	let cache = layer.cache.unwrap_or_default().finalize();
	let bus = layer.bus.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&environments)?;

	info!(
		namespace = %environments.namespace,
		base_domain = %environments.base_domain,
		readiness = ?environments.readiness,
		database_host = %database.host,
		database_configured = database.has_credentials(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		environments,
		database,
		cache,
		bus,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(envs: &EnvironmentsConfig) -> Result<(), ConfigError> {
	if envs.namespace.trim().is_empty() {
		return Err(ConfigError::Validation("namespace must not be empty".to_string()));
	}
	if envs.base_domain.trim().is_empty() {
		return Err(ConfigError::Validation(
			"base_domain must not be empty".to_string(),
		));
	}
	if envs.ephemeral_ttl_hours == 0 || envs.sandbox_ttl_hours == 0 {
		return Err(ConfigError::Validation(
			"default TTLs must be at least one hour".to_string(),
		));
	}
	if envs.sweep_interval_secs == 0 || envs.ready_poll_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"sweep and readiness poll intervals must be non-zero".to_string(),
		));
	}
	if envs.ready_timeout_secs == 0 || envs.provision_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"readiness and provisioning timeouts must be non-zero".to_string(),
		));
	}

	Ok(())
}
