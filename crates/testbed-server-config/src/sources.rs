// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	BusConfigLayer, CacheConfigLayer, DatabaseConfigLayer, EnvironmentsConfigLayer, LogFormat,
	LoggingConfigLayer, ReadinessMode,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/testbed/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TESTBED_<SECTION>_<FIELD>, with the environment section
/// unprefixed (`TESTBED_NAMESPACE`, `TESTBED_IMAGE`, ...).
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			environments: Some(load_environments_from_env()?),
			database: Some(load_database_from_env()?),
			cache: Some(CacheConfigLayer {
				host: env_var("TESTBED_CACHE_HOST"),
			}),
			bus: Some(BusConfigLayer {
				host: env_var("TESTBED_BUS_HOST"),
			}),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str, kind: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
{
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	env_parse(name, "u16")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn load_environments_from_env() -> Result<EnvironmentsConfigLayer, ConfigError> {
	let readiness = match env_var("TESTBED_READINESS") {
		Some(v) => Some(v.parse::<ReadinessMode>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "TESTBED_READINESS".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(EnvironmentsConfigLayer {
		namespace: env_var("TESTBED_NAMESPACE"),
		image: env_var("TESTBED_IMAGE"),
		base_domain: env_var("TESTBED_BASE_DOMAIN"),
		ingress_class: env_var("TESTBED_INGRESS_CLASS"),
		ingress_group: env_var("TESTBED_INGRESS_GROUP"),
		manifest_dir: env_var("TESTBED_MANIFEST_DIR").map(PathBuf::from),
		workload_secret: env_var("TESTBED_WORKLOAD_SECRET"),
		workload_secret_key: env_var("TESTBED_WORKLOAD_SECRET_KEY"),
		workload_db_user: env_var("TESTBED_WORKLOAD_DB_USER"),
		sweep_interval_secs: env_u64("TESTBED_SWEEP_INTERVAL_SECS")?,
		ready_timeout_secs: env_u64("TESTBED_READY_TIMEOUT_SECS")?,
		ready_poll_interval_ms: env_u64("TESTBED_READY_POLL_INTERVAL_MS")?,
		readiness,
		readiness_delay_secs: env_u64("TESTBED_READINESS_DELAY_SECS")?,
		provision_timeout_secs: env_u64("TESTBED_PROVISION_TIMEOUT_SECS")?,
		schema_retry_attempts: env_u32("TESTBED_SCHEMA_RETRY_ATTEMPTS")?,
		schema_retry_base_delay_ms: env_u64("TESTBED_SCHEMA_RETRY_BASE_DELAY_MS")?,
		ephemeral_ttl_hours: env_u32("TESTBED_EPHEMERAL_TTL_HOURS")?,
		sandbox_ttl_hours: env_u32("TESTBED_SANDBOX_TTL_HOURS")?,
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		host: env_var("TESTBED_DATABASE_HOST"),
		port: env_u16("TESTBED_DATABASE_PORT")?,
		user: env_var("TESTBED_DATABASE_USER"),
		connect_timeout_secs: env_u64("TESTBED_DATABASE_CONNECT_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("TESTBED_LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
		Some(v) if v == "json" => Some(LogFormat::Json),
		Some(v) if v == "pretty" => Some(LogFormat::Pretty),
		Some(v) => {
			return Err(ConfigError::InvalidValue {
				key: "TESTBED_LOG_FORMAT".to_string(),
				message: format!("unknown log format '{v}' (expected pretty or json)"),
			})
		}
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("TESTBED_LOG_LEVEL"),
		format,
	})
}
