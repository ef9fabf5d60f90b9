// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared SQL server configuration.

use serde::Deserialize;
use testbed_common_config::SecretString;

pub const DEFAULT_DATABASE_HOST: &str = "texecom-texecom-cloud-mysql.texecom.svc.cluster.local";

/// SQL server configuration (runtime, fully resolved).
///
/// `password` is `None` when no credentials were supplied; schema
/// operations are then skipped with a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
	pub host: String,
	pub port: u16,
	pub user: String,
	pub password: Option<SecretString>,
	pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
	/// True when schema operations can run.
	pub fn has_credentials(&self) -> bool {
		self.password.is_some()
	}
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		DatabaseConfigLayer::default().finalize(None)
	}
}

/// Database configuration layer (partial, for merging).
///
/// The password never comes from TOML; it is loaded from the environment
/// when the layer is finalized.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub user: Option<String>,
	#[serde(default)]
	pub connect_timeout_secs: Option<u64>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.user.is_some() {
			self.user = other.user;
		}
		if other.connect_timeout_secs.is_some() {
			self.connect_timeout_secs = other.connect_timeout_secs;
		}
	}

	pub fn finalize(self, password: Option<SecretString>) -> DatabaseConfig {
		DatabaseConfig {
			host: self
				.host
				.unwrap_or_else(|| DEFAULT_DATABASE_HOST.to_string()),
			port: self.port.unwrap_or(3306),
			user: self.user.unwrap_or_else(|| "root".to_string()),
			password,
			connect_timeout_secs: self.connect_timeout_secs.unwrap_or(10),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use testbed_common_config::Secret;

	#[test]
	fn test_default_values() {
		let config = DatabaseConfig::default();
		assert_eq!(config.host, DEFAULT_DATABASE_HOST);
		assert_eq!(config.port, 3306);
		assert_eq!(config.user, "root");
		assert!(!config.has_credentials());
	}

	#[test]
	fn test_finalize_with_password() {
		let layer = DatabaseConfigLayer {
			host: Some("mysql.local".to_string()),
			..Default::default()
		};
		let config = layer.finalize(Some(Secret::new("pw".to_string())));
		assert_eq!(config.host, "mysql.local");
		assert!(config.has_credentials());
		assert!(!format!("{config:?}").contains("pw\""));
	}
}
