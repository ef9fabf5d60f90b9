// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	BusConfigLayer, CacheConfigLayer, DatabaseConfigLayer, EnvironmentsConfigLayer,
	LoggingConfigLayer,
};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub environments: Option<EnvironmentsConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub cache: Option<CacheConfigLayer>,
	#[serde(default)]
	pub bus: Option<BusConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(
			&mut self.environments,
			other.environments,
			EnvironmentsConfigLayer::merge,
		);
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(&mut self.cache, other.cache, CacheConfigLayer::merge);
		merge_option(&mut self.bus, other.bus, BusConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer::default());
		assert!(base.environments.is_none());
		assert!(base.database.is_none());
	}

	#[test]
	fn test_merge_fills_missing_section() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			cache: Some(CacheConfigLayer {
				host: Some("redis.local".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(
			base.cache.unwrap().host.as_deref(),
			Some("redis.local")
		);
	}

	#[test]
	fn test_merge_other_overwrites_field_by_field() {
		let mut base = ServerConfigLayer {
			environments: Some(EnvironmentsConfigLayer {
				namespace: Some("from-file".to_string()),
				base_domain: Some("file.example.com".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let other = ServerConfigLayer {
			environments: Some(EnvironmentsConfigLayer {
				namespace: Some("from-env".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);

		let envs = base.environments.unwrap();
		assert_eq!(envs.namespace.as_deref(), Some("from-env"));
		assert_eq!(envs.base_domain.as_deref(), Some("file.example.com"));
	}

	#[test]
	fn test_deserialize_full_file() {
		let toml_str = r#"
[environments]
namespace = "qa"
sweep_interval_secs = 15

[database]
host = "mysql.qa"
port = 3307

[bus]
host = "emqx.qa"

[logging]
level = "debug"
"#;
		let layer: ServerConfigLayer = toml::from_str(toml_str).unwrap();
		assert_eq!(
			layer.environments.unwrap().sweep_interval_secs,
			Some(15)
		);
		assert_eq!(layer.database.unwrap().port, Some(3307));
		assert_eq!(layer.bus.unwrap().host.as_deref(), Some("emqx.qa"));
		assert!(layer.cache.is_none());
	}
}
