// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Translate server configuration into the environment manager's inputs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use testbed_server_config::{ReadinessMode, ServerConfig};
use testbed_server_db::{create_pool, ConnectSettings, MySqlSchemaStore, SchemaStore};
use testbed_server_environments::{
	Backends, DelayProbe, FileManifestApplier, HttpProbe, ManagerConfig, ReadinessProbe,
	WorkloadConfig,
};

pub fn manager_config(config: &ServerConfig) -> ManagerConfig {
	let envs = &config.environments;
	ManagerConfig {
		namespace: envs.namespace.clone(),
		base_domain: envs.base_domain.clone(),
		ephemeral_ttl_hours: envs.ephemeral_ttl_hours,
		sandbox_ttl_hours: envs.sandbox_ttl_hours,
		sweep_interval_secs: envs.sweep_interval_secs,
		ready_timeout_secs: envs.ready_timeout_secs,
		ready_poll_interval_ms: envs.ready_poll_interval_ms,
		provision_timeout_secs: envs.provision_timeout_secs,
		schema_retry_attempts: envs.schema_retry_attempts,
		schema_retry_base_delay_ms: envs.schema_retry_base_delay_ms,
		workload: WorkloadConfig {
			image: envs.image.clone(),
			ingress_class: envs.ingress_class.clone(),
			ingress_group: envs.ingress_group.clone(),
			database_host: config.database.host.clone(),
			database_user: envs.workload_db_user.clone(),
			database_secret: envs.workload_secret.clone(),
			database_secret_key: envs.workload_secret_key.clone(),
			cache_host: config.cache.host.clone(),
			bus_host: config.bus.host.clone(),
		},
	}
}

/// Schema store, applier and probe for `serve`.
///
/// Must be called from within a tokio runtime; the database pool connects
/// lazily.
pub fn backends(config: &ServerConfig) -> anyhow::Result<Backends> {
	let schemas: Option<Arc<dyn SchemaStore>> = match &config.database.password {
		Some(password) => {
			let settings = ConnectSettings {
				host: config.database.host.clone(),
				port: config.database.port,
				user: config.database.user.clone(),
				password: password.clone(),
				connect_timeout: Duration::from_secs(config.database.connect_timeout_secs),
			};
			Some(Arc::new(MySqlSchemaStore::new(create_pool(&settings))))
		}
		None => None,
	};

	let probe: Arc<dyn ReadinessProbe> = match config.environments.readiness {
		ReadinessMode::Delay => Arc::new(DelayProbe::new(Duration::from_secs(
			config.environments.readiness_delay_secs,
		))),
		ReadinessMode::Http => {
			Arc::new(HttpProbe::new().context("failed to build readiness HTTP client")?)
		}
	};

	Ok(Backends {
		schemas,
		applier: Arc::new(FileManifestApplier::new(
			config.environments.manifest_dir.clone(),
		)),
		probe,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use testbed_common_config::SecretString;
	use testbed_server_config::{finalize, EnvironmentsConfigLayer, ServerConfigLayer};

	fn server_config(password: Option<&str>) -> ServerConfig {
		finalize(
			ServerConfigLayer::default(),
			password.map(|p| SecretString::new(p.to_string())),
		)
		.unwrap()
	}

	#[test]
	fn manager_config_carries_environment_settings() {
		let config = server_config(None);
		let manager = manager_config(&config);

		assert_eq!(manager.namespace, config.environments.namespace);
		assert_eq!(manager.ephemeral_ttl_hours, 8);
		assert_eq!(manager.sandbox_ttl_hours, 168);
		assert_eq!(manager.schema_retry_base_delay_ms, 1000);
		assert_eq!(manager.workload.database_host, config.database.host);
		assert_eq!(manager.workload.cache_host, config.cache.host);
		assert_eq!(manager.workload.bus_host, config.bus.host);
	}

	#[test]
	fn manager_config_takes_configured_retry_delay() {
		let layer = ServerConfigLayer {
			environments: Some(EnvironmentsConfigLayer {
				schema_retry_base_delay_ms: Some(50),
				..Default::default()
			}),
			..Default::default()
		};
		let config = finalize(layer, None).unwrap();
		assert_eq!(manager_config(&config).schema_retry_base_delay_ms, 50);
	}

	#[tokio::test]
	async fn no_password_means_no_schema_store() {
		let backends = backends(&server_config(None)).unwrap();
		assert!(backends.schemas.is_none());
	}

	#[tokio::test]
	async fn password_enables_schema_store() {
		let backends = backends(&server_config(Some("hunter2"))).unwrap();
		assert!(backends.schemas.is_some());
	}
}
