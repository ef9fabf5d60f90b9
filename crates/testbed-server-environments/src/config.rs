// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment manager configuration.

use std::time::Duration;

use crate::types::EnvironmentType;

/// Configuration for the environment manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
	/// Namespace every workload is deployed into
	pub namespace: String,
	/// Public URLs are `https://<name>.<base_domain>`
	pub base_domain: String,
	pub ephemeral_ttl_hours: u32,
	pub sandbox_ttl_hours: u32,
	/// Expiry sweep interval in seconds
	pub sweep_interval_secs: u64,
	/// Timeout waiting for the workload to report ready, in seconds
	pub ready_timeout_secs: u64,
	pub ready_poll_interval_ms: u64,
	/// Upper bound on the whole provisioning pipeline, in seconds
	pub provision_timeout_secs: u64,
	/// Retries after the first failed schema creation
	pub schema_retry_attempts: u32,
	pub schema_retry_base_delay_ms: u64,
	pub workload: WorkloadConfig,
}

/// What the generated manifest runs and wires it to.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
	pub image: String,
	pub ingress_class: String,
	pub ingress_group: String,
	pub database_host: String,
	pub database_user: String,
	/// Secret name and key holding the workload's database password
	pub database_secret: String,
	pub database_secret_key: String,
	pub cache_host: String,
	pub bus_host: String,
}

impl ManagerConfig {
	/// Default lifetime in hours for `env_type`.
	pub fn default_ttl_hours(&self, env_type: EnvironmentType) -> u32 {
		match env_type {
			EnvironmentType::Ephemeral => self.ephemeral_ttl_hours,
			EnvironmentType::Sandbox => self.sandbox_ttl_hours,
		}
	}

	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs)
	}

	pub fn ready_timeout(&self) -> Duration {
		Duration::from_secs(self.ready_timeout_secs)
	}

	pub fn ready_poll_interval(&self) -> Duration {
		Duration::from_millis(self.ready_poll_interval_ms)
	}

	pub fn provision_timeout(&self) -> Duration {
		Duration::from_secs(self.provision_timeout_secs)
	}
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			namespace: "texecom-envs".to_string(),
			base_domain: "envs.services.texecom-develop.com".to_string(),
			ephemeral_ttl_hours: 8,
			sandbox_ttl_hours: 7 * 24,
			sweep_interval_secs: 60,
			ready_timeout_secs: 300,
			ready_poll_interval_ms: 500,
			provision_timeout_secs: 900, // 15 minutes
			schema_retry_attempts: 2,
			schema_retry_base_delay_ms: 1000,
			workload: WorkloadConfig::default(),
		}
	}
}

impl Default for WorkloadConfig {
	fn default() -> Self {
		Self {
			image: "534294601285.dkr.ecr.eu-west-2.amazonaws.com/develop/texecom-cloud:latest"
				.to_string(),
			ingress_class: "alb".to_string(),
			ingress_group: "texecom-platform".to_string(),
			database_host: "texecom-texecom-cloud-mysql.texecom.svc.cluster.local".to_string(),
			database_user: "texecom".to_string(),
			database_secret: "texecom-cloud-secrets".to_string(),
			database_secret_key: "mysql-password".to_string(),
			cache_host: "texecom-texecom-cloud-redis.texecom.svc.cluster.local".to_string(),
			bus_host: "texecom-texecom-cloud-emqx.texecom.svc.cluster.local".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_ttls_by_type() {
		let config = ManagerConfig::default();
		assert_eq!(config.default_ttl_hours(EnvironmentType::Ephemeral), 8);
		assert_eq!(config.default_ttl_hours(EnvironmentType::Sandbox), 168);
	}
}
