// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment lifecycle configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "texecom-envs";
pub const DEFAULT_IMAGE: &str =
	"534294601285.dkr.ecr.eu-west-2.amazonaws.com/develop/texecom-cloud:latest";
pub const DEFAULT_BASE_DOMAIN: &str = "envs.services.texecom-develop.com";
pub const DEFAULT_INGRESS_CLASS: &str = "alb";
pub const DEFAULT_INGRESS_GROUP: &str = "texecom-platform";
pub const DEFAULT_MANIFEST_DIR: &str = "/tmp/testbed-manifests";
pub const DEFAULT_WORKLOAD_SECRET: &str = "texecom-cloud-secrets";
pub const DEFAULT_WORKLOAD_SECRET_KEY: &str = "mysql-password";
pub const DEFAULT_WORKLOAD_DB_USER: &str = "texecom";

/// How the provisioning pipeline decides a workload is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
	/// Wait a fixed delay, then report ready.
	#[default]
	Delay,
	/// Poll the workload's `/health` endpoint.
	Http,
}

impl std::str::FromStr for ReadinessMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"delay" => Ok(ReadinessMode::Delay),
			"http" => Ok(ReadinessMode::Http),
			other => Err(format!("unknown readiness mode '{other}' (expected delay or http)")),
		}
	}
}

/// Environment lifecycle configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentsConfig {
	/// Orchestration namespace every workload is deployed into
	pub namespace: String,
	/// Application image run by each environment
	pub image: String,
	/// Public URLs are `https://<name>.<base_domain>`
	pub base_domain: String,
	pub ingress_class: String,
	/// ALB group shared by all environment ingresses
	pub ingress_group: String,
	/// Where the file applier writes `env-<id>.yaml`
	pub manifest_dir: PathBuf,
	/// Secret holding the workload's database password
	pub workload_secret: String,
	pub workload_secret_key: String,
	/// Database user the workload connects as
	pub workload_db_user: String,
	pub sweep_interval_secs: u64,
	pub ready_timeout_secs: u64,
	pub ready_poll_interval_ms: u64,
	pub readiness: ReadinessMode,
	pub readiness_delay_secs: u64,
	/// Upper bound on the whole provisioning pipeline
	pub provision_timeout_secs: u64,
	/// Retries after the first failed schema creation
	pub schema_retry_attempts: u32,
	/// Delay before the first retry; doubles on each further retry
	pub schema_retry_base_delay_ms: u64,
	pub ephemeral_ttl_hours: u32,
	pub sandbox_ttl_hours: u32,
}

impl Default for EnvironmentsConfig {
	fn default() -> Self {
		EnvironmentsConfigLayer::default().finalize()
	}
}

/// Environment lifecycle configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentsConfigLayer {
	#[serde(default)]
	pub namespace: Option<String>,
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub base_domain: Option<String>,
	#[serde(default)]
	pub ingress_class: Option<String>,
	#[serde(default)]
	pub ingress_group: Option<String>,
	#[serde(default)]
	pub manifest_dir: Option<PathBuf>,
	#[serde(default)]
	pub workload_secret: Option<String>,
	#[serde(default)]
	pub workload_secret_key: Option<String>,
	#[serde(default)]
	pub workload_db_user: Option<String>,
	#[serde(default)]
	pub sweep_interval_secs: Option<u64>,
	#[serde(default)]
	pub ready_timeout_secs: Option<u64>,
	#[serde(default)]
	pub ready_poll_interval_ms: Option<u64>,
	#[serde(default)]
	pub readiness: Option<ReadinessMode>,
	#[serde(default)]
	pub readiness_delay_secs: Option<u64>,
	#[serde(default)]
	pub provision_timeout_secs: Option<u64>,
	#[serde(default)]
	pub schema_retry_attempts: Option<u32>,
	#[serde(default)]
	pub schema_retry_base_delay_ms: Option<u64>,
	#[serde(default)]
	pub ephemeral_ttl_hours: Option<u32>,
	#[serde(default)]
	pub sandbox_ttl_hours: Option<u32>,
}

macro_rules! take_some {
	($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
		$(
			if $other.$field.is_some() {
				$self.$field = $other.$field;
			}
		)+
	};
}

impl EnvironmentsConfigLayer {
	pub fn merge(&mut self, other: EnvironmentsConfigLayer) {
		take_some!(
			self,
			other,
			namespace,
			image,
			base_domain,
			ingress_class,
			ingress_group,
			manifest_dir,
			workload_secret,
			workload_secret_key,
			workload_db_user,
			sweep_interval_secs,
			ready_timeout_secs,
			ready_poll_interval_ms,
			readiness,
			readiness_delay_secs,
			provision_timeout_secs,
			schema_retry_attempts,
			schema_retry_base_delay_ms,
			ephemeral_ttl_hours,
			sandbox_ttl_hours,
		);
	}

	pub fn finalize(self) -> EnvironmentsConfig {
		EnvironmentsConfig {
			namespace: self
				.namespace
				.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
			image: self.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
			base_domain: self
				.base_domain
				.unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string()),
			ingress_class: self
				.ingress_class
				.unwrap_or_else(|| DEFAULT_INGRESS_CLASS.to_string()),
			ingress_group: self
				.ingress_group
				.unwrap_or_else(|| DEFAULT_INGRESS_GROUP.to_string()),
			manifest_dir: self
				.manifest_dir
				.unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_DIR)),
			workload_secret: self
				.workload_secret
				.unwrap_or_else(|| DEFAULT_WORKLOAD_SECRET.to_string()),
			workload_secret_key: self
				.workload_secret_key
				.unwrap_or_else(|| DEFAULT_WORKLOAD_SECRET_KEY.to_string()),
			workload_db_user: self
				.workload_db_user
				.unwrap_or_else(|| DEFAULT_WORKLOAD_DB_USER.to_string()),
			sweep_interval_secs: self.sweep_interval_secs.unwrap_or(60),
			ready_timeout_secs: self.ready_timeout_secs.unwrap_or(300),
			ready_poll_interval_ms: self.ready_poll_interval_ms.unwrap_or(500),
			readiness: self.readiness.unwrap_or_default(),
			readiness_delay_secs: self.readiness_delay_secs.unwrap_or(5),
			provision_timeout_secs: self.provision_timeout_secs.unwrap_or(900), // 15 minutes
			schema_retry_attempts: self.schema_retry_attempts.unwrap_or(2),
			schema_retry_base_delay_ms: self.schema_retry_base_delay_ms.unwrap_or(1000),
			ephemeral_ttl_hours: self.ephemeral_ttl_hours.unwrap_or(8),
			sandbox_ttl_hours: self.sandbox_ttl_hours.unwrap_or(7 * 24),
		}
	}
}
