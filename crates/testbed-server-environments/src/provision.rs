// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The provisioning pipeline: schema, manifest, readiness.
//!
//! Runs on its own task. Between steps it re-reads the record and stops with
//! [`ProvisionError::Cancelled`] once a delete has been requested.

use std::sync::Arc;
use std::time::Duration;

use testbed_server_db::DbError;

use crate::error::ProvisionError;
use crate::manager::Inner;
use crate::manifest;
use crate::readiness;
use crate::store::CommitOutcome;
use crate::teardown;
use crate::types::{Environment, EnvironmentId};

const RETRY_FACTOR: u32 = 2;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Delay before retry number `retry_count` (1-based).
pub fn calculate_backoff_delay(retry_count: u32, base: Duration) -> Duration {
	if retry_count == 0 {
		return Duration::ZERO;
	}
	let factor = RETRY_FACTOR.saturating_pow(retry_count - 1);
	base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Provision `id` and commit the outcome.
///
/// If a delete arrived in the meantime the outcome is discarded and
/// teardown runs here instead.
pub(crate) async fn run(inner: Arc<Inner>, id: EnvironmentId) {
	let timeout = inner.config.provision_timeout();
	let outcome = match tokio::time::timeout(timeout, provision(&inner, &id)).await {
		Ok(result) => result,
		Err(_) => Err(ProvisionError::Timeout {
			timeout_secs: timeout.as_secs(),
		}),
	};

	let commit = outcome.map_err(|e| e.to_string());
	match inner.registry.commit_provisioning(&id, commit).await {
		CommitOutcome::Ready => {
			tracing::info!(env_id = %id, "Environment ready");
		}
		CommitOutcome::Failed(message) => {
			tracing::warn!(env_id = %id, error = %message, "Environment provisioning failed");
		}
		CommitOutcome::TeardownRequested => {
			tracing::info!(env_id = %id, "Provisioning finished after delete, tearing down");
			teardown::run(&inner, &id).await;
		}
		CommitOutcome::Ignored => {
			tracing::debug!(env_id = %id, "Provisioning outcome ignored");
		}
	}
}

async fn provision(inner: &Inner, id: &EnvironmentId) -> Result<(), ProvisionError> {
	let env = current(inner, id).await?;
	create_schema(inner, &env).await?;

	let env = current(inner, id).await?;
	let manifest = manifest::generate(&env, &inner.config);
	inner.applier.apply(&env, &manifest).await?;
	tracing::debug!(env_id = %id, "Manifest handed off");

	let env = current(inner, id).await?;
	readiness::wait_until_ready(
		inner.probe.as_ref(),
		&env,
		inner.config.ready_poll_interval(),
		inner.config.ready_timeout(),
	)
	.await
}

/// The latest snapshot of `id`, unless it is being deleted.
async fn current(inner: &Inner, id: &EnvironmentId) -> Result<Environment, ProvisionError> {
	match inner.registry.get(id).await {
		Some(env) if !env.status.is_going_away() => Ok(env),
		_ => Err(ProvisionError::Cancelled),
	}
}

async fn create_schema(inner: &Inner, env: &Environment) -> Result<(), ProvisionError> {
	let Some(schemas) = &inner.schemas else {
		tracing::warn!(
			env_id = %env.id,
			schema = %env.database_schema,
			"Database not configured, skipping schema creation"
		);
		return Ok(());
	};

	let max_attempts = inner.config.schema_retry_attempts.saturating_add(1);
	let base_delay = Duration::from_millis(inner.config.schema_retry_base_delay_ms);
	let mut attempt = 0;

	loop {
		attempt += 1;
		match schemas.create_schema(&env.database_schema).await {
			Ok(()) => {
				tracing::debug!(env_id = %env.id, schema = %env.database_schema, attempt, "Schema created");
				return Ok(());
			}
			Err(e) => {
				let retryable = !matches!(e, DbError::InvalidIdentifier(_));
				if !retryable || attempt >= max_attempts {
					return Err(ProvisionError::Schema {
						attempts: attempt,
						source: e,
					});
				}
				if inner.registry.delete_requested(&env.id).await {
					return Err(ProvisionError::Cancelled);
				}

				let delay = calculate_backoff_delay(attempt, base_delay);
				tracing::warn!(
					env_id = %env.id,
					attempt,
					delay_ms = delay.as_millis() as u64,
					error = %e,
					"Schema creation failed, retrying"
				);
				tokio::time::sleep(delay).await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE: Duration = Duration::from_secs(1);

	#[test]
	fn backoff_doubles() {
		assert_eq!(calculate_backoff_delay(1, BASE), Duration::from_secs(1));
		assert_eq!(calculate_backoff_delay(2, BASE), Duration::from_secs(2));
		assert_eq!(calculate_backoff_delay(3, BASE), Duration::from_secs(4));
	}

	#[test]
	fn backoff_caps_at_max() {
		assert_eq!(calculate_backoff_delay(10, BASE), MAX_RETRY_DELAY);
		assert_eq!(calculate_backoff_delay(100, BASE), MAX_RETRY_DELAY);
	}

	#[test]
	fn backoff_zero_retries_is_immediate() {
		assert_eq!(calculate_backoff_delay(0, BASE), Duration::ZERO);
	}
}
