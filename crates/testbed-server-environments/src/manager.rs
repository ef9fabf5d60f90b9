// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The environment manager: create, get, list, delete and extend.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use testbed_server_db::SchemaStore;

use crate::apply::ManifestApplier;
use crate::config::ManagerConfig;
use crate::error::EnvironmentError;
use crate::health::{EnvironmentsHealth, TeardownFailure, TeardownLog};
use crate::naming;
use crate::readiness::ReadinessProbe;
use crate::store::{DeleteAction, Registry};
use crate::types::{
	CreateEnvironmentRequest, Environment, EnvironmentId, EnvironmentStatus, ListFilter,
	SweepResult, ANONYMOUS_OWNER, DEFAULT_EXTENSION_HOURS, MAX_LIFETIME_HOURS,
};
use crate::{provision, teardown};

/// External collaborators the manager drives.
#[derive(Clone)]
pub struct Backends {
	/// `None` when no database credentials are configured; schema steps are
	/// then skipped with a warning.
	pub schemas: Option<Arc<dyn SchemaStore>>,
	pub applier: Arc<dyn ManifestApplier>,
	pub probe: Arc<dyn ReadinessProbe>,
}

pub(crate) struct Inner {
	pub config: ManagerConfig,
	pub registry: Registry,
	pub schemas: Option<Arc<dyn SchemaStore>>,
	pub applier: Arc<dyn ManifestApplier>,
	pub probe: Arc<dyn ReadinessProbe>,
	pub teardown_log: TeardownLog,
}

/// Handle to the environment registry and its background work.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EnvironmentManager {
	inner: Arc<Inner>,
}

impl EnvironmentManager {
	pub fn new(config: ManagerConfig, backends: Backends) -> Self {
		if backends.schemas.is_none() {
			tracing::warn!("No database credentials configured, schema creation will be skipped");
		}
		Self {
			inner: Arc::new(Inner {
				config,
				registry: Registry::new(),
				schemas: backends.schemas,
				applier: backends.applier,
				probe: backends.probe,
				teardown_log: TeardownLog::default(),
			}),
		}
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.inner.config
	}

	/// Register a new environment and start provisioning it in the background.
	///
	/// Returns immediately with the environment in `creating`. Must be called
	/// from within a tokio runtime.
	#[tracing::instrument(skip(self, req), fields(name = ?req.name, owner = ?req.owner))]
	pub async fn create(&self, req: CreateEnvironmentRequest) -> Environment {
		let now = Utc::now();
		let config = &self.inner.config;
		let env = self
			.inner
			.registry
			.insert(|id| draft_environment(id, &req, config, now))
			.await;

		tracing::info!(
			env_id = %env.id,
			name = %env.name,
			env_type = %env.env_type,
			expires_at = %env.expires_at,
			"Creating environment"
		);

		tokio::spawn(provision::run(self.inner.clone(), env.id.clone()));
		env
	}

	pub async fn get(&self, id: &EnvironmentId) -> Result<Environment, EnvironmentError> {
		self
			.inner
			.registry
			.get(id)
			.await
			.ok_or_else(|| not_found(id))
	}

	/// Environments matching `filter`, oldest first.
	pub async fn list(&self, filter: &ListFilter) -> Vec<Environment> {
		self.inner.registry.list(filter).await
	}

	/// Start deleting an environment. Repeated deletes succeed without
	/// doing anything.
	///
	/// A delete that arrives while provisioning is still running marks the
	/// environment `deleting`; the provisioning task tears it down when it
	/// finishes.
	#[tracing::instrument(skip(self), fields(env_id = %id))]
	pub async fn delete(&self, id: &EnvironmentId) -> Result<(), EnvironmentError> {
		let action = self
			.inner
			.registry
			.request_delete(id, None)
			.await
			.ok_or_else(|| not_found(id))?;
		self.follow_up_delete(id, action);
		Ok(())
	}

	fn follow_up_delete(&self, id: &EnvironmentId, action: DeleteAction) {
		match action {
			DeleteAction::Noop => {
				tracing::debug!(env_id = %id, "Environment already deleting");
			}
			DeleteAction::NotExpired => {
				tracing::debug!(env_id = %id, "Environment no longer expired, skipping");
			}
			DeleteAction::Deferred => {
				tracing::info!(env_id = %id, "Delete requested during provisioning, teardown deferred");
			}
			DeleteAction::StartTeardown => {
				let inner = self.inner.clone();
				let id = id.clone();
				tokio::spawn(async move {
					teardown::run(&inner, &id).await;
				});
			}
		}
	}

	/// Push an environment's expiry forward by `hours`.
	///
	/// At most [`MAX_LIFETIME_HOURS`] may be added per call. Extending a
	/// `deleting` or `deleted` environment returns it unchanged.
	pub async fn extend(
		&self,
		id: &EnvironmentId,
		hours: u32,
	) -> Result<Environment, EnvironmentError> {
		if hours > MAX_LIFETIME_HOURS {
			return Err(EnvironmentError::InvalidExtension {
				hours,
				max_hours: MAX_LIFETIME_HOURS,
			});
		}
		let env = self
			.inner
			.registry
			.extend(id, hours)
			.await
			.ok_or_else(|| not_found(id))?;
		tracing::info!(env_id = %id, hours, expires_at = %env.expires_at, "Extended environment");
		Ok(env)
	}

	/// Extend by [`DEFAULT_EXTENSION_HOURS`].
	pub async fn extend_default(&self, id: &EnvironmentId) -> Result<Environment, EnvironmentError> {
		self.extend(id, DEFAULT_EXTENSION_HOURS).await
	}

	/// Delete every `ready` environment that has expired.
	pub async fn sweep_expired(&self) -> SweepResult {
		self.sweep_expired_at(Utc::now()).await
	}

	/// Sweep as if the current time were `now`.
	///
	/// Candidates are snapshotted under the read lock; each is re-checked
	/// under the write lock so an extension that lands in between wins.
	pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> SweepResult {
		let candidates = self.inner.registry.expired_ready(now).await;
		let mut deleted = Vec::new();

		for id in candidates {
			match self.inner.registry.request_delete(&id, Some(now)).await {
				Some(DeleteAction::StartTeardown) => {
					tracing::info!(env_id = %id, "Deleting expired environment");
					self.follow_up_delete(&id, DeleteAction::StartTeardown);
					deleted.push(id);
				}
				Some(action) => self.follow_up_delete(&id, action),
				None => tracing::debug!(env_id = %id, "Environment vanished during sweep"),
			}
		}

		let count = deleted.len() as u32;
		SweepResult { deleted, count }
	}

	pub fn sweep_interval(&self) -> std::time::Duration {
		self.inner.config.sweep_interval()
	}

	/// Teardown errors recorded so far, oldest first.
	pub async fn teardown_failures(&self) -> Vec<TeardownFailure> {
		self.inner.teardown_log.snapshot().await
	}

	pub async fn health(&self) -> EnvironmentsHealth {
		EnvironmentsHealth::evaluate(
			self.inner.schemas.is_some(),
			self.inner.registry.counts().await,
			self.inner.teardown_log.snapshot().await,
		)
	}
}

fn not_found(id: &EnvironmentId) -> EnvironmentError {
	EnvironmentError::NotFound { id: id.to_string() }
}

/// Build the initial `pending` record for a request.
///
/// Applies the request defaults: type `ephemeral`, owner `anonymous`, and
/// the type's TTL unless `ttl_hours` is greater than zero. TTLs are clamped
/// to [`MAX_LIFETIME_HOURS`].
pub fn draft_environment(
	id: EnvironmentId,
	req: &CreateEnvironmentRequest,
	config: &ManagerConfig,
	now: DateTime<Utc>,
) -> Environment {
	let env_type = req.env_type.unwrap_or_default();
	let requested_ttl = match req.ttl_hours {
		Some(hours) if hours > 0 => hours,
		_ => config.default_ttl_hours(env_type),
	};
	let ttl_hours = requested_ttl.min(MAX_LIFETIME_HOURS);
	if ttl_hours != requested_ttl {
		tracing::warn!(
			requested_hours = requested_ttl,
			ttl_hours,
			"Requested TTL exceeds maximum, clamped"
		);
	}
	let owner = req
		.owner
		.as_deref()
		.map(str::trim)
		.filter(|o| !o.is_empty())
		.unwrap_or(ANONYMOUS_OWNER)
		.to_string();
	let handles = naming::derive(
		&id,
		req.name.as_deref(),
		&config.namespace,
		&config.base_domain,
	);

	Environment {
		id,
		name: handles.name,
		env_type,
		status: EnvironmentStatus::Pending,
		owner,
		branch: non_empty(req.branch.as_deref()),
		commit: non_empty(req.commit.as_deref()),
		namespace: config.namespace.clone(),
		database_schema: handles.database_schema,
		cache_prefix: handles.cache_prefix,
		topic_prefix: handles.topic_prefix,
		internal_url: handles.internal_url,
		url: handles.url,
		created_at: now,
		expires_at: now
			.checked_add_signed(Duration::hours(i64::from(ttl_hours)))
			.unwrap_or(DateTime::<Utc>::MAX_UTC),
		deleted_at: None,
		error: None,
	}
}

fn non_empty(value: Option<&str>) -> Option<String> {
	value
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
}
