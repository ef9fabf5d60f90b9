// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory registry of environment records.
//!
//! Records are never removed, so the key set doubles as the set of every ID
//! issued by this process. All mutation goes through the methods below;
//! nothing outside this module holds a reference into the map, and no
//! method awaits anything but the lock.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::types::{Environment, EnvironmentId, EnvironmentStatus, ListFilter};

struct EnvironmentRecord {
	env: Environment,
	/// A provisioning task is running for this record
	provisioning: bool,
}

/// What `delete` has to do after the registry accepted the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeleteAction {
	/// Already `deleting` or `deleted`
	Noop,
	/// Provisioning is in flight and will run teardown when it finishes
	Deferred,
	/// Caller must start teardown now
	StartTeardown,
	/// The expiry condition no longer holds (extended or no longer ready)
	NotExpired,
}

/// Result of committing a provisioning outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommitOutcome {
	Ready,
	Failed(String),
	/// A delete arrived during provisioning; caller must run teardown
	TeardownRequested,
	/// Record missing or not in `creating`
	Ignored,
}

/// Number of environments in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
	pub pending: usize,
	pub creating: usize,
	pub ready: usize,
	pub failed: usize,
	pub deleting: usize,
	pub deleted: usize,
}

/// Move `env` to `next` if the state machine allows it.
fn transition(env: &mut Environment, next: EnvironmentStatus) -> bool {
	if !env.status.can_transition_to(next) {
		tracing::warn!(
			env_id = %env.id,
			from = %env.status,
			to = %next,
			"Rejected invalid status transition"
		);
		return false;
	}
	if env.status == EnvironmentStatus::Failed {
		env.error = None;
	}
	env.status = next;
	true
}

#[derive(Default)]
pub(crate) struct Registry {
	records: RwLock<HashMap<EnvironmentId, EnvironmentRecord>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a new record under a fresh ID and move it to `creating`.
	///
	/// `build` receives the ID and returns the `pending` environment.
	pub async fn insert(&self, build: impl FnOnce(EnvironmentId) -> Environment) -> Environment {
		let mut records = self.records.write().await;

		let mut id = EnvironmentId::generate();
		while records.contains_key(&id) {
			tracing::debug!(env_id = %id, "Environment ID collision, regenerating");
			id = EnvironmentId::generate();
		}

		let mut env = build(id.clone());
		env.id = id.clone();
		env.status = EnvironmentStatus::Pending;
		transition(&mut env, EnvironmentStatus::Creating);

		let snapshot = env.clone();
		records.insert(
			id,
			EnvironmentRecord {
				env,
				provisioning: true,
			},
		);
		snapshot
	}

	pub async fn get(&self, id: &EnvironmentId) -> Option<Environment> {
		self.records.read().await.get(id).map(|r| r.env.clone())
	}

	/// Matching environments ordered by creation time.
	pub async fn list(&self, filter: &ListFilter) -> Vec<Environment> {
		let mut envs: Vec<Environment> = self
			.records
			.read()
			.await
			.values()
			.filter(|r| filter.matches(&r.env))
			.map(|r| r.env.clone())
			.collect();
		envs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
		envs
	}

	pub async fn delete_requested(&self, id: &EnvironmentId) -> bool {
		self
			.records
			.read()
			.await
			.get(id)
			.map(|r| r.env.status.is_going_away())
			.unwrap_or(true)
	}

	/// Accept a delete for `id`, moving it to `deleting` when appropriate.
	///
	/// With `expired_at = Some(now)` the delete only proceeds for a `ready`
	/// environment whose expiry is still at or before `now`.
	pub async fn request_delete(
		&self,
		id: &EnvironmentId,
		expired_at: Option<DateTime<Utc>>,
	) -> Option<DeleteAction> {
		let mut records = self.records.write().await;
		let record = records.get_mut(id)?;

		if let Some(now) = expired_at {
			if record.env.status != EnvironmentStatus::Ready || !record.env.is_expired(now) {
				return Some(DeleteAction::NotExpired);
			}
		}

		let action = match record.env.status {
			EnvironmentStatus::Deleting | EnvironmentStatus::Deleted => DeleteAction::Noop,
			EnvironmentStatus::Pending | EnvironmentStatus::Creating if record.provisioning => {
				DeleteAction::Deferred
			}
			_ => DeleteAction::StartTeardown,
		};

		if action != DeleteAction::Noop {
			transition(&mut record.env, EnvironmentStatus::Deleting);
		}
		Some(action)
	}

	/// Record the end of a provisioning run.
	///
	/// A record already in `deleting` is left alone and the caller is told
	/// to tear it down; a late result never overwrites a delete.
	pub async fn commit_provisioning(
		&self,
		id: &EnvironmentId,
		outcome: Result<(), String>,
	) -> CommitOutcome {
		let mut records = self.records.write().await;
		let Some(record) = records.get_mut(id) else {
			return CommitOutcome::Ignored;
		};
		record.provisioning = false;

		match record.env.status {
			EnvironmentStatus::Deleting => CommitOutcome::TeardownRequested,
			EnvironmentStatus::Creating => match outcome {
				Ok(()) => {
					transition(&mut record.env, EnvironmentStatus::Ready);
					CommitOutcome::Ready
				}
				Err(message) => {
					transition(&mut record.env, EnvironmentStatus::Failed);
					record.env.error = Some(message.clone());
					CommitOutcome::Failed(message)
				}
			},
			_ => CommitOutcome::Ignored,
		}
	}

	/// Push `expires_at` forward by `hours`.
	///
	/// Zero hours changes nothing, and neither does extending a record that
	/// is `deleting` or `deleted`. An expiry that would overflow the
	/// calendar is left as it is.
	pub async fn extend(&self, id: &EnvironmentId, hours: u32) -> Option<Environment> {
		let mut records = self.records.write().await;
		let record = records.get_mut(id)?;
		if hours == 0 || record.env.status.is_going_away() {
			return Some(record.env.clone());
		}

		match record
			.env
			.expires_at
			.checked_add_signed(Duration::hours(i64::from(hours)))
		{
			Some(expires_at) => record.env.expires_at = expires_at,
			None => tracing::warn!(env_id = %id, hours, "Extension overflows expiry, ignored"),
		}
		Some(record.env.clone())
	}

	/// Complete teardown: `deleting -> deleted` with `deleted_at = at`.
	pub async fn mark_deleted(&self, id: &EnvironmentId, at: DateTime<Utc>) -> Option<Environment> {
		let mut records = self.records.write().await;
		let record = records.get_mut(id)?;
		if transition(&mut record.env, EnvironmentStatus::Deleted) {
			record.env.deleted_at = Some(at);
		}
		Some(record.env.clone())
	}

	/// IDs of `ready` environments whose expiry is at or before `now`.
	pub async fn expired_ready(&self, now: DateTime<Utc>) -> Vec<EnvironmentId> {
		let records = self.records.read().await;
		let mut expired: Vec<(DateTime<Utc>, EnvironmentId)> = records
			.values()
			.filter(|r| r.env.status == EnvironmentStatus::Ready && r.env.is_expired(now))
			.map(|r| (r.env.expires_at, r.env.id.clone()))
			.collect();
		expired.sort();
		expired.into_iter().map(|(_, id)| id).collect()
	}

	pub async fn counts(&self) -> StatusCounts {
		let records = self.records.read().await;
		let mut counts = StatusCounts::default();
		for record in records.values() {
			match record.env.status {
				EnvironmentStatus::Pending => counts.pending += 1,
				EnvironmentStatus::Creating => counts.creating += 1,
				EnvironmentStatus::Ready => counts.ready += 1,
				EnvironmentStatus::Failed => counts.failed += 1,
				EnvironmentStatus::Deleting => counts.deleting += 1,
				EnvironmentStatus::Deleted => counts.deleted += 1,
			}
		}
		counts
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::sample_environment;

	async fn insert_sample(registry: &Registry) -> Environment {
		registry
			.insert(|id| sample_environment(id.as_str()))
			.await
	}

	#[tokio::test]
	async fn insert_starts_creating_with_unique_ids() {
		let registry = Registry::new();
		let mut ids = std::collections::HashSet::new();
		for _ in 0..200 {
			let env = insert_sample(&registry).await;
			assert_eq!(env.status, EnvironmentStatus::Creating);
			assert!(ids.insert(env.id));
		}
	}

	#[tokio::test]
	async fn commit_success_and_failure() {
		let registry = Registry::new();
		let ok = insert_sample(&registry).await;
		let bad = insert_sample(&registry).await;

		assert_eq!(
			registry.commit_provisioning(&ok.id, Ok(())).await,
			CommitOutcome::Ready
		);
		assert_eq!(
			registry
				.commit_provisioning(&bad.id, Err("boom".to_string()))
				.await,
			CommitOutcome::Failed("boom".to_string())
		);

		let bad = registry.get(&bad.id).await.unwrap();
		assert_eq!(bad.status, EnvironmentStatus::Failed);
		assert_eq!(bad.error.as_deref(), Some("boom"));
	}

	#[tokio::test]
	async fn delete_during_provisioning_is_deferred() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;

		assert_eq!(
			registry.request_delete(&env.id, None).await,
			Some(DeleteAction::Deferred)
		);
		assert!(registry.delete_requested(&env.id).await);
		assert_eq!(
			registry.commit_provisioning(&env.id, Ok(())).await,
			CommitOutcome::TeardownRequested
		);
		assert_eq!(
			registry.get(&env.id).await.unwrap().status,
			EnvironmentStatus::Deleting
		);
	}

	#[tokio::test]
	async fn delete_is_idempotent() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;
		registry.commit_provisioning(&env.id, Ok(())).await;

		assert_eq!(
			registry.request_delete(&env.id, None).await,
			Some(DeleteAction::StartTeardown)
		);
		assert_eq!(
			registry.request_delete(&env.id, None).await,
			Some(DeleteAction::Noop)
		);

		let deleted = registry.mark_deleted(&env.id, Utc::now()).await.unwrap();
		assert_eq!(deleted.status, EnvironmentStatus::Deleted);
		assert!(deleted.deleted_at.is_some());
		assert_eq!(
			registry.request_delete(&env.id, None).await,
			Some(DeleteAction::Noop)
		);
	}

	#[tokio::test]
	async fn unknown_id_is_none() {
		let registry = Registry::new();
		let id: EnvironmentId = "ffffffff".parse().unwrap();
		assert!(registry.get(&id).await.is_none());
		assert!(registry.request_delete(&id, None).await.is_none());
		assert!(registry.extend(&id, 1).await.is_none());
	}

	#[tokio::test]
	async fn failed_error_cleared_when_deleting() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;
		registry
			.commit_provisioning(&env.id, Err("no schema".to_string()))
			.await;
		registry.request_delete(&env.id, None).await;

		let env = registry.get(&env.id).await.unwrap();
		assert_eq!(env.status, EnvironmentStatus::Deleting);
		assert!(env.error.is_none());
	}

	#[tokio::test]
	async fn conditional_delete_respects_extension() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;
		registry.commit_provisioning(&env.id, Ok(())).await;

		let sweep_time = env.expires_at;
		registry.extend(&env.id, 1).await;
		assert_eq!(
			registry.request_delete(&env.id, Some(sweep_time)).await,
			Some(DeleteAction::NotExpired)
		);
		assert_eq!(
			registry.get(&env.id).await.unwrap().status,
			EnvironmentStatus::Ready
		);
	}

	#[tokio::test]
	async fn expired_ready_skips_other_states() {
		let registry = Registry::new();
		let ready = insert_sample(&registry).await;
		let creating = insert_sample(&registry).await;
		registry.commit_provisioning(&ready.id, Ok(())).await;

		let later = ready.expires_at.max(creating.expires_at) + Duration::seconds(1);
		assert_eq!(registry.expired_ready(later).await, vec![ready.id]);
	}

	#[tokio::test]
	async fn extend_zero_is_noop() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;
		let same = registry.extend(&env.id, 0).await.unwrap();
		assert_eq!(same.expires_at, env.expires_at);

		let later = registry.extend(&env.id, 3).await.unwrap();
		assert_eq!(later.expires_at, env.expires_at + Duration::hours(3));
	}

	#[tokio::test]
	async fn extend_leaves_deleting_and_deleted_alone() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;
		registry.commit_provisioning(&env.id, Ok(())).await;
		registry.request_delete(&env.id, None).await;

		let deleting = registry.extend(&env.id, 4).await.unwrap();
		assert_eq!(deleting.status, EnvironmentStatus::Deleting);
		assert_eq!(deleting.expires_at, env.expires_at);

		registry.mark_deleted(&env.id, Utc::now()).await;
		let deleted = registry.extend(&env.id, 4).await.unwrap();
		assert_eq!(deleted.expires_at, env.expires_at);
	}

	#[tokio::test]
	async fn extend_past_calendar_end_does_not_panic() {
		let registry = Registry::new();
		let env = insert_sample(&registry).await;

		let same = registry.extend(&env.id, u32::MAX).await.unwrap();
		assert!(same.expires_at >= env.expires_at);

		// Lock is still usable afterwards.
		assert!(registry.get(&env.id).await.is_some());
	}
}
