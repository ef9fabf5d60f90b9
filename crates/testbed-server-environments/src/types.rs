// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment lifecycle types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of an environment ID in hex characters.
pub const ENVIRONMENT_ID_LEN: usize = 8;

/// Hours added by an extension request that does not name an amount.
pub const DEFAULT_EXTENSION_HOURS: u32 = 4;

/// Longest TTL a request may ask for and the most one extension may add:
/// one year. Larger TTLs are clamped; larger extensions are rejected.
pub const MAX_LIFETIME_HOURS: u32 = 24 * 365;

/// Owner recorded when a request leaves it blank.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Short random identifier for an environment: 4 random bytes, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentId(String);

impl EnvironmentId {
	/// Generate a fresh random ID. Uniqueness is enforced by the registry.
	pub fn generate() -> Self {
		let bytes: [u8; 4] = rand::random();
		Self(hex::encode(bytes))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for EnvironmentId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid environment id '{0}': expected 8 lowercase hex characters")]
pub struct ParseEnvironmentIdError(String);

impl std::str::FromStr for EnvironmentId {
	type Err = ParseEnvironmentIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let valid = s.len() == ENVIRONMENT_ID_LEN
			&& s
				.chars()
				.all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
		if valid {
			Ok(Self(s.to_string()))
		} else {
			Err(ParseEnvironmentIdError(s.to_string()))
		}
	}
}

/// Kind of environment, which decides the default lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
	/// Short-lived, for a branch or a test run
	#[default]
	Ephemeral,
	/// Long-lived, for manual exploration
	Sandbox,
}

impl std::fmt::Display for EnvironmentType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EnvironmentType::Ephemeral => f.write_str("ephemeral"),
			EnvironmentType::Sandbox => f.write_str("sandbox"),
		}
	}
}

impl std::str::FromStr for EnvironmentType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"ephemeral" => Ok(EnvironmentType::Ephemeral),
			"sandbox" => Ok(EnvironmentType::Sandbox),
			other => Err(format!("unknown environment type '{other}'")),
		}
	}
}

/// Lifecycle status of an environment.
///
/// `pending -> creating -> {ready | failed}`, then `ready | failed ->
/// deleting -> deleted`. A delete during provisioning moves `creating`
/// straight to `deleting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
	Pending,
	Creating,
	Ready,
	Failed,
	Deleting,
	Deleted,
}

impl EnvironmentStatus {
	/// Whether the state machine allows moving from `self` to `next`.
	pub fn can_transition_to(self, next: EnvironmentStatus) -> bool {
		use EnvironmentStatus::*;
		matches!(
			(self, next),
			(Pending, Creating)
				| (Pending, Deleting)
				| (Creating, Ready)
				| (Creating, Failed)
				| (Creating, Deleting)
				| (Ready, Deleting)
				| (Failed, Deleting)
				| (Deleting, Deleted)
		)
	}

	pub fn is_terminal(self) -> bool {
		self == EnvironmentStatus::Deleted
	}

	/// True once a delete has been accepted.
	pub fn is_going_away(self) -> bool {
		matches!(self, EnvironmentStatus::Deleting | EnvironmentStatus::Deleted)
	}
}

impl std::fmt::Display for EnvironmentStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			EnvironmentStatus::Pending => "pending",
			EnvironmentStatus::Creating => "creating",
			EnvironmentStatus::Ready => "ready",
			EnvironmentStatus::Failed => "failed",
			EnvironmentStatus::Deleting => "deleting",
			EnvironmentStatus::Deleted => "deleted",
		};
		f.write_str(s)
	}
}

impl std::str::FromStr for EnvironmentStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pending" => Ok(EnvironmentStatus::Pending),
			"creating" => Ok(EnvironmentStatus::Creating),
			"ready" => Ok(EnvironmentStatus::Ready),
			"failed" => Ok(EnvironmentStatus::Failed),
			"deleting" => Ok(EnvironmentStatus::Deleting),
			"deleted" => Ok(EnvironmentStatus::Deleted),
			other => Err(format!("unknown environment status '{other}'")),
		}
	}
}

/// An environment and its current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
	pub id: EnvironmentId,
	pub name: String,
	#[serde(rename = "type")]
	pub env_type: EnvironmentType,
	pub status: EnvironmentStatus,
	pub owner: String,
	pub branch: Option<String>,
	pub commit: Option<String>,
	pub namespace: String,
	pub database_schema: String,
	pub cache_prefix: String,
	pub topic_prefix: String,
	/// Cluster-internal address of the workload service
	pub internal_url: String,
	/// Public address routed through the ingress
	pub url: String,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
	/// Set only while `status == Failed`
	pub error: Option<String>,
}

impl Environment {
	/// Time left before expiry, clamped at zero.
	pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
		let remaining = self.expires_at - now;
		if remaining < Duration::zero() {
			Duration::zero()
		} else {
			remaining
		}
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at <= now
	}

	/// Human-readable time left: `"3h 12m"`, `"45m"` or `"Expired"`.
	pub fn format_time_remaining(&self, now: DateTime<Utc>) -> String {
		if self.is_expired(now) {
			return "Expired".to_string();
		}
		format_remaining(self.time_remaining(now))
	}
}

fn format_remaining(remaining: Duration) -> String {
	let hours = remaining.num_hours();
	let minutes = remaining.num_minutes() % 60;
	if hours > 0 {
		format!("{hours}h {minutes}m")
	} else {
		format!("{minutes}m")
	}
}

/// Request to create a new environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEnvironmentRequest {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub owner: Option<String>,
	#[serde(default, rename = "type")]
	pub env_type: Option<EnvironmentType>,
	#[serde(default)]
	pub branch: Option<String>,
	#[serde(default)]
	pub commit: Option<String>,
	/// Overrides the type's default lifetime when greater than zero
	#[serde(default)]
	pub ttl_hours: Option<u32>,
}

/// Filter for listing environments. All set fields must match.
///
/// Deleted environments are only listed when `status` is
/// `Some(EnvironmentStatus::Deleted)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
	#[serde(default)]
	pub owner: Option<String>,
	#[serde(default)]
	pub status: Option<EnvironmentStatus>,
	#[serde(default, rename = "type")]
	pub env_type: Option<EnvironmentType>,
}

impl ListFilter {
	pub fn for_owner(owner: impl Into<String>) -> Self {
		Self {
			owner: Some(owner.into()),
			..Default::default()
		}
	}

	pub fn matches(&self, env: &Environment) -> bool {
		if env.status == EnvironmentStatus::Deleted
			&& self.status != Some(EnvironmentStatus::Deleted)
		{
			return false;
		}
		if let Some(owner) = &self.owner {
			if &env.owner != owner {
				return false;
			}
		}
		if let Some(status) = self.status {
			if env.status != status {
				return false;
			}
		}
		if let Some(env_type) = self.env_type {
			if env.env_type != env_type {
				return false;
			}
		}
		true
	}
}

/// Result of one expiry sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
	/// IDs of environments whose deletion was started
	pub deleted: Vec<EnvironmentId>,
	pub count: u32,
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn sample(status: EnvironmentStatus) -> Environment {
		let now = Utc::now();
		Environment {
			id: "0a1b2c3d".parse().unwrap(),
			name: "feature-x".to_string(),
			env_type: EnvironmentType::Ephemeral,
			status,
			owner: "alice".to_string(),
			branch: None,
			commit: None,
			namespace: "texecom-envs".to_string(),
			database_schema: "texecom_env_0a1b2c3d".to_string(),
			cache_prefix: "env:0a1b2c3d:".to_string(),
			topic_prefix: "env/0a1b2c3d/".to_string(),
			internal_url: String::new(),
			url: String::new(),
			created_at: now,
			expires_at: now + Duration::hours(8),
			deleted_at: None,
			error: None,
		}
	}

	#[test]
	fn generated_ids_parse_back() {
		let id = EnvironmentId::generate();
		assert_eq!(id.as_str().len(), ENVIRONMENT_ID_LEN);
		assert_eq!(id.as_str().parse::<EnvironmentId>().unwrap(), id);
	}

	#[test]
	fn rejects_malformed_ids() {
		assert!("0A1B2C3D".parse::<EnvironmentId>().is_err());
		assert!("0a1b2c".parse::<EnvironmentId>().is_err());
		assert!("0a1b2c3g".parse::<EnvironmentId>().is_err());
	}

	#[test]
	fn state_machine_edges() {
		use EnvironmentStatus::*;
		assert!(Pending.can_transition_to(Creating));
		assert!(Creating.can_transition_to(Ready));
		assert!(Creating.can_transition_to(Deleting));
		assert!(Failed.can_transition_to(Deleting));
		assert!(Deleting.can_transition_to(Deleted));

		assert!(!Ready.can_transition_to(Creating));
		assert!(!Ready.can_transition_to(Failed));
		assert!(!Deleting.can_transition_to(Ready));
		assert!(!Deleted.can_transition_to(Deleting));
		assert!(Deleted.is_terminal());
	}

	#[test]
	fn deleted_is_terminal_for_every_target() {
		use EnvironmentStatus::*;
		for next in [Pending, Creating, Ready, Failed, Deleting, Deleted] {
			assert!(!Deleted.can_transition_to(next));
		}
	}

	#[test]
	fn status_round_trips_through_display() {
		use EnvironmentStatus::*;
		for status in [Pending, Creating, Ready, Failed, Deleting, Deleted] {
			assert_eq!(status.to_string().parse::<EnvironmentStatus>(), Ok(status));
		}
	}

	#[test]
	fn filter_hides_deleted_unless_asked() {
		let deleted = sample(EnvironmentStatus::Deleted);
		assert!(!ListFilter::default().matches(&deleted));
		assert!(!ListFilter::for_owner("alice").matches(&deleted));

		let only_deleted = ListFilter {
			status: Some(EnvironmentStatus::Deleted),
			..Default::default()
		};
		assert!(only_deleted.matches(&deleted));
	}

	#[test]
	fn filter_fields_are_anded() {
		let env = sample(EnvironmentStatus::Ready);
		let filter = ListFilter {
			owner: Some("alice".to_string()),
			status: Some(EnvironmentStatus::Ready),
			env_type: Some(EnvironmentType::Sandbox),
		};
		assert!(!filter.matches(&env));

		let filter = ListFilter {
			env_type: Some(EnvironmentType::Ephemeral),
			..filter
		};
		assert!(filter.matches(&env));
	}

	#[test]
	fn time_remaining_formats() {
		let env = sample(EnvironmentStatus::Ready);
		let now = env.expires_at - Duration::minutes(3 * 60 + 12);
		assert_eq!(env.format_time_remaining(now), "3h 12m");

		let now = env.expires_at - Duration::minutes(45);
		assert_eq!(env.format_time_remaining(now), "45m");

		let now = env.expires_at + Duration::seconds(1);
		assert_eq!(env.format_time_remaining(now), "Expired");
		assert_eq!(env.time_remaining(now), Duration::zero());
	}

	#[test]
	fn request_defaults_from_empty_json() {
		let req: CreateEnvironmentRequest = serde_json::from_str("{}").unwrap();
		assert!(req.name.is_none());
		assert!(req.env_type.is_none());

		let req: CreateEnvironmentRequest =
			serde_json::from_str(r#"{"name":"demo","type":"sandbox","ttl_hours":2}"#).unwrap();
		assert_eq!(req.env_type, Some(EnvironmentType::Sandbox));
		assert_eq!(req.ttl_hours, Some(2));
	}

	proptest! {
		#[test]
		fn remaining_never_negative(offset_mins in -10_000i64..10_000) {
			let env = sample(EnvironmentStatus::Ready);
			let now = env.expires_at + Duration::minutes(offset_mins);
			prop_assert!(env.time_remaining(now) >= Duration::zero());
		}
	}
}
