// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health reporting, including teardown errors that never surface as status.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::store::StatusCounts;
use crate::types::EnvironmentId;

/// Oldest entries are dropped past this many recorded failures.
const MAX_TEARDOWN_FAILURES: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Degraded,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStep {
	ReleaseManifest,
	DropSchema,
}

impl std::fmt::Display for TeardownStep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TeardownStep::ReleaseManifest => f.write_str("release_manifest"),
			TeardownStep::DropSchema => f.write_str("drop_schema"),
		}
	}
}

/// A teardown step that failed. The environment was still marked deleted.
#[derive(Debug, Clone, Serialize)]
pub struct TeardownFailure {
	pub env_id: EnvironmentId,
	pub step: TeardownStep,
	pub message: String,
	pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentsHealth {
	pub status: HealthState,
	pub database_configured: bool,
	pub environments: StatusCounts,
	pub teardown_failures: Vec<TeardownFailure>,
}

impl EnvironmentsHealth {
	pub(crate) fn evaluate(
		database_configured: bool,
		environments: StatusCounts,
		teardown_failures: Vec<TeardownFailure>,
	) -> Self {
		let status = if database_configured && teardown_failures.is_empty() {
			HealthState::Healthy
		} else {
			HealthState::Degraded
		};
		Self {
			status,
			database_configured,
			environments,
			teardown_failures,
		}
	}
}

/// Bounded log of teardown failures.
#[derive(Default)]
pub(crate) struct TeardownLog {
	failures: Mutex<VecDeque<TeardownFailure>>,
}

impl TeardownLog {
	pub async fn record(&self, failure: TeardownFailure) {
		let mut failures = self.failures.lock().await;
		if failures.len() == MAX_TEARDOWN_FAILURES {
			failures.pop_front();
		}
		failures.push_back(failure);
	}

	pub async fn snapshot(&self) -> Vec<TeardownFailure> {
		self.failures.lock().await.iter().cloned().collect()
	}
}
