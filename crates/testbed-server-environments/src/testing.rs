// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles for the manager's collaborators.
//!
//! Built for this crate's tests and behind the `testing` feature.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::apply::ManifestApplier;
use crate::config::ManagerConfig;
use crate::error::{ManifestError, ProbeError};
use crate::manager::{draft_environment, EnvironmentManager};
use crate::readiness::ReadinessProbe;
use crate::types::{
	CreateEnvironmentRequest, Environment, EnvironmentId, EnvironmentStatus,
};

/// A `creating` environment with the default configuration's handles.
///
/// Panics if `id` is not eight lowercase hex characters.
pub fn sample_environment(id: &str) -> Environment {
	let id: EnvironmentId = id.parse().expect("sample environment ID must be valid");
	let req = CreateEnvironmentRequest {
		name: Some("Feature Login".to_string()),
		owner: Some("alice".to_string()),
		branch: Some("feature/login".to_string()),
		..Default::default()
	};
	let mut env = draft_environment(id, &req, &ManagerConfig::default(), Utc::now());
	env.status = EnvironmentStatus::Creating;
	env
}

/// Poll `manager` until `id` reaches `status`.
///
/// Returns `None` if it does not get there within `timeout`.
pub async fn wait_for_status(
	manager: &EnvironmentManager,
	id: &EnvironmentId,
	status: EnvironmentStatus,
	timeout: Duration,
) -> Option<Environment> {
	let start = tokio::time::Instant::now();
	loop {
		if let Ok(env) = manager.get(id).await {
			if env.status == status {
				return Some(env);
			}
		}
		if start.elapsed() > timeout {
			return None;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}

enum Script {
	ReadyAfter(u32),
	Never,
	Fail(String),
}

/// Probe with a fixed answer sequence.
pub struct ScriptedProbe {
	script: Script,
	checks: AtomicU32,
}

impl ScriptedProbe {
	/// Not ready for the first `checks - 1` calls, ready from then on.
	pub fn ready_after(checks: u32) -> Self {
		Self::with(Script::ReadyAfter(checks.max(1)))
	}

	pub fn never_ready() -> Self {
		Self::with(Script::Never)
	}

	/// Every check returns an error.
	pub fn failing(message: &str) -> Self {
		Self::with(Script::Fail(message.to_string()))
	}

	fn with(script: Script) -> Self {
		Self {
			script,
			checks: AtomicU32::new(0),
		}
	}

	pub fn checks(&self) -> u32 {
		self.checks.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ReadinessProbe for ScriptedProbe {
	async fn check(&self, _env: &Environment) -> Result<bool, ProbeError> {
		let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
		match &self.script {
			Script::ReadyAfter(after) => Ok(n >= *after),
			Script::Never => Ok(false),
			Script::Fail(message) => Err(ProbeError::Check(message.clone())),
		}
	}
}

/// Probe that blocks every check until [`GatedProbe::open`] is called.
pub struct GatedProbe {
	gate: watch::Sender<bool>,
	waiting: AtomicU32,
}

impl GatedProbe {
	pub fn new() -> Self {
		let (gate, _) = watch::channel(false);
		Self {
			gate,
			waiting: AtomicU32::new(0),
		}
	}

	/// Let every pending and future check report ready.
	pub fn open(&self) {
		self.gate.send_replace(true);
	}

	/// Checks that have started, whether or not they have returned.
	pub fn waiting(&self) -> u32 {
		self.waiting.load(Ordering::SeqCst)
	}
}

impl Default for GatedProbe {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ReadinessProbe for GatedProbe {
	async fn check(&self, _env: &Environment) -> Result<bool, ProbeError> {
		self.waiting.fetch_add(1, Ordering::SeqCst);
		let mut rx = self.gate.subscribe();
		if rx.wait_for(|open| *open).await.is_err() {
			return Err(ProbeError::Check("gate closed".to_string()));
		}
		Ok(true)
	}
}

/// Applier that records calls instead of touching anything.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct RecordingApplier {
	applied: Arc<Mutex<Vec<(EnvironmentId, String)>>>,
	released: Arc<Mutex<Vec<EnvironmentId>>>,
	fail_apply: Arc<AtomicBool>,
	fail_release: Arc<AtomicBool>,
}

impl RecordingApplier {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_apply(&self) {
		self.fail_apply.store(true, Ordering::SeqCst);
	}

	pub fn fail_release(&self) {
		self.fail_release.store(true, Ordering::SeqCst);
	}

	/// IDs applied so far, in call order.
	pub async fn applied(&self) -> Vec<EnvironmentId> {
		self.applied.lock().await.iter().map(|(id, _)| id.clone()).collect()
	}

	pub async fn manifest_for(&self, id: &EnvironmentId) -> Option<String> {
		self
			.applied
			.lock()
			.await
			.iter()
			.find(|(applied, _)| applied == id)
			.map(|(_, manifest)| manifest.clone())
	}

	pub async fn released(&self) -> Vec<EnvironmentId> {
		self.released.lock().await.clone()
	}
}

#[async_trait]
impl ManifestApplier for RecordingApplier {
	async fn apply(&self, env: &Environment, manifest: &str) -> Result<(), ManifestError> {
		if self.fail_apply.load(Ordering::SeqCst) {
			return Err(ManifestError::Rejected("apply disabled".to_string()));
		}
		self
			.applied
			.lock()
			.await
			.push((env.id.clone(), manifest.to_string()));
		Ok(())
	}

	async fn release(&self, env: &Environment) -> Result<(), ManifestError> {
		if self.fail_release.load(Ordering::SeqCst) {
			return Err(ManifestError::Rejected("release disabled".to_string()));
		}
		self.released.lock().await.push(env.id.clone());
		Ok(())
	}
}
