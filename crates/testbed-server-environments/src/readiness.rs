// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deciding when a freshly applied workload is ready.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ProbeError, ProvisionError};
use crate::types::Environment;

const HEALTH_PATH: &str = "/health";
const HTTP_PROBE_TIMEOUT_SECS: u64 = 5;

/// One readiness check against a workload.
///
/// `Ok(false)` means "not yet" and the caller polls again; an `Err` ends
/// provisioning.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
	async fn check(&self, env: &Environment) -> Result<bool, ProbeError>;
}

/// Waits a fixed delay, then reports ready.
#[derive(Debug, Clone)]
pub struct DelayProbe {
	delay: Duration,
}

impl DelayProbe {
	pub fn new(delay: Duration) -> Self {
		Self { delay }
	}
}

#[async_trait]
impl ReadinessProbe for DelayProbe {
	async fn check(&self, env: &Environment) -> Result<bool, ProbeError> {
		tracing::debug!(env_id = %env.id, delay_ms = self.delay.as_millis() as u64, "Waiting for workload");
		tokio::time::sleep(self.delay).await;
		Ok(true)
	}
}

/// Polls `<internal_url>/health`; any 2xx response means ready.
#[derive(Debug, Clone)]
pub struct HttpProbe {
	client: reqwest::Client,
}

impl HttpProbe {
	pub fn new() -> Result<Self, ProbeError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(HTTP_PROBE_TIMEOUT_SECS))
			.build()?;
		Ok(Self { client })
	}

	pub fn health_url(env: &Environment) -> String {
		format!("{}{HEALTH_PATH}", env.internal_url.trim_end_matches('/'))
	}
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
	async fn check(&self, env: &Environment) -> Result<bool, ProbeError> {
		let url = Self::health_url(env);
		let url = reqwest::Url::parse(&url).map_err(|_| ProbeError::InvalidUrl { url })?;

		match self.client.get(url).send().await {
			Ok(response) if response.status().is_success() => Ok(true),
			Ok(response) => {
				tracing::debug!(env_id = %env.id, status = %response.status(), "Workload not healthy yet");
				Ok(false)
			}
			Err(e) => {
				tracing::debug!(env_id = %env.id, error = %e, "Workload not reachable yet");
				Ok(false)
			}
		}
	}
}

/// Poll `probe` until it reports ready or `timeout` elapses.
///
/// The deadline also bounds each check, so a probe that hangs or answers
/// late still ends in [`ProvisionError::ReadyTimeout`].
pub async fn wait_until_ready(
	probe: &dyn ReadinessProbe,
	env: &Environment,
	poll_interval: Duration,
	timeout: Duration,
) -> Result<(), ProvisionError> {
	let start = tokio::time::Instant::now();
	let timed_out = || ProvisionError::ReadyTimeout {
		timeout_secs: timeout.as_secs(),
	};

	loop {
		let remaining = timeout.saturating_sub(start.elapsed());
		if remaining.is_zero() {
			return Err(timed_out());
		}

		match tokio::time::timeout(remaining, probe.check(env)).await {
			Ok(Ok(true)) => return Ok(()),
			Ok(Ok(false)) => {}
			Ok(Err(e)) => return Err(e.into()),
			Err(_) => {
				tracing::debug!(env_id = %env.id, "Readiness check still running at deadline");
				return Err(timed_out());
			}
		}

		tokio::time::sleep(poll_interval).await;
	}
}
