// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background task that deletes expired environments.

use tokio::sync::broadcast;

use crate::manager::EnvironmentManager;

/// Sweep immediately, then every sweep interval until `shutdown` fires.
pub async fn run_sweeper(manager: EnvironmentManager, mut shutdown: broadcast::Receiver<()>) {
	let interval = manager.sweep_interval();
	tracing::info!(interval_secs = interval.as_secs(), "Starting expiry sweeper");

	run_sweep(&manager).await;

	loop {
		tokio::select! {
			_ = tokio::time::sleep(interval) => {
				run_sweep(&manager).await;
			}
			_ = shutdown.recv() => {
				tracing::info!("Shutting down expiry sweeper");
				break;
			}
		}
	}
}

async fn run_sweep(manager: &EnvironmentManager) {
	tracing::debug!("Running expiry sweep");

	let result = manager.sweep_expired().await;
	if result.count > 0 {
		tracing::info!(count = result.count, "Sweep completed, deleted expired environments");
	} else {
		tracing::debug!("Sweep completed, no expired environments found");
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use super::*;
	use crate::config::ManagerConfig;
	use crate::manager::Backends;
	use crate::testing::{RecordingApplier, ScriptedProbe};

	#[tokio::test]
	async fn sweeper_stops_on_shutdown() {
		let manager = EnvironmentManager::new(
			ManagerConfig::default(),
			Backends {
				schemas: None,
				applier: Arc::new(RecordingApplier::new()),
				probe: Arc::new(ScriptedProbe::ready_after(1)),
			},
		);
		let (tx, rx) = broadcast::channel(1);
		let handle = tokio::spawn(run_sweeper(manager, rx));

		tx.send(()).unwrap();
		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.expect("sweeper did not stop")
			.unwrap();
	}
}
