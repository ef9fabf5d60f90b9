// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ephemeral environment lifecycle management.
//!
//! An environment is an isolated copy of the application stack: its own
//! database schema, cache key prefix, message-bus topic prefix and a
//! workload reachable at `https://<name>.<base_domain>`. The
//! [`EnvironmentManager`] provisions environments in the background,
//! tracks their status, and tears them down on request or once their TTL
//! expires.
//!
//! # Example
//!
//! ```ignore
//! let manager = EnvironmentManager::new(config, backends);
//! let env = manager.create(CreateEnvironmentRequest::default()).await;
//! tokio::spawn(run_sweeper(manager.clone(), shutdown_rx));
//! ```

pub mod apply;
pub mod config;
pub mod error;
pub mod health;
pub mod manager;
pub mod manifest;
pub mod naming;
mod provision;
pub mod readiness;
mod store;
pub mod sweeper;
mod teardown;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use apply::{FileManifestApplier, ManifestApplier};
pub use config::{ManagerConfig, WorkloadConfig};
pub use error::{EnvironmentError, ManifestError, ProbeError, ProvisionError};
pub use health::{EnvironmentsHealth, HealthState, TeardownFailure, TeardownStep};
pub use manager::{draft_environment, Backends, EnvironmentManager};
pub use naming::IsolationHandles;
pub use provision::calculate_backoff_delay;
pub use readiness::{wait_until_ready, DelayProbe, HttpProbe, ReadinessProbe};
pub use store::StatusCounts;
pub use sweeper::run_sweeper;
pub use types::{
	CreateEnvironmentRequest, Environment, EnvironmentId, EnvironmentStatus, EnvironmentType,
	ListFilter, ParseEnvironmentIdError, SweepResult, ANONYMOUS_OWNER, DEFAULT_EXTENSION_HOURS,
	MAX_LIFETIME_HOURS,
};
