// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment manager error types.

use std::path::PathBuf;

/// Errors returned by the manager's public operations.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
	/// No environment with this ID was ever created
	#[error("Environment not found: {id}")]
	NotFound { id: String },

	#[error("Invalid extension of {hours}h: at most {max_hours}h may be added at once")]
	InvalidExtension { hours: u32, max_hours: u32 },
}

/// Reasons a provisioning run ends in `failed`.
///
/// The `Display` text is what callers see in `Environment::error`.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
	#[error("schema creation failed after {attempts} attempt(s): {source}")]
	Schema {
		attempts: u32,
		#[source]
		source: testbed_server_db::DbError,
	},

	#[error("manifest hand-off failed: {0}")]
	Manifest(#[from] ManifestError),

	#[error("readiness check failed: {0}")]
	Probe(#[from] ProbeError),

	#[error("environment did not become ready within {timeout_secs}s")]
	ReadyTimeout { timeout_secs: u64 },

	#[error("provisioning timed out after {timeout_secs}s")]
	Timeout { timeout_secs: u64 },

	/// A delete arrived while provisioning was in flight
	#[error("provisioning cancelled by delete")]
	Cancelled,
}

/// Errors from handing a manifest to the apply mechanism.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
	#[error("failed to write manifest {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to remove manifest {path}: {source}")]
	Remove {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("manifest rejected: {0}")]
	Rejected(String),
}

/// Errors from a readiness probe that make further polling pointless.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
	#[error("failed to build HTTP client: {0}")]
	Client(#[from] reqwest::Error),

	#[error("invalid health URL {url}")]
	InvalidUrl { url: String },

	#[error("{0}")]
	Check(String),
}
