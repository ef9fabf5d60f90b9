// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hand-off of generated manifests to whatever applies them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ManifestError;
use crate::types::Environment;

/// Accepts generated manifests and makes them take effect (or not).
#[async_trait]
pub trait ManifestApplier: Send + Sync {
	/// Hand off the manifest for `env`.
	async fn apply(&self, env: &Environment, manifest: &str) -> Result<(), ManifestError>;

	/// Release whatever `apply` created. Releasing twice is not an error.
	async fn release(&self, env: &Environment) -> Result<(), ManifestError>;
}

/// Writes `env-<id>.yaml` into a directory and logs the command that would
/// apply it. Cluster access stays outside this process.
#[derive(Debug, Clone)]
pub struct FileManifestApplier {
	dir: PathBuf,
}

impl FileManifestApplier {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn manifest_path(&self, env: &Environment) -> PathBuf {
		self.dir.join(format!("env-{}.yaml", env.id))
	}
}

#[async_trait]
impl ManifestApplier for FileManifestApplier {
	async fn apply(&self, env: &Environment, manifest: &str) -> Result<(), ManifestError> {
		let path = self.manifest_path(env);

		tokio::fs::create_dir_all(&self.dir)
			.await
			.map_err(|e| ManifestError::Write {
				path: self.dir.clone(),
				source: e,
			})?;
		tokio::fs::write(&path, manifest)
			.await
			.map_err(|e| ManifestError::Write {
				path: path.clone(),
				source: e,
			})?;

		tracing::info!(
			env_id = %env.id,
			path = %path.display(),
			"Manifest written, apply with: kubectl apply -f {}",
			path.display()
		);
		Ok(())
	}

	async fn release(&self, env: &Environment) -> Result<(), ManifestError> {
		let path = self.manifest_path(env);

		match tokio::fs::remove_file(&path).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(env_id = %env.id, path = %path.display(), "Manifest already removed");
			}
			Err(e) => return Err(ManifestError::Remove { path, source: e }),
		}

		tracing::info!(
			env_id = %env.id,
			"Manifest released, remove with: kubectl delete deployment,service,ingress -n {} -l env-id={}",
			env.namespace,
			env.id
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::sample_environment;
	use tempfile::TempDir;

	#[tokio::test]
	async fn apply_writes_manifest_file() {
		let dir = TempDir::new().unwrap();
		let applier = FileManifestApplier::new(dir.path().join("manifests"));
		let env = sample_environment("0a1b2c3d");

		applier.apply(&env, "kind: Deployment\n").await.unwrap();

		let path = dir.path().join("manifests").join("env-0a1b2c3d.yaml");
		assert_eq!(applier.manifest_path(&env), path);
		assert_eq!(
			tokio::fs::read_to_string(&path).await.unwrap(),
			"kind: Deployment\n"
		);
	}

	#[tokio::test]
	async fn release_removes_file_and_tolerates_repeat() {
		let dir = TempDir::new().unwrap();
		let applier = FileManifestApplier::new(dir.path());
		let env = sample_environment("0a1b2c3d");

		applier.apply(&env, "---\n").await.unwrap();
		applier.release(&env).await.unwrap();
		assert!(!applier.manifest_path(&env).exists());

		applier.release(&env).await.unwrap();
	}

	#[tokio::test]
	async fn apply_into_unwritable_location_fails() {
		let dir = TempDir::new().unwrap();
		let blocker = dir.path().join("not-a-dir");
		std::fs::write(&blocker, "file").unwrap();

		let applier = FileManifestApplier::new(&blocker);
		let result = applier.apply(&sample_environment("0a1b2c3d"), "x").await;
		assert!(matches!(result, Err(ManifestError::Write { .. })));
	}
}
