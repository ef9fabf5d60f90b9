// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory schema store for tests that exercise provisioning without a
//! SQL server.
//!
//! Built for this crate's tests and behind the `testing` feature.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{DbError, Result};
use crate::schema::{validate_schema_name, SchemaStore};

/// Records created schemas and can be told to fail.
///
/// Clones share state, so a test can keep a handle while the manager owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
	schemas: Arc<Mutex<HashSet<String>>>,
	dropped: Arc<Mutex<Vec<String>>>,
	create_failures_remaining: Arc<AtomicU32>,
	fail_drops: Arc<AtomicBool>,
	create_calls: Arc<AtomicU32>,
}

impl InMemorySchemaStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make the next `count` calls to `create_schema` fail.
	pub fn fail_next_creates(&self, count: u32) {
		self.create_failures_remaining.store(count, Ordering::SeqCst);
	}

	/// Make every `drop_schema` call fail.
	pub fn fail_drops(&self) {
		self.fail_drops.store(true, Ordering::SeqCst);
	}

	pub async fn exists(&self, name: &str) -> bool {
		self.schemas.lock().await.contains(name)
	}

	/// Schemas dropped so far, in call order.
	pub async fn dropped(&self) -> Vec<String> {
		self.dropped.lock().await.clone()
	}

	pub fn create_calls(&self) -> u32 {
		self.create_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
	async fn create_schema(&self, name: &str) -> Result<()> {
		validate_schema_name(name)?;
		self.create_calls.fetch_add(1, Ordering::SeqCst);

		let failing = self
			.create_failures_remaining
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok();
		if failing {
			return Err(DbError::Internal(format!(
				"injected failure creating {name}"
			)));
		}

		self.schemas.lock().await.insert(name.to_string());
		Ok(())
	}

	async fn drop_schema(&self, name: &str) -> Result<()> {
		validate_schema_name(name)?;
		if self.fail_drops.load(Ordering::SeqCst) {
			return Err(DbError::Internal(format!("injected failure dropping {name}")));
		}

		self.schemas.lock().await.remove(name);
		self.dropped.lock().await.push(name.to_string());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn create_then_drop() {
		let store = InMemorySchemaStore::new();
		store.create_schema("texecom_env_01").await.unwrap();
		assert!(store.exists("texecom_env_01").await);

		store.drop_schema("texecom_env_01").await.unwrap();
		assert!(!store.exists("texecom_env_01").await);
		assert_eq!(store.dropped().await, vec!["texecom_env_01".to_string()]);
	}

	#[tokio::test]
	async fn injected_create_failures_are_consumed() {
		let store = InMemorySchemaStore::new();
		store.fail_next_creates(2);

		assert!(store.create_schema("texecom_env_02").await.is_err());
		assert!(store.create_schema("texecom_env_02").await.is_err());
		assert!(store.create_schema("texecom_env_02").await.is_ok());
		assert_eq!(store.create_calls(), 3);
	}

	#[tokio::test]
	async fn drop_missing_schema_succeeds() {
		let store = InMemorySchemaStore::new();
		assert!(store.drop_schema("texecom_env_03").await.is_ok());
	}
}
