// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-environment schema creation and removal.

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;

use crate::error::{DbError, Result};

/// MySQL's identifier length limit.
const MAX_SCHEMA_NAME_LENGTH: usize = 64;

/// Creates and drops the isolated schema backing one environment.
///
/// Both operations are idempotent: creating an existing schema and
/// dropping a missing one succeed.
#[async_trait]
pub trait SchemaStore: Send + Sync {
	async fn create_schema(&self, name: &str) -> Result<()>;
	async fn drop_schema(&self, name: &str) -> Result<()>;
}

/// Check that `name` is safe to interpolate as a quoted identifier.
///
/// Only lowercase ASCII letters, digits and underscores are accepted.
pub fn validate_schema_name(name: &str) -> Result<()> {
	if name.is_empty() || name.len() > MAX_SCHEMA_NAME_LENGTH {
		return Err(DbError::InvalidIdentifier(name.to_string()));
	}
	if !name
		.chars()
		.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
	{
		return Err(DbError::InvalidIdentifier(name.to_string()));
	}
	Ok(())
}

fn create_statement(name: &str) -> String {
	format!("CREATE DATABASE IF NOT EXISTS `{name}`")
}

fn drop_statement(name: &str) -> String {
	format!("DROP DATABASE IF EXISTS `{name}`")
}

/// Schema store backed by the shared MySQL server.
#[derive(Debug, Clone)]
pub struct MySqlSchemaStore {
	pool: MySqlPool,
}

impl MySqlSchemaStore {
	pub fn new(pool: MySqlPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl SchemaStore for MySqlSchemaStore {
	#[tracing::instrument(skip(self))]
	async fn create_schema(&self, name: &str) -> Result<()> {
		validate_schema_name(name)?;
		sqlx::query(&create_statement(name))
			.execute(&self.pool)
			.await?;
		tracing::info!(schema = %name, "created schema");
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	async fn drop_schema(&self, name: &str) -> Result<()> {
		validate_schema_name(name)?;
		sqlx::query(&drop_statement(name))
			.execute(&self.pool)
			.await?;
		tracing::info!(schema = %name, "dropped schema");
		Ok(())
	}
}
