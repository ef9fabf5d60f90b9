// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Releasing an environment's resources.
//!
//! Every step is attempted even when an earlier one fails, and the record
//! always ends up `deleted`. Failures go to the teardown log.

use chrono::Utc;

use crate::health::{TeardownFailure, TeardownStep};
use crate::manager::Inner;
use crate::types::{Environment, EnvironmentId};

pub(crate) async fn run(inner: &Inner, id: &EnvironmentId) {
	let Some(env) = inner.registry.get(id).await else {
		tracing::warn!(env_id = %id, "Teardown requested for unknown environment");
		return;
	};

	if let Err(e) = inner.applier.release(&env).await {
		record(inner, &env, TeardownStep::ReleaseManifest, e.to_string()).await;
	}

	match &inner.schemas {
		Some(schemas) => {
			if let Err(e) = schemas.drop_schema(&env.database_schema).await {
				record(inner, &env, TeardownStep::DropSchema, e.to_string()).await;
			}
		}
		None => {
			tracing::warn!(
				env_id = %id,
				schema = %env.database_schema,
				"Database not configured, skipping schema drop"
			);
		}
	}

	if inner.registry.mark_deleted(id, Utc::now()).await.is_some() {
		tracing::info!(env_id = %id, name = %env.name, "Environment deleted");
	}
}

async fn record(inner: &Inner, env: &Environment, step: TeardownStep, message: String) {
	tracing::error!(env_id = %env.id, step = %step, error = %message, "Teardown step failed");
	inner
		.teardown_log
		.record(TeardownFailure {
			env_id: env.id.clone(),
			step,
			message,
			occurred_at: Utc::now(),
		})
		.await;
}
