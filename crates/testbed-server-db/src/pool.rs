// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use testbed_common_config::SecretString;

const MAX_CONNECTIONS: u32 = 4;

/// Connection settings for the shared SQL server.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
	pub host: String,
	pub port: u16,
	pub user: String,
	pub password: SecretString,
	pub connect_timeout: Duration,
}

/// Create a lazily-connecting MySQL pool.
///
/// No connection is opened until the first schema operation. Must be called
/// from within a tokio runtime.
#[tracing::instrument(skip(settings), fields(host = %settings.host, port = settings.port))]
pub fn create_pool(settings: &ConnectSettings) -> MySqlPool {
	let options = MySqlConnectOptions::new()
		.host(&settings.host)
		.port(settings.port)
		.username(&settings.user)
		.password(settings.password.expose());

	let pool = MySqlPoolOptions::new()
		.max_connections(MAX_CONNECTIONS)
		.acquire_timeout(settings.connect_timeout)
		.connect_lazy_with(options);

	tracing::debug!("database pool created");
	pool
}
