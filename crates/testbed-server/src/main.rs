// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Testbed server binary: runs the environment manager and its expiry
//! sweeper.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use testbed_server_config::{LogFormat, ServerConfig};
use testbed_server_environments::{
	draft_environment, manifest, run_sweeper, CreateEnvironmentRequest, EnvironmentId,
	EnvironmentManager, EnvironmentType,
};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;
mod wiring;

/// Testbed server - ephemeral environment lifecycle manager.
#[derive(Parser, Debug)]
#[command(
	name = "testbed-server",
	about = "Ephemeral environment lifecycle manager",
	version
)]
struct Args {
	/// Config file (defaults to /etc/testbed/server.toml)
	#[arg(long, env = "TESTBED_CONFIG", global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the manager and expiry sweeper until interrupted (default)
	Serve,
	/// Print the manifest a new environment would get
	RenderManifest {
		#[arg(long)]
		name: String,
		#[arg(long)]
		owner: String,
		#[arg(long = "type", default_value = "ephemeral")]
		env_type: EnvironmentType,
		#[arg(long)]
		branch: Option<String>,
	},
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => testbed_server_config::load_config_with_file(path),
		None => testbed_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	match args.command {
		Some(Command::RenderManifest {
			name,
			owner,
			env_type,
			branch,
		}) => {
			let req = CreateEnvironmentRequest {
				name: Some(name),
				owner: Some(owner),
				env_type: Some(env_type),
				branch,
				..Default::default()
			};
			print!("{}", render_manifest(&config, &req));
			Ok(())
		}
		Some(Command::Serve) | None => serve(config).await,
		Some(Command::Version) => Ok(()),
	}
}

fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
	init_tracing(&config);

	tracing::info!(
		namespace = %config.environments.namespace,
		base_domain = %config.environments.base_domain,
		manifest_dir = %config.environments.manifest_dir.display(),
		"starting testbed-server"
	);

	let backends = wiring::backends(&config)?;
	let manager = EnvironmentManager::new(wiring::manager_config(&config), backends);

	let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
	let sweeper = tokio::spawn(run_sweeper(manager.clone(), shutdown_rx));

	tokio::signal::ctrl_c()
		.await
		.context("failed to listen for shutdown signal")?;
	tracing::info!("Received shutdown signal");

	let _ = shutdown_tx.send(());
	if let Err(e) = sweeper.await {
		tracing::error!(error = %e, "Expiry sweeper panicked");
	}

	let health = manager.health().await;
	tracing::info!(
		status = ?health.status,
		ready = health.environments.ready,
		creating = health.environments.creating,
		teardown_failures = health.teardown_failures.len(),
		"Server shutdown complete"
	);
	Ok(())
}

/// Manifest for a hypothetical environment created from `req`.
fn render_manifest(config: &ServerConfig, req: &CreateEnvironmentRequest) -> String {
	let manager_config = wiring::manager_config(config);
	let env = draft_environment(EnvironmentId::generate(), req, &manager_config, Utc::now());
	manifest::generate(&env, &manager_config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use testbed_server_config::{finalize, ServerConfigLayer};

	#[test]
	fn parses_render_manifest_args() {
		let args = Args::parse_from([
			"testbed-server",
			"render-manifest",
			"--name",
			"demo",
			"--owner",
			"alice",
			"--type",
			"sandbox",
		]);
		match args.command {
			Some(Command::RenderManifest {
				name,
				env_type,
				branch,
				..
			}) => {
				assert_eq!(name, "demo");
				assert_eq!(env_type, EnvironmentType::Sandbox);
				assert!(branch.is_none());
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn serve_is_the_default() {
		let args = Args::parse_from(["testbed-server"]);
		assert!(args.command.is_none());
	}

	#[test]
	fn rendered_manifest_names_the_workload() {
		let config = finalize(ServerConfigLayer::default(), None).unwrap();
		let req = CreateEnvironmentRequest {
			name: Some("demo".to_string()),
			owner: Some("alice".to_string()),
			..Default::default()
		};
		let yaml = render_manifest(&config, &req);
		assert!(yaml.contains("demo-fern"));
		assert!(yaml.contains("demo-ingress"));
		assert!(yaml.contains(&config.environments.namespace));
	}
}
