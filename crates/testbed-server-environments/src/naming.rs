// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Derivation of names and isolation handles from an environment ID.
//!
//! Every handle is a pure function of the ID (and, for URLs, the normalized
//! name), so two environments can never share a schema, cache prefix or
//! topic prefix.

use crate::types::EnvironmentId;

pub const SCHEMA_PREFIX: &str = "texecom_env_";
pub const WORKLOAD_SUFFIX: &str = "-fern";
pub const INGRESS_SUFFIX: &str = "-ingress";
pub const WORKLOAD_PORT: i32 = 8080;

const MAX_DNS_LABEL: usize = 63;
/// Longest name that still fits `<name>-ingress` in one DNS label.
pub const MAX_NAME_LENGTH: usize = MAX_DNS_LABEL - INGRESS_SUFFIX.len();

/// Everything an environment is addressed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationHandles {
	pub name: String,
	pub database_schema: String,
	pub cache_prefix: String,
	pub topic_prefix: String,
	pub internal_url: String,
	pub url: String,
}

/// Derive all handles for `id`.
pub fn derive(
	id: &EnvironmentId,
	requested_name: Option<&str>,
	namespace: &str,
	base_domain: &str,
) -> IsolationHandles {
	let name = normalize_name(requested_name.unwrap_or_default(), id);
	IsolationHandles {
		database_schema: schema_name(id),
		cache_prefix: format!("env:{id}:"),
		topic_prefix: format!("env/{id}/"),
		internal_url: format!(
			"http://{}.{namespace}.svc.cluster.local:{WORKLOAD_PORT}",
			workload_name(&name)
		),
		url: format!("https://{}", public_host(&name, base_domain)),
		name,
	}
}

pub fn schema_name(id: &EnvironmentId) -> String {
	format!("{SCHEMA_PREFIX}{id}")
}

pub fn workload_name(name: &str) -> String {
	format!("{name}{WORKLOAD_SUFFIX}")
}

pub fn ingress_name(name: &str) -> String {
	format!("{name}{INGRESS_SUFFIX}")
}

pub fn public_host(name: &str, base_domain: &str) -> String {
	format!("{name}.{base_domain}")
}

/// Normalize a requested name into a DNS-label-safe token.
///
/// Lowercases, maps spaces and underscores to hyphens, drops anything
/// outside `[a-z0-9-]`, collapses hyphen runs and trims hyphens at both
/// ends. Falls back to `env-<id>` when nothing is left.
pub fn normalize_name(requested: &str, id: &EnvironmentId) -> String {
	let mut out = String::with_capacity(requested.len());
	for c in requested.chars() {
		let c = match c {
			' ' | '_' => '-',
			c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
			'-' => '-',
			_ => continue,
		};
		if c == '-' && (out.is_empty() || out.ends_with('-')) {
			continue;
		}
		out.push(c);
	}

	out.truncate(MAX_NAME_LENGTH);
	let trimmed = out.trim_end_matches('-');

	if trimmed.is_empty() {
		format!("env-{id}")
	} else {
		trimmed.to_string()
	}
}
