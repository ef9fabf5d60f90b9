// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared cache and message bus endpoints handed to workloads.

use serde::Deserialize;

pub const DEFAULT_CACHE_HOST: &str = "texecom-texecom-cloud-redis.texecom.svc.cluster.local";
pub const DEFAULT_BUS_HOST: &str = "texecom-texecom-cloud-emqx.texecom.svc.cluster.local";

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
	pub host: String,
}

impl Default for CacheConfig {
	fn default() -> Self {
		CacheConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: CacheConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		CacheConfig {
			host: self.host.unwrap_or_else(|| DEFAULT_CACHE_HOST.to_string()),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusConfig {
	pub host: String,
}

impl Default for BusConfig {
	fn default() -> Self {
		BusConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
}

impl BusConfigLayer {
	pub fn merge(&mut self, other: BusConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
	}

	pub fn finalize(self) -> BusConfig {
		BusConfig {
			host: self.host.unwrap_or_else(|| DEFAULT_BUS_HOST.to_string()),
		}
	}
}
