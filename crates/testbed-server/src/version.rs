// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for testbed-server.

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"testbed-server version: {}\n\
         Platform:               {}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_package_version() {
		let info = format_version_info();
		assert!(info.starts_with("testbed-server version: "));
		assert!(info.contains(env!("CARGO_PKG_VERSION")));
	}
}
