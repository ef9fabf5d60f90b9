// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment with the `VAR` / `VAR_FILE` convention.

use std::path::PathBuf;
use std::{env, fs};

use thiserror::Error;

use crate::secret::Secret;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load a secret from `{var}_FILE` (preferred) or `{var}`.
///
/// A single trailing newline is stripped from file contents. Empty values
/// are treated as unset so that `MYSQL_ROOT_PASSWORD=` in a `.env` file
/// reads as "no credentials".
pub fn load_secret_env(var: &str) -> Result<Option<Secret<String>>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| SecretEnvError::Io {
			path: path.clone(),
			source: e,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(non_empty(secret));
	}

	match env::var(var) {
		Ok(value) => Ok(non_empty(value)),
		Err(_) => Ok(None),
	}
}

fn non_empty(value: String) -> Option<Secret<String>> {
	if value.is_empty() {
		None
	} else {
		Some(Secret::new(value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	// Each test owns its variable names so they can run in parallel.

	#[test]
	fn returns_none_when_unset() {
		let result = load_secret_env("TESTBED_TEST_SECRET_UNSET").unwrap();
		assert!(result.is_none());
	}

	#[test]
	fn reads_direct_value() {
		env::set_var("TESTBED_TEST_SECRET_DIRECT", "s3cret");
		let result = load_secret_env("TESTBED_TEST_SECRET_DIRECT").unwrap();
		env::remove_var("TESTBED_TEST_SECRET_DIRECT");
		assert_eq!(result.unwrap().expose(), "s3cret");
	}

	#[test]
	fn empty_direct_value_is_none() {
		env::set_var("TESTBED_TEST_SECRET_EMPTY", "");
		let result = load_secret_env("TESTBED_TEST_SECRET_EMPTY").unwrap();
		env::remove_var("TESTBED_TEST_SECRET_EMPTY");
		assert!(result.is_none());
	}

	#[test]
	fn file_takes_precedence_and_strips_newline() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();

		env::set_var("TESTBED_TEST_SECRET_BOTH", "from-env");
		env::set_var("TESTBED_TEST_SECRET_BOTH_FILE", file.path());
		let result = load_secret_env("TESTBED_TEST_SECRET_BOTH").unwrap();
		env::remove_var("TESTBED_TEST_SECRET_BOTH");
		env::remove_var("TESTBED_TEST_SECRET_BOTH_FILE");

		assert_eq!(result.unwrap().expose(), "from-file");
	}

	#[test]
	fn empty_file_path_is_an_error() {
		env::set_var("TESTBED_TEST_SECRET_PATH_FILE", "");
		let result = load_secret_env("TESTBED_TEST_SECRET_PATH");
		env::remove_var("TESTBED_TEST_SECRET_PATH_FILE");
		assert!(matches!(result, Err(SecretEnvError::EmptyPath { .. })));
	}

	#[test]
	fn missing_file_is_an_error() {
		env::set_var(
			"TESTBED_TEST_SECRET_MISSING_FILE",
			"/nonexistent/testbed/secret",
		);
		let result = load_secret_env("TESTBED_TEST_SECRET_MISSING");
		env::remove_var("TESTBED_TEST_SECRET_MISSING_FILE");
		assert!(matches!(result, Err(SecretEnvError::Io { .. })));
	}
}
