// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Common configuration primitives shared by testbed crates.
//!
//! - [`Secret`] keeps credentials out of logs and config dumps.
//! - [`load_secret_env`] reads a secret from `VAR` or the file named by `VAR_FILE`.

pub mod env;
pub mod secret;

pub use env::{load_secret_env, SecretEnvError};
pub use secret::{Secret, SecretString, REDACTED};
