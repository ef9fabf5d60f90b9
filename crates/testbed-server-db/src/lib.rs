// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema management on the shared SQL server.
//!
//! Every environment gets its own database (`CREATE DATABASE IF NOT EXISTS`),
//! dropped again at teardown.

pub mod error;
pub mod pool;
pub mod schema;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use pool::{create_pool, ConnectSettings};
pub use schema::{validate_schema_name, MySqlSchemaStore, SchemaStore};
