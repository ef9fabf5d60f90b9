// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod database;
mod environments;
mod logging;
mod services;

pub use database::*;
pub use environments::*;
pub use logging::*;
pub use services::*;
