// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelport: Handle codec, core types and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod handle;
pub mod types;

pub use config::LinkConfig;
pub use error::LinkError;
pub use handle::{ConnectionHandle, HandlePrefix, MacAddress, TransportDescriptor};
pub use types::*;
