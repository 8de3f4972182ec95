// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelport Link: the connection layer. Turns handles into open printer
// sessions (one per handle), gates USB access behind the OS permission
// prompt, and runs discovery over every transport kind. All OS work goes
// through the traits in `labelport-bridge`.

pub mod discovery;
pub mod factory;
pub mod permission;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use discovery::{DiscoveryOutcome, DiscoveryUnifier};
pub use factory::TransportFactory;
pub use permission::UsbPermissionGate;
pub use registry::ConnectionRegistry;
pub use session::PrinterSession;
