// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelport: Native platform bridge abstractions.
//
// This crate defines the collaborator traits the connection layer consumes
// (capabilities, USB permission flow, multicast lock, transports, scanners,
// printer driver) and picks the implementation for the target OS.

pub mod stub;
pub mod traits;

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
pub mod desktop;

use std::sync::Arc;

use labelport_core::LinkConfig;

/// Returns the bridge implementation for the target operating system.
///
/// Desktop hosts get TCP transports and mDNS discovery; everything else gets
/// the stub, which reports every capability absent.
pub fn platform_bridge(config: &LinkConfig) -> Arc<dyn traits::PlatformBridge> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        Arc::new(desktop::DesktopBridge::new(config))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = config;
        Arc::new(stub::StubBridge)
    }
}
