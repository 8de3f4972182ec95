// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop bridge: TCP transports and mDNS network discovery.
//
// Desktops have no runtime permission model, no Bluetooth printer stack we
// drive, and no USB host prompt. Only the network transports are real.

pub mod mdns;
pub mod tcp;

use labelport_core::error::{LinkError, Result};
use labelport_core::{LinkConfig, Timeouts, TransportDescriptor, TransportKind};
use tracing::debug;

use crate::traits::*;

pub use mdns::MdnsScanner;
pub use tcp::TcpTransport;

/// Bridge for Linux, macOS and Windows hosts.
pub struct DesktopBridge {
    scanner: MdnsScanner,
}

impl DesktopBridge {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            scanner: MdnsScanner::new(config.mdns_browse_duration()),
        }
    }
}

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        "Desktop"
    }
}

impl NativeCapabilities for DesktopBridge {
    fn has_feature(&self, _feature: HostFeature) -> bool {
        false
    }

    fn has_permission(&self, _permission: HostPermission) -> bool {
        false
    }
}

impl NativeUsb for DesktopBridge {
    fn attached_usb_devices(&self) -> Vec<UsbDevice> {
        Vec::new()
    }

    fn has_usb_permission(&self, _device: &UsbDevice) -> bool {
        false
    }

    fn register_usb_permission_listener(&self, _listener: UsbPermissionListener) -> ListenerId {
        ListenerId(0)
    }

    fn unregister_usb_permission_listener(&self, _id: ListenerId) {}

    fn request_usb_permission(&self, _device: &UsbDevice) -> Result<()> {
        Err(LinkError::PlatformUnavailable)
    }
}

impl NativeMulticast for DesktopBridge {
    // Desktop sockets receive multicast without a lock.
    fn acquire_multicast_lock(&self, tag: &str) -> Result<()> {
        debug!(tag, "multicast lock not needed on desktop");
        Ok(())
    }

    fn release_multicast_lock(&self, _tag: &str) {}
}

impl NativeTransports for DesktopBridge {
    fn create_transport(
        &self,
        descriptor: &TransportDescriptor,
        timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        match descriptor.kind() {
            TransportKind::Network => Ok(Box::new(TcpTransport::new(descriptor, timeouts)?)),
            other => Err(LinkError::UnsupportedTransport(format!(
                "{other} transports are not available on desktop"
            ))),
        }
    }

    fn create_usb_transport(
        &self,
        _device: &UsbDevice,
        _timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        Err(LinkError::UnsupportedTransport(
            "usb transports are not available on desktop".into(),
        ))
    }
}

impl PrinterScanner for DesktopBridge {
    fn scan_network(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        self.scanner.scan(found)
    }

    fn scan_bluetooth(&self, _found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        Err(LinkError::PlatformUnavailable)
    }

    fn scan_bluetooth_le(&self, _found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        Err(LinkError::PlatformUnavailable)
    }

    fn scan_usb(&self, _found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        Err(LinkError::PlatformUnavailable)
    }
}
