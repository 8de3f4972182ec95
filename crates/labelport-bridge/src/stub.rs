// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for builds where no native printer stack is available.
//
// Every capability reports absent and every operation returns
// `PlatformUnavailable`.

use labelport_core::error::{LinkError, Result};
use labelport_core::{Timeouts, TransportDescriptor};

use crate::traits::*;

/// No-op bridge returned on unsupported platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Unsupported (stub)"
    }
}

impl NativeCapabilities for StubBridge {
    fn has_feature(&self, _feature: HostFeature) -> bool {
        false
    }

    fn has_permission(&self, _permission: HostPermission) -> bool {
        false
    }
}

impl NativeUsb for StubBridge {
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
        tracing::warn!("NativeUsb::request_usb_permission called on stub bridge");
        Err(LinkError::PlatformUnavailable)
    }
}

impl NativeMulticast for StubBridge {
    fn acquire_multicast_lock(&self, _tag: &str) -> Result<()> {
        Err(LinkError::PlatformUnavailable)
    }

    fn release_multicast_lock(&self, _tag: &str) {}
}

impl NativeTransports for StubBridge {
    fn create_transport(
        &self,
        _descriptor: &TransportDescriptor,
        _timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        tracing::warn!("NativeTransports::create_transport called on stub bridge");
        Err(LinkError::PlatformUnavailable)
    }

    fn create_usb_transport(
        &self,
        _device: &UsbDevice,
        _timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        Err(LinkError::PlatformUnavailable)
    }
}

impl PrinterScanner for StubBridge {
    fn scan_network(&self, _found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        tracing::warn!("PrinterScanner::scan_network called on stub bridge");
        Err(LinkError::PlatformUnavailable)
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
