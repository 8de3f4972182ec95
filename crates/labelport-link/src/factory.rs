// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport factory: descriptor in, unopened transport out.
//
// Host capability and permission checks run here, before any I/O, so callers
// get `UnsupportedTransport` / `PermissionDenied` rather than an opaque
// connection failure.

use std::sync::Arc;

use labelport_bridge::traits::{HostFeature, HostPermission, PlatformBridge, Transport, UsbDevice};
use labelport_core::error::{LinkError, Result};
use labelport_core::{Timeouts, TransportDescriptor, TransportKind};
use tracing::debug;

use crate::permission::UsbPermissionGate;

pub struct TransportFactory {
    platform: Arc<dyn PlatformBridge>,
    gate: UsbPermissionGate,
}

impl TransportFactory {
    pub fn new(platform: Arc<dyn PlatformBridge>, gate: UsbPermissionGate) -> Self {
        Self { platform, gate }
    }

    pub fn platform(&self) -> &Arc<dyn PlatformBridge> {
        &self.platform
    }

    /// Build the transport for `descriptor`. The transport is returned closed.
    pub fn create(
        &self,
        descriptor: &TransportDescriptor,
        timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        debug!(handle = %descriptor, kind = %descriptor.kind(), "creating transport");
        match descriptor {
            TransportDescriptor::Usb {
                vendor_id,
                product_id,
            } => self.create_usb(*vendor_id, *product_id, timeouts),
            _ => {
                if matches!(
                    descriptor.kind(),
                    TransportKind::Bluetooth | TransportKind::BluetoothLe
                ) {
                    check_bluetooth_access(self.platform.as_ref(), descriptor.kind())?;
                }
                self.platform.create_transport(descriptor, timeouts)
            }
        }
    }

    fn create_usb(
        &self,
        vendor_id: u16,
        product_id: u16,
        timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        if !self.platform.has_feature(HostFeature::UsbHost) {
            return Err(LinkError::UnsupportedTransport(
                "this device does not support USB host mode".into(),
            ));
        }

        let device = find_usb_device(self.platform.as_ref(), vendor_id, product_id)?;

        if !self.gate.request(&device) {
            return Err(LinkError::PermissionDenied(format!(
                "USB permission for {vendor_id:x}:{product_id:x} was not granted"
            )));
        }

        self.platform.create_usb_transport(&device, timeouts)
    }
}

/// Feature and permission checks shared by Bluetooth connections and scans.
pub(crate) fn check_bluetooth_access(platform: &dyn PlatformBridge, kind: TransportKind) -> Result<()> {
    let feature = match kind {
        TransportKind::BluetoothLe => HostFeature::BluetoothLe,
        _ => HostFeature::Bluetooth,
    };
    if !platform.has_feature(feature) {
        return Err(LinkError::UnsupportedTransport(format!(
            "this device does not support {kind}"
        )));
    }

    let missing: Vec<String> = HostPermission::BLUETOOTH
        .into_iter()
        .filter(|p| !platform.has_permission(*p))
        .map(|p| format!("{p:?}"))
        .collect();
    if !missing.is_empty() {
        return Err(LinkError::PermissionDenied(format!(
            "missing permissions: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// First attached device with matching vendor and product ids.
pub(crate) fn find_usb_device(
    platform: &dyn PlatformBridge,
    vendor_id: u16,
    product_id: u16,
) -> Result<UsbDevice> {
    platform
        .attached_usb_devices()
        .into_iter()
        .find(|d| d.vendor_id == vendor_id && d.product_id == product_id)
        .ok_or_else(|| {
            LinkError::DeviceNotFound(format!("no USB device {vendor_id:x}:{product_id:x} attached"))
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{FakePlatform, PromptReply, usb_device};

    fn factory(fake: FakePlatform) -> (Arc<FakePlatform>, TransportFactory) {
        let fake = Arc::new(fake);
        let platform: Arc<dyn PlatformBridge> = fake.clone();
        let gate = UsbPermissionGate::new(Arc::clone(&platform), Duration::from_millis(500));
        (fake, TransportFactory::new(platform, gate))
    }

    fn bt() -> TransportDescriptor {
        TransportDescriptor::bluetooth("AC:3F:A4:11:22:33").unwrap()
    }

    #[test]
    fn tcp_is_built_by_the_platform() {
        let (fake, factory) = factory(FakePlatform::new());
        let tcp = TransportDescriptor::tcp("10.0.0.5", 9100).unwrap();
        let transport = factory.create(&tcp, Timeouts::default()).unwrap();
        assert_eq!(transport.descriptor(), &tcp);
        assert!(!transport.is_connected());
        assert_eq!(fake.created(), 1);
    }

    #[test]
    fn bluetooth_without_hardware_is_unsupported() {
        let (fake, factory) = factory(FakePlatform::new());
        let result = factory.create(&bt(), Timeouts::default());
        assert!(matches!(result, Err(LinkError::UnsupportedTransport(_))));
        assert_eq!(fake.created(), 0);
    }

    #[test]
    fn bluetooth_without_permissions_is_denied() {
        let (_, factory) = factory(
            FakePlatform::new()
                .with_feature(HostFeature::Bluetooth)
                .with_permission(HostPermission::BluetoothConnect),
        );
        match factory.create(&bt(), Timeouts::default()) {
            Err(LinkError::PermissionDenied(msg)) => {
                assert!(msg.contains("BluetoothScan"));
                assert!(msg.contains("FineLocation"));
            }
            other => panic!("expected PermissionDenied, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn ble_needs_the_le_feature() {
        let (_, factory) = factory(
            HostPermission::BLUETOOTH
                .into_iter()
                .fold(FakePlatform::new(), FakePlatform::with_permission)
                .with_feature(HostFeature::Bluetooth),
        );
        let ble = TransportDescriptor::decode("BTLE:AC:3F:A4:11:22:33").unwrap();
        assert!(matches!(
            factory.create(&ble, Timeouts::default()),
            Err(LinkError::UnsupportedTransport(_))
        ));
        assert!(factory.create(&bt(), Timeouts::default()).is_ok());
    }

    #[test]
    fn usb_without_host_mode_is_unsupported() {
        let (_, factory) = factory(FakePlatform::new());
        assert!(matches!(
            factory.create(&TransportDescriptor::usb(0xa5f, 0x141), Timeouts::default()),
            Err(LinkError::UnsupportedTransport(_))
        ));
    }

    #[test]
    fn usb_device_must_be_attached() {
        let (_, factory) = factory(FakePlatform::new().with_usb_device(usb_device(3, 0xa5f, 0x141)));
        assert!(matches!(
            factory.create(&TransportDescriptor::usb(0xa5f, 0x999), Timeouts::default()),
            Err(LinkError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn usb_denied_permission_is_surfaced() {
        let (fake, factory) = factory(
            FakePlatform::new()
                .with_usb_device(usb_device(3, 0xa5f, 0x141))
                .with_prompt_reply(PromptReply::Deny),
        );
        assert!(matches!(
            factory.create(&TransportDescriptor::usb(0xa5f, 0x141), Timeouts::default()),
            Err(LinkError::PermissionDenied(_))
        ));
        assert_eq!(fake.prompts(), 1);
        assert_eq!(fake.created(), 0);
    }

    #[test]
    fn usb_granted_permission_builds_transport() {
        let (fake, factory) = factory(
            FakePlatform::new()
                .with_usb_device(usb_device(3, 0xa5f, 0x141))
                .with_prompt_reply(PromptReply::Grant),
        );
        let usb = TransportDescriptor::usb(0xa5f, 0x141);
        let transport = factory.create(&usb, Timeouts::default()).unwrap();
        assert_eq!(transport.descriptor(), &usb);
        assert_eq!(fake.created(), 1);
    }
}
