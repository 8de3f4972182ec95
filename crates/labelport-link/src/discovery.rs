// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discovery over the four scanner backends.
//
// Every backend reports printers in its own shape; this module turns each one
// into a `DiscoveredPrinterRecord` carrying a canonical handle, and gives every
// scan the same ending: `Ok(DiscoveryOutcome)` or an error, exactly once.

use std::sync::Arc;

use chrono::Utc;
use labelport_bridge::traits::{FoundPrinter, HostPermission, PlatformBridge, ScannedConnection};
use labelport_core::error::{LinkError, Result};
use labelport_core::{DiscoveredPrinterRecord, LinkConfig, TransportDescriptor, TransportKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::factory::check_bluetooth_access;

/// Terminal report of a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOutcome {
    pub kind: TransportKind,
    pub printers_found: usize,
}

/// Holds the Wi-Fi multicast lock for the duration of a network scan.
struct MulticastLockGuard<'a> {
    platform: &'a dyn PlatformBridge,
    tag: &'a str,
}

impl<'a> MulticastLockGuard<'a> {
    /// Acquire only when the host lets us; otherwise scan without it.
    fn acquire(platform: &'a dyn PlatformBridge, tag: &'a str) -> Result<Option<Self>> {
        if !platform.has_permission(HostPermission::ChangeWifiMulticastState) {
            debug!("no multicast permission, scanning without lock");
            return Ok(None);
        }
        platform.acquire_multicast_lock(tag)?;
        debug!(tag, "multicast lock acquired");
        Ok(Some(Self { platform, tag }))
    }
}

impl Drop for MulticastLockGuard<'_> {
    fn drop(&mut self) {
        self.platform.release_multicast_lock(self.tag);
        debug!(tag = self.tag, "multicast lock released");
    }
}

pub struct DiscoveryUnifier {
    platform: Arc<dyn PlatformBridge>,
    multicast_lock_tag: String,
}

impl DiscoveryUnifier {
    pub fn new(platform: Arc<dyn PlatformBridge>, config: &LinkConfig) -> Self {
        Self {
            platform,
            multicast_lock_tag: config.multicast_lock_tag.clone(),
        }
    }

    /// Run one scan of `kind`, handing each printer to `on_found` as the
    /// backend reports it.
    ///
    /// Bluetooth and BLE scans fail up front with `UnsupportedTransport` or
    /// `PermissionDenied` when the host cannot scan. Backend failures surface
    /// as `LinkError::Discovery`. Printers whose connection cannot be turned
    /// into a handle are logged and skipped.
    #[instrument(skip_all, fields(kind = %kind))]
    pub fn discover<F>(&self, kind: TransportKind, mut on_found: F) -> Result<DiscoveryOutcome>
    where
        F: FnMut(DiscoveredPrinterRecord),
    {
        if matches!(kind, TransportKind::Bluetooth | TransportKind::BluetoothLe) {
            check_bluetooth_access(self.platform.as_ref(), kind)?;
        }

        let _multicast = match kind {
            TransportKind::Network => {
                MulticastLockGuard::acquire(self.platform.as_ref(), &self.multicast_lock_tag)
                    .map_err(into_discovery)?
            }
            _ => None,
        };

        let mut printers_found = 0;
        let mut report = |printer: FoundPrinter| match self.to_record(printer) {
            Ok(record) => {
                debug!(handle = %record.handle, address = %record.address, "printer found");
                printers_found += 1;
                on_found(record);
            }
            Err(e) => warn!(error = %e, "skipping printer without a usable connection"),
        };

        let scanned = match kind {
            TransportKind::Network => self.platform.scan_network(&mut report),
            TransportKind::Bluetooth => self.platform.scan_bluetooth(&mut report),
            TransportKind::BluetoothLe => self.platform.scan_bluetooth_le(&mut report),
            TransportKind::Usb => self.platform.scan_usb(&mut report),
        };
        scanned.map_err(into_discovery)?;

        info!(printers_found, "discovery finished");
        Ok(DiscoveryOutcome {
            kind,
            printers_found,
        })
    }

    /// Run one scan and gather every record.
    pub fn discover_collect(&self, kind: TransportKind) -> Result<Vec<DiscoveredPrinterRecord>> {
        let mut records = Vec::new();
        self.discover(kind, |record| records.push(record))?;
        Ok(records)
    }

    fn to_record(&self, printer: FoundPrinter) -> Result<DiscoveredPrinterRecord> {
        let descriptor = match printer.connection {
            ScannedConnection::Descriptor(descriptor) => descriptor,
            ScannedConnection::UsbDevice { device_name } => {
                let device = self
                    .platform
                    .attached_usb_devices()
                    .into_iter()
                    .find(|d| d.device_name == device_name)
                    .ok_or_else(|| {
                        LinkError::DeviceNotFound(format!("{device_name} is no longer attached"))
                    })?;
                TransportDescriptor::usb(device.vendor_id, device.product_id)
            }
        };

        Ok(DiscoveredPrinterRecord {
            connection_type: descriptor.kind(),
            handle: descriptor.encode(),
            address: printer.address,
            discovery_data: printer.discovery_data,
            found_at: Utc::now(),
        })
    }
}

fn into_discovery(err: LinkError) -> LinkError {
    match err {
        LinkError::Discovery(_) => err,
        other => LinkError::Discovery(other.to_string()),
    }
}
