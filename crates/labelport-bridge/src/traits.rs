// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native collaborators the
// connection layer consumes.
//
// The connection layer never opens sockets, prompts the user, or scans the
// air itself. Everything that touches the OS sits behind these traits so the
// registry and discovery code can run unchanged against a phone, a desktop,
// or a test double.

use std::collections::BTreeMap;

use labelport_core::error::Result;
use labelport_core::{
    ControlLanguage, ExtendedCapabilities, PrinterStatus, Timeouts, TransportDescriptor,
};

/// Unified bridge that groups every native capability the connection layer
/// needs.
pub trait PlatformBridge:
    NativeCapabilities + NativeUsb + NativeMulticast + NativeTransports + PrinterScanner + Send + Sync
{
    /// Human-readable platform name (e.g. "Android 14", "Desktop").
    fn platform_name(&self) -> &str;
}

/// A single printer connection, created closed.
///
/// Multi-channel transports own both the printing and status streams and
/// open/close them together.
pub trait Transport: Send {
    /// The descriptor this transport was created for.
    fn descriptor(&self) -> &TransportDescriptor;

    /// Perform the handshake and set up sockets/channels.
    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Liveness as last observed by the transport.
    fn is_connected(&self) -> bool;

    /// Write bytes to the printing channel.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Write bytes, then collect the response. Waits at most `timeouts.read`
    /// for the first byte; after that a gap of `timeouts.inter_byte` ends the
    /// response. No response at all yields an empty vector.
    fn send_and_wait_for_response(&mut self, data: &[u8], timeouts: Timeouts) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Capability checks
// ---------------------------------------------------------------------------

/// Hardware features a host may lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFeature {
    Bluetooth,
    BluetoothLe,
    UsbHost,
}

/// Runtime permissions the application may or may not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPermission {
    BluetoothConnect,
    BluetoothScan,
    FineLocation,
    ChangeWifiMulticastState,
}

impl HostPermission {
    /// Everything a Bluetooth or BLE connection or scan requires.
    pub const BLUETOOTH: [HostPermission; 3] = [
        HostPermission::BluetoothConnect,
        HostPermission::BluetoothScan,
        HostPermission::FineLocation,
    ];
}

/// Boolean OS capability queries.
pub trait NativeCapabilities {
    fn has_feature(&self, feature: HostFeature) -> bool;

    fn has_permission(&self, permission: HostPermission) -> bool;
}

// ---------------------------------------------------------------------------
// USB
// ---------------------------------------------------------------------------

/// A USB device currently attached to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDevice {
    /// OS-assigned id; the identity used to match permission results.
    pub device_id: u32,
    /// OS device path (e.g. `/dev/bus/usb/001/004`).
    pub device_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: Option<String>,
}

/// Outcome of an OS permission prompt, delivered asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbPermissionEvent {
    /// Device the result refers to; `None` when the OS omitted it.
    pub device_id: Option<u32>,
    pub granted: bool,
}

/// Callback invoked on an OS thread for every permission result.
pub type UsbPermissionListener = Box<dyn Fn(&UsbPermissionEvent) + Send + Sync>;

/// Registration token returned by [`NativeUsb::register_usb_permission_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// USB host access and the asynchronous permission flow.
pub trait NativeUsb {
    fn attached_usb_devices(&self) -> Vec<UsbDevice>;

    /// Whether the OS already recorded permission for `device`.
    fn has_usb_permission(&self, device: &UsbDevice) -> bool;

    fn register_usb_permission_listener(&self, listener: UsbPermissionListener) -> ListenerId;

    fn unregister_usb_permission_listener(&self, id: ListenerId);

    /// Show the OS permission prompt. The answer arrives through the
    /// registered listeners, never through the return value.
    fn request_usb_permission(&self, device: &UsbDevice) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Network discovery support
// ---------------------------------------------------------------------------

/// Wi-Fi multicast lock (needed on phones for mDNS/broadcast discovery).
pub trait NativeMulticast {
    fn acquire_multicast_lock(&self, tag: &str) -> Result<()>;

    fn release_multicast_lock(&self, tag: &str);
}

// ---------------------------------------------------------------------------
// Transport construction
// ---------------------------------------------------------------------------

/// Builds concrete (unopened) transports.
pub trait NativeTransports {
    /// Transport for a TCP, Bluetooth or BLE descriptor.
    fn create_transport(
        &self,
        descriptor: &TransportDescriptor,
        timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>>;

    /// Transport for an attached USB device the caller has permission for.
    fn create_usb_transport(&self, device: &UsbDevice, timeouts: Timeouts)
    -> Result<Box<dyn Transport>>;
}

// ---------------------------------------------------------------------------
// Discovery backends
// ---------------------------------------------------------------------------

/// The connection object a scanner reports for a found printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedConnection {
    /// Scanner already knows the full descriptor (TCP, Bluetooth, BLE).
    Descriptor(TransportDescriptor),
    /// USB scanners only know the OS device path; vendor/product ids come
    /// from the attached-device list.
    UsbDevice { device_name: String },
}

/// One printer as reported by a scanner.
#[derive(Debug, Clone)]
pub struct FoundPrinter {
    pub address: String,
    pub connection: ScannedConnection,
    pub discovery_data: BTreeMap<String, String>,
}

/// Four independent discovery backends.
///
/// Each call blocks until its scan ends. `found` is invoked once per printer
/// in the order the backend sees them. `Ok(())` means the scan finished; an
/// error carries the backend's failure reason.
pub trait PrinterScanner {
    fn scan_network(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()>;

    fn scan_bluetooth(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()>;

    fn scan_bluetooth_le(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()>;

    fn scan_usb(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Printer capability negotiation
// ---------------------------------------------------------------------------

/// Vendor command-language layer, seen only through what the connection
/// layer needs from it.
pub trait PrinterDriver: Send + Sync {
    /// Determine the control language over a freshly opened transport.
    /// Fails with `UnsupportedPrinterLanguage`.
    fn identify(&self, transport: &mut dyn Transport) -> Result<ControlLanguage>;

    /// Try to unlock the extended command/status set.
    /// Fails with `NotExtendedCapable`.
    fn negotiate_extended(&self, transport: &mut dyn Transport) -> Result<ExtendedCapabilities>;

    fn current_status(&self, transport: &mut dyn Transport) -> Result<PrinterStatus>;
}
