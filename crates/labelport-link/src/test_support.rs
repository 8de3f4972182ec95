// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory platform, transport and driver doubles for the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use labelport_bridge::traits::*;
use labelport_core::error::{LinkError, Result};
use labelport_core::{
    ControlLanguage, ExtendedCapabilities, FirmwareVersion, PrintMode, PrinterStatus, Timeouts,
    TransportDescriptor, TransportKind,
};

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn usb_device(device_id: u32, vendor_id: u16, product_id: u16) -> UsbDevice {
    UsbDevice {
        device_id,
        device_name: format!("/dev/bus/usb/001/{device_id:03}"),
        vendor_id,
        product_id,
        product_name: Some("Label Printer".into()),
    }
}

pub fn ready_status() -> PrinterStatus {
    PrinterStatus {
        print_mode: PrintMode::TearOff,
        label_length_in_dots: 1218,
        number_of_formats_in_receive_buffer: 0,
        labels_remaining_in_batch: 0,
        is_partial_format_in_progress: false,
        is_head_cold: false,
        is_head_open: false,
        is_head_too_hot: false,
        is_paper_out: false,
        is_ribbon_out: false,
        is_receive_buffer_full: false,
        is_paused: false,
        is_ready_to_print: true,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// How the fake OS answers a USB permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReply {
    Grant,
    Deny,
    /// Never answer.
    Ignore,
    /// The prompt cannot be shown.
    Fail,
    /// Broadcast a grant for a different device id.
    GrantOtherDevice(u32),
}

/// Scripted result of one scan backend.
#[derive(Clone, Default)]
struct ScanScript {
    printers: Vec<FoundPrinter>,
    error: Option<String>,
}

/// Counters shared between the fake platform and every transport it creates.
#[derive(Default)]
pub struct TransportCounters {
    pub created: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

/// Scriptable `PlatformBridge` that records what the connection layer asked
/// of it.
pub struct FakePlatform {
    features: HashSet<HostFeature>,
    permissions: HashSet<HostPermission>,
    usb_devices: Vec<UsbDevice>,
    usb_granted: Mutex<HashSet<u32>>,
    prompt_reply: PromptReply,
    prompt_delay: Duration,
    listeners: Mutex<HashMap<u64, Arc<UsbPermissionListener>>>,
    next_listener: AtomicU64,
    registrations: AtomicUsize,
    prompts: AtomicUsize,
    multicast_acquired: AtomicUsize,
    multicast_released: AtomicUsize,
    scans: HashMap<TransportKind, ScanScript>,
    open_delay: Duration,
    fail_open: bool,
    response: Vec<u8>,
    pub transports: Arc<TransportCounters>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            features: HashSet::new(),
            permissions: HashSet::new(),
            usb_devices: Vec::new(),
            usb_granted: Mutex::new(HashSet::new()),
            prompt_reply: PromptReply::Ignore,
            prompt_delay: Duration::from_millis(20),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            registrations: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
            multicast_acquired: AtomicUsize::new(0),
            multicast_released: AtomicUsize::new(0),
            scans: HashMap::new(),
            open_delay: Duration::ZERO,
            fail_open: false,
            response: b"OK".to_vec(),
            transports: Arc::new(TransportCounters::default()),
        }
    }

    pub fn with_feature(mut self, feature: HostFeature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn with_permission(mut self, permission: HostPermission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Bluetooth and BLE features plus every Bluetooth permission.
    pub fn with_bluetooth(self) -> Self {
        HostPermission::BLUETOOTH
            .into_iter()
            .fold(self, Self::with_permission)
            .with_feature(HostFeature::Bluetooth)
            .with_feature(HostFeature::BluetoothLe)
    }

    pub fn with_usb_device(mut self, device: UsbDevice) -> Self {
        self.features.insert(HostFeature::UsbHost);
        self.usb_devices.push(device);
        self
    }

    pub fn with_usb_permission(self, device_id: u32) -> Self {
        lock(&self.usb_granted).insert(device_id);
        self
    }

    pub fn with_prompt_reply(mut self, reply: PromptReply) -> Self {
        self.prompt_reply = reply;
        self
    }

    pub fn with_prompt_delay(mut self, delay: Duration) -> Self {
        self.prompt_delay = delay;
        self
    }

    pub fn with_scan(mut self, kind: TransportKind, printers: Vec<FoundPrinter>) -> Self {
        self.scans.entry(kind).or_default().printers = printers;
        self
    }

    /// Scan reports its printers, then fails.
    pub fn with_scan_error(mut self, kind: TransportKind, reason: &str) -> Self {
        self.scans.entry(kind).or_default().error = Some(reason.to_owned());
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn with_failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn with_response(mut self, response: &[u8]) -> Self {
        self.response = response.to_vec();
        self
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn listener_registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn multicast_acquired(&self) -> usize {
        self.multicast_acquired.load(Ordering::SeqCst)
    }

    pub fn multicast_released(&self) -> usize {
        self.multicast_released.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.transports.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.transports.closed.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.transports.created.load(Ordering::SeqCst)
    }

    fn broadcast(listeners: Vec<Arc<UsbPermissionListener>>, event: UsbPermissionEvent) {
        for listener in listeners {
            (listener.as_ref())(&event);
        }
    }

    fn transport(&self, descriptor: TransportDescriptor) -> Box<dyn Transport> {
        self.transports.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeTransport {
            descriptor,
            connected: false,
            open_delay: self.open_delay,
            fail_open: self.fail_open,
            response: self.response.clone(),
            written: Vec::new(),
            counters: Arc::clone(&self.transports),
        })
    }

    fn run_scan(&self, kind: TransportKind, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        let script = self.scans.get(&kind).cloned().unwrap_or_default();
        for printer in script.printers {
            found(printer);
        }
        match script.error {
            Some(reason) => Err(LinkError::Connection(reason)),
            None => Ok(()),
        }
    }
}

impl PlatformBridge for FakePlatform {
    fn platform_name(&self) -> &str {
        "Fake"
    }
}

impl NativeCapabilities for FakePlatform {
    fn has_feature(&self, feature: HostFeature) -> bool {
        self.features.contains(&feature)
    }

    fn has_permission(&self, permission: HostPermission) -> bool {
        self.permissions.contains(&permission)
    }
}

impl NativeUsb for FakePlatform {
    fn attached_usb_devices(&self) -> Vec<UsbDevice> {
        self.usb_devices.clone()
    }

    fn has_usb_permission(&self, device: &UsbDevice) -> bool {
        lock(&self.usb_granted).contains(&device.device_id)
    }

    fn register_usb_permission_listener(&self, listener: UsbPermissionListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.registrations.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).insert(id, Arc::new(listener));
        ListenerId(id)
    }

    fn unregister_usb_permission_listener(&self, id: ListenerId) {
        lock(&self.listeners).remove(&id.0);
    }

    fn request_usb_permission(&self, device: &UsbDevice) -> Result<()> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let event = match self.prompt_reply {
            PromptReply::Fail => {
                return Err(LinkError::Connection("prompt could not be shown".into()));
            }
            PromptReply::Ignore => return Ok(()),
            PromptReply::Grant => {
                lock(&self.usb_granted).insert(device.device_id);
                UsbPermissionEvent {
                    device_id: Some(device.device_id),
                    granted: true,
                }
            }
            PromptReply::Deny => UsbPermissionEvent {
                device_id: Some(device.device_id),
                granted: false,
            },
            PromptReply::GrantOtherDevice(other) => UsbPermissionEvent {
                device_id: Some(other),
                granted: true,
            },
        };

        // The OS answers later, on its own thread.
        let listeners: Vec<_> = lock(&self.listeners).values().cloned().collect();
        let delay = self.prompt_delay;
        thread::spawn(move || {
            thread::sleep(delay);
            Self::broadcast(listeners, event);
        });
        Ok(())
    }
}

impl NativeMulticast for FakePlatform {
    fn acquire_multicast_lock(&self, _tag: &str) -> Result<()> {
        self.multicast_acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_multicast_lock(&self, _tag: &str) {
        self.multicast_released.fetch_add(1, Ordering::SeqCst);
    }
}

impl NativeTransports for FakePlatform {
    fn create_transport(
        &self,
        descriptor: &TransportDescriptor,
        _timeouts: Timeouts,
    ) -> Result<Box<dyn Transport>> {
        Ok(self.transport(descriptor.clone()))
    }

    fn create_usb_transport(&self, device: &UsbDevice, _timeouts: Timeouts) -> Result<Box<dyn Transport>> {
        Ok(self.transport(TransportDescriptor::usb(device.vendor_id, device.product_id)))
    }
}

impl PrinterScanner for FakePlatform {
    fn scan_network(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        self.run_scan(TransportKind::Network, found)
    }

    fn scan_bluetooth(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        self.run_scan(TransportKind::Bluetooth, found)
    }

    fn scan_bluetooth_le(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        self.run_scan(TransportKind::BluetoothLe, found)
    }

    fn scan_usb(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        self.run_scan(TransportKind::Usb, found)
    }
}

/// A found printer reported with its full descriptor.
pub fn found(address: &str, descriptor: TransportDescriptor) -> FoundPrinter {
    FoundPrinter {
        address: address.to_owned(),
        connection: ScannedConnection::Descriptor(descriptor),
        discovery_data: BTreeMap::new(),
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

pub struct FakeTransport {
    descriptor: TransportDescriptor,
    connected: bool,
    open_delay: Duration,
    fail_open: bool,
    response: Vec<u8>,
    written: Vec<u8>,
    counters: Arc<TransportCounters>,
}

impl Transport for FakeTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn open(&mut self) -> Result<()> {
        thread::sleep(self.open_delay);
        if self.fail_open {
            return Err(LinkError::Connection(format!("{} refused", self.descriptor)));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(LinkError::Connection("not open".into()));
        }
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn send_and_wait_for_response(&mut self, data: &[u8], _timeouts: Timeouts) -> Result<Vec<u8>> {
        self.write(data)?;
        Ok(self.response.clone())
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct FakeDriver {
    language: Option<ControlLanguage>,
    extended: Option<ExtendedCapabilities>,
    negotiations: AtomicUsize,
}

impl FakeDriver {
    pub fn zpl() -> Self {
        Self {
            language: Some(ControlLanguage::Zpl),
            extended: Some(ExtendedCapabilities {
                firmware: FirmwareVersion {
                    major: 6,
                    minor: 5,
                    micro: 0,
                },
            }),
            negotiations: AtomicUsize::new(0),
        }
    }

    /// Printer that answers in no known control language.
    pub fn unidentifiable() -> Self {
        Self {
            language: None,
            ..Self::zpl()
        }
    }

    pub fn basic_only(language: ControlLanguage) -> Self {
        Self {
            language: Some(language),
            extended: None,
            negotiations: AtomicUsize::new(0),
        }
    }

    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }
}

impl PrinterDriver for FakeDriver {
    fn identify(&self, transport: &mut dyn Transport) -> Result<ControlLanguage> {
        if !transport.is_connected() {
            return Err(LinkError::Connection("identify on closed transport".into()));
        }
        self.language.ok_or(LinkError::UnsupportedPrinterLanguage)
    }

    fn negotiate_extended(&self, _transport: &mut dyn Transport) -> Result<ExtendedCapabilities> {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        self.extended.clone().ok_or(LinkError::NotExtendedCapable)
    }

    fn current_status(&self, _transport: &mut dyn Transport) -> Result<PrinterStatus> {
        Ok(ready_status())
    }
}
