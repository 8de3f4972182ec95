// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelport connection layer.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handle::ConnectionHandle;

/// Unique identifier for an open printer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The family of transports a discovery pass scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// TCP/IP printers on the local network.
    Network,
    /// Bluetooth classic (SPP).
    Bluetooth,
    /// Bluetooth Low Energy.
    BluetoothLe,
    /// USB host connection.
    Usb,
}

impl TransportKind {
    /// All kinds, in the order a caller would typically scan them.
    pub const ALL: [TransportKind; 4] = [
        TransportKind::Network,
        TransportKind::Bluetooth,
        TransportKind::BluetoothLe,
        TransportKind::Usb,
    ];

    /// Tag reported to the bridge layer as `connectionType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Bluetooth => "bluetooth",
            Self::BluetoothLe => "bluetooth-le",
            Self::Usb => "usb",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of errors for retry decisions made by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Timeout, dropped link, device not attached yet: retrying may help.
    Transient,
    /// The user must act first (grant a permission, enable Bluetooth).
    UserAction,
    /// Retrying the same call can never succeed.
    Permanent,
}

/// Read timeouts handed to a transport when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Maximum time to wait for the first byte of a response.
    pub read: Duration,
    /// Once data has started arriving, how long a gap ends the response.
    pub inter_byte: Duration,
}

impl Timeouts {
    pub const fn from_millis(read_ms: u64, inter_byte_ms: u64) -> Self {
        Self {
            read: Duration::from_millis(read_ms),
            inter_byte: Duration::from_millis(inter_byte_ms),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_millis(5000, 500)
    }
}

/// Printer control language reported by the driver after the transport opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlLanguage {
    Zpl,
    Cpcl,
    LinePrint,
}

impl std::fmt::Display for ControlLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Zpl => "ZPL",
            Self::Cpcl => "CPCL",
            Self::LinePrint => "LINE_PRINT",
        })
    }
}

/// Capability tier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionTier {
    /// Only the basic control language is available.
    Basic,
    /// The richer vendor command/status set was negotiated.
    Extended,
}

/// Firmware version reported by a printer that negotiated the extended tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Result of a successful extended-capability negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedCapabilities {
    pub firmware: FirmwareVersion,
}

/// Print mode as reported in a status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintMode {
    Rewind,
    PeelOff,
    TearOff,
    Cutter,
    Applicator,
    DelayedCut,
    Linerless,
    Kiosk,
    Unknown,
}

/// Point-in-time printer status, produced by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterStatus {
    pub print_mode: PrintMode,
    pub label_length_in_dots: u32,
    pub number_of_formats_in_receive_buffer: u32,
    pub labels_remaining_in_batch: u32,
    pub is_partial_format_in_progress: bool,
    pub is_head_cold: bool,
    pub is_head_open: bool,
    pub is_head_too_hot: bool,
    pub is_paper_out: bool,
    pub is_ribbon_out: bool,
    pub is_receive_buffer_full: bool,
    pub is_paused: bool,
    pub is_ready_to_print: bool,
}

/// What a successful connect reports back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub handle: ConnectionHandle,
    pub control_language: ControlLanguage,
    pub status: PrinterStatus,
}

/// A printer reported by one discovery pass.
///
/// Ephemeral: surfaced once per discovery event and not retained by the
/// connection layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPrinterRecord {
    /// Canonical handle derived from the scanner's connection object.
    pub handle: ConnectionHandle,
    /// Raw address as reported by the scanner (IP, MAC or USB device path).
    pub address: String,
    pub connection_type: TransportKind,
    /// Backend-supplied metadata, keys and values free-form.
    pub discovery_data: BTreeMap<String, String>,
    pub found_at: DateTime<Utc>,
}
