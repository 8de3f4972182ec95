// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection handle codec.
//
// A handle is a colon-delimited string whose leading tag selects the
// transport variant:
//
//   TCP:host:port                    TCP_STATUS:host:port
//   TCP_MULTI:host:port:statusPort
//   BT:mac  BT_INSECURE:mac  BT_STATUS:mac  BT_STATUS_INSECURE:mac  BT_MULTI:mac
//   BTLE:mac  BTLE_STATUS:mac  BTLE_MULTI:mac
//   USB:vendorId:productId           (ids in hexadecimal)
//
// Several tags are textual prefixes of others (`TCP` / `TCP_STATUS`,
// `BT` / `BT_STATUS_INSECURE`), so matching walks `HandlePrefix::BY_SPECIFICITY`
// where every tag precedes the shorter tags it starts with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::types::TransportKind;

/// Number of octets in a Bluetooth MAC address.
const MAC_OCTETS: usize = 6;

fn malformed(handle: &str, reason: impl fmt::Display) -> LinkError {
    LinkError::MalformedHandle(format!("`{handle}`: {reason}"))
}

// ---------------------------------------------------------------------------
// MAC address
// ---------------------------------------------------------------------------

/// A Bluetooth device address.
///
/// Parses one or two hex digits per octet in either case; always renders as
/// upper-case two-digit octets so that equal addresses encode identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; MAC_OCTETS]);

impl MacAddress {
    pub const fn new(octets: [u8; MAC_OCTETS]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; MAC_OCTETS] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != MAC_OCTETS {
            return Err(malformed(
                s,
                format!("MAC address has {} octets, expected {MAC_OCTETS}", parts.len()),
            ));
        }

        let mut octets = [0u8; MAC_OCTETS];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            let valid = (1..=2).contains(&part.len()) && part.chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(malformed(s, format!("invalid MAC octet `{part}`")));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|e| malformed(s, format!("invalid MAC octet `{part}`: {e}")))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

// ---------------------------------------------------------------------------
// Network host
// ---------------------------------------------------------------------------

/// Host part of a TCP handle: an IPv4 address or a hostname.
///
/// Colons are the field separator, so IPv6 literals cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkHost(String);

impl NetworkHost {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NetworkHost {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(malformed(s, "empty host"));
        }
        if s.contains(':') || s.chars().any(char::is_whitespace) {
            return Err(malformed(s, "host must not contain `:` or whitespace"));
        }
        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for NetworkHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Prefix table
// ---------------------------------------------------------------------------

/// Leading tag of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlePrefix {
    Tcp,
    TcpStatus,
    TcpMulti,
    Bt,
    BtInsecure,
    BtStatus,
    BtStatusInsecure,
    BtMulti,
    Btle,
    BtleStatus,
    BtleMulti,
    Usb,
}

impl HandlePrefix {
    /// Match order. A tag always precedes every shorter tag it starts with.
    pub const BY_SPECIFICITY: [HandlePrefix; 12] = [
        HandlePrefix::TcpStatus,
        HandlePrefix::TcpMulti,
        HandlePrefix::Tcp,
        HandlePrefix::BtleStatus,
        HandlePrefix::BtleMulti,
        HandlePrefix::Btle,
        HandlePrefix::BtStatusInsecure,
        HandlePrefix::BtStatus,
        HandlePrefix::BtInsecure,
        HandlePrefix::BtMulti,
        HandlePrefix::Bt,
        HandlePrefix::Usb,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::TcpStatus => "TCP_STATUS",
            Self::TcpMulti => "TCP_MULTI",
            Self::Bt => "BT",
            Self::BtInsecure => "BT_INSECURE",
            Self::BtStatus => "BT_STATUS",
            Self::BtStatusInsecure => "BT_STATUS_INSECURE",
            Self::BtMulti => "BT_MULTI",
            Self::Btle => "BTLE",
            Self::BtleStatus => "BTLE_STATUS",
            Self::BtleMulti => "BTLE_MULTI",
            Self::Usb => "USB",
        }
    }

    /// Find the most specific prefix of `handle`, returning it together with
    /// the remainder after the `:` separator.
    pub fn split(handle: &str) -> Option<(HandlePrefix, &str)> {
        Self::BY_SPECIFICITY.iter().find_map(|prefix| {
            handle
                .strip_prefix(prefix.tag())
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|rest| (*prefix, rest))
        })
    }
}

// ---------------------------------------------------------------------------
// Transport descriptor
// ---------------------------------------------------------------------------

/// Typed form of a connection handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportDescriptor {
    Tcp { host: NetworkHost, port: u16 },
    TcpStatus { host: NetworkHost, port: u16 },
    TcpMulti { host: NetworkHost, print_port: u16, status_port: u16 },
    Bluetooth { mac: MacAddress, secure: bool },
    BluetoothStatus { mac: MacAddress, secure: bool },
    BluetoothMulti { mac: MacAddress },
    BluetoothLe { mac: MacAddress },
    BluetoothLeStatus { mac: MacAddress },
    BluetoothLeMulti { mac: MacAddress },
    Usb { vendor_id: u16, product_id: u16 },
}

impl TransportDescriptor {
    /// Plain TCP printing channel.
    pub fn tcp(host: &str, port: u16) -> Result<Self> {
        Ok(Self::Tcp {
            host: host.parse()?,
            port,
        })
    }

    /// Secure Bluetooth classic printing channel.
    pub fn bluetooth(mac: &str) -> Result<Self> {
        Ok(Self::Bluetooth {
            mac: mac.parse()?,
            secure: true,
        })
    }

    pub fn usb(vendor_id: u16, product_id: u16) -> Self {
        Self::Usb {
            vendor_id,
            product_id,
        }
    }

    pub fn prefix(&self) -> HandlePrefix {
        match self {
            Self::Tcp { .. } => HandlePrefix::Tcp,
            Self::TcpStatus { .. } => HandlePrefix::TcpStatus,
            Self::TcpMulti { .. } => HandlePrefix::TcpMulti,
            Self::Bluetooth { secure: true, .. } => HandlePrefix::Bt,
            Self::Bluetooth { secure: false, .. } => HandlePrefix::BtInsecure,
            Self::BluetoothStatus { secure: true, .. } => HandlePrefix::BtStatus,
            Self::BluetoothStatus { secure: false, .. } => HandlePrefix::BtStatusInsecure,
            Self::BluetoothMulti { .. } => HandlePrefix::BtMulti,
            Self::BluetoothLe { .. } => HandlePrefix::Btle,
            Self::BluetoothLeStatus { .. } => HandlePrefix::BtleStatus,
            Self::BluetoothLeMulti { .. } => HandlePrefix::BtleMulti,
            Self::Usb { .. } => HandlePrefix::Usb,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Tcp { .. } | Self::TcpStatus { .. } | Self::TcpMulti { .. } => {
                TransportKind::Network
            }
            Self::Bluetooth { .. } | Self::BluetoothStatus { .. } | Self::BluetoothMulti { .. } => {
                TransportKind::Bluetooth
            }
            Self::BluetoothLe { .. }
            | Self::BluetoothLeStatus { .. }
            | Self::BluetoothLeMulti { .. } => TransportKind::BluetoothLe,
            Self::Usb { .. } => TransportKind::Usb,
        }
    }

    /// Bluetooth address, for the Bluetooth and BLE variants.
    pub fn mac(&self) -> Option<MacAddress> {
        match self {
            Self::Bluetooth { mac, .. }
            | Self::BluetoothStatus { mac, .. }
            | Self::BluetoothMulti { mac }
            | Self::BluetoothLe { mac }
            | Self::BluetoothLeStatus { mac }
            | Self::BluetoothLeMulti { mac } => Some(*mac),
            _ => None,
        }
    }

    /// Whether the handle opens linked printing and status channels.
    pub fn is_multichannel(&self) -> bool {
        matches!(
            self,
            Self::TcpMulti { .. } | Self::BluetoothMulti { .. } | Self::BluetoothLeMulti { .. }
        )
    }

    /// Canonical handle for this descriptor.
    pub fn encode(&self) -> ConnectionHandle {
        ConnectionHandle {
            text: self.to_string(),
            descriptor: self.clone(),
        }
    }

    /// Parse a handle string.
    pub fn decode(handle: &str) -> Result<Self> {
        let (prefix, rest) = HandlePrefix::split(handle)
            .ok_or_else(|| malformed(handle, "unrecognised transport prefix"))?;

        match prefix {
            HandlePrefix::Tcp | HandlePrefix::TcpStatus => {
                let [host, port] = fields::<2>(handle, prefix, rest)?;
                let host = host.parse()?;
                let port = parse_port(handle, port)?;
                Ok(if prefix == HandlePrefix::Tcp {
                    Self::Tcp { host, port }
                } else {
                    Self::TcpStatus { host, port }
                })
            }
            HandlePrefix::TcpMulti => {
                let [host, print_port, status_port] = fields::<3>(handle, prefix, rest)?;
                Ok(Self::TcpMulti {
                    host: host.parse()?,
                    print_port: parse_port(handle, print_port)?,
                    status_port: parse_port(handle, status_port)?,
                })
            }
            HandlePrefix::Usb => {
                let [vendor, product] = fields::<2>(handle, prefix, rest)?;
                Ok(Self::Usb {
                    vendor_id: parse_hex_id(handle, vendor)?,
                    product_id: parse_hex_id(handle, product)?,
                })
            }
            _ => {
                let mac: MacAddress = rest
                    .parse()
                    .map_err(|_| malformed(handle, "MAC address must have 6 hex octets"))?;
                Ok(match prefix {
                    HandlePrefix::Bt => Self::Bluetooth { mac, secure: true },
                    HandlePrefix::BtInsecure => Self::Bluetooth { mac, secure: false },
                    HandlePrefix::BtStatus => Self::BluetoothStatus { mac, secure: true },
                    HandlePrefix::BtStatusInsecure => Self::BluetoothStatus { mac, secure: false },
                    HandlePrefix::BtMulti => Self::BluetoothMulti { mac },
                    HandlePrefix::Btle => Self::BluetoothLe { mac },
                    HandlePrefix::BtleStatus => Self::BluetoothLeStatus { mac },
                    _ => Self::BluetoothLeMulti { mac },
                })
            }
        }
    }
}

impl fmt::Display for TransportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.prefix().tag();
        match self {
            Self::Tcp { host, port } | Self::TcpStatus { host, port } => {
                write!(f, "{tag}:{host}:{port}")
            }
            Self::TcpMulti {
                host,
                print_port,
                status_port,
            } => write!(f, "{tag}:{host}:{print_port}:{status_port}"),
            Self::Usb {
                vendor_id,
                product_id,
            } => write!(f, "{tag}:{vendor_id:x}:{product_id:x}"),
            Self::Bluetooth { mac, .. }
            | Self::BluetoothStatus { mac, .. }
            | Self::BluetoothMulti { mac }
            | Self::BluetoothLe { mac }
            | Self::BluetoothLeStatus { mac }
            | Self::BluetoothLeMulti { mac } => write!(f, "{tag}:{mac}"),
        }
    }
}

impl FromStr for TransportDescriptor {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// Split `rest` into exactly `N` colon-separated fields.
fn fields<'a, const N: usize>(
    handle: &str,
    prefix: HandlePrefix,
    rest: &'a str,
) -> Result<[&'a str; N]> {
    let parts: Vec<&str> = rest.split(':').collect();
    <[&str; N]>::try_from(parts.as_slice()).map_err(|_| {
        malformed(
            handle,
            format!(
                "`{}` takes {N} fields, found {}",
                prefix.tag(),
                parts.len()
            ),
        )
    })
}

fn parse_port(handle: &str, field: &str) -> Result<u16> {
    field
        .parse()
        .map_err(|e| malformed(handle, format!("invalid port `{field}`: {e}")))
}

fn parse_hex_id(handle: &str, field: &str) -> Result<u16> {
    u16::from_str_radix(field, 16)
        .map_err(|e| malformed(handle, format!("invalid USB id `{field}`: {e}")))
}

// ---------------------------------------------------------------------------
// Connection handle
// ---------------------------------------------------------------------------

/// Canonical, immutable string form of a [`TransportDescriptor`].
///
/// Always produced by encoding a descriptor, so two handles compare equal
/// exactly when their descriptors do. Used as the registry's cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionHandle {
    text: String,
    descriptor: TransportDescriptor,
}

impl ConnectionHandle {
    /// Decode `handle` and re-encode it canonically.
    pub fn parse(handle: &str) -> Result<Self> {
        Ok(TransportDescriptor::decode(handle)?.encode())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }
}

impl FromStr for ConnectionHandle {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConnectionHandle {
    type Error = LinkError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ConnectionHandle> for String {
    fn from(handle: ConnectionHandle) -> Self {
        handle.text
    }
}

impl From<&TransportDescriptor> for ConnectionHandle {
    fn from(descriptor: &TransportDescriptor) -> Self {
        descriptor.encode()
    }
}

impl From<TransportDescriptor> for ConnectionHandle {
    fn from(descriptor: TransportDescriptor) -> Self {
        Self {
            text: descriptor.to_string(),
            descriptor,
        }
    }
}

impl AsRef<str> for ConnectionHandle {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
