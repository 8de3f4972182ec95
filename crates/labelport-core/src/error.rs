// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelport.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all Labelport operations.
#[derive(Debug, Error)]
pub enum LinkError {
    // -- Handle codec --
    #[error("malformed connection handle: {0}")]
    MalformedHandle(String),

    // -- Environment / policy --
    #[error("transport not supported on this device: {0}")]
    UnsupportedTransport(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    // -- Transport --
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("printer discovery failed: {0}")]
    Discovery(String),

    // -- Printer negotiation --
    #[error("printer control language could not be determined")]
    UnsupportedPrinterLanguage,

    #[error("printer does not support the extended command set")]
    NotExtendedCapable,

    // -- Platform bridge --
    #[error("feature not available on this platform")]
    PlatformUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LinkError {
    /// Classify this error for callers deciding whether to retry.
    ///
    /// The registry itself never retries; this only tells the caller whether
    /// trying again (possibly after re-discovery) can help.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedHandle(_)
            | Self::UnsupportedPrinterLanguage
            | Self::NotExtendedCapable
            | Self::PlatformUnavailable
            | Self::Serialization(_) => ErrorClass::Permanent,

            Self::UnsupportedTransport(_) | Self::PermissionDenied(_) => ErrorClass::UserAction,

            Self::DeviceNotFound(_) | Self::Connection(_) | Self::Discovery(_) => {
                ErrorClass::Transient
            }

            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    ErrorClass::UserAction
                }
                _ => ErrorClass::Transient,
            },
        }
    }

    /// Stable error code handed to the bridge layer when rejecting a call.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedHandle(_) => "MalformedHandle",
            Self::UnsupportedTransport(_) => "UnsupportedTransport",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::DeviceNotFound(_) => "DeviceNotFound",
            Self::Connection(_) | Self::Io(_) => "ConnectionException",
            Self::Discovery(_) => "DiscoveryException",
            Self::UnsupportedPrinterLanguage => "PrinterLanguageUnknownException",
            Self::NotExtendedCapable => "NotExtendedCapableException",
            Self::PlatformUnavailable => "PlatformUnavailable",
            Self::Serialization(_) => "SerializationException",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LinkError>;
