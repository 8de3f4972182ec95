// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection-layer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::Timeouts;

/// Settings for the registry, permission gate and discovery.
///
/// Missing keys in a config file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Read timeout used by `retrieve_or_connect` (default 5000 ms).
    pub read_timeout_ms: u64,
    /// Inter-byte timeout used by `retrieve_or_connect` (default 500 ms).
    pub inter_byte_timeout_ms: u64,
    /// How long a USB connect waits for the user to answer the permission
    /// prompt before treating it as denied (default 30 s).
    pub usb_permission_timeout_secs: u64,
    /// Response wait for ad-hoc commands sent through a session.
    pub command_timeout_ms: u64,
    /// Inter-byte gap that ends an ad-hoc command response.
    pub command_inter_byte_timeout_ms: u64,
    /// Tag under which the multicast lock is held during network discovery.
    pub multicast_lock_tag: String,
    /// How long the desktop mDNS scanner browses before reporting completion.
    pub mdns_browse_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5000,
            inter_byte_timeout_ms: 500,
            usb_permission_timeout_secs: 30,
            command_timeout_ms: 500,
            command_inter_byte_timeout_ms: 100,
            multicast_lock_tag: "labelport_multicast_lock".into(),
            mdns_browse_secs: 5,
        }
    }
}

impl LinkConfig {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        debug!(path = %path.display(), "link configuration loaded");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Timeouts applied when a caller does not pass its own.
    pub fn connect_timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.read_timeout_ms, self.inter_byte_timeout_ms)
    }

    pub fn command_timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.command_timeout_ms, self.command_inter_byte_timeout_ms)
    }

    pub fn usb_permission_timeout(&self) -> Duration {
        Duration::from_secs(self.usb_permission_timeout_secs)
    }

    pub fn mdns_browse_duration(&self) -> Duration {
        Duration::from_secs(self.mdns_browse_secs)
    }
}
