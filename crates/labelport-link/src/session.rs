// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// An open, identified printer connection as held by the registry.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use labelport_bridge::traits::Transport;
use labelport_core::error::Result;
use labelport_core::{
    ConnectionHandle, ControlLanguage, ExtendedCapabilities, SessionId, SessionTier, Timeouts,
    TransportDescriptor,
};
use tracing::debug;

/// A printer session: one opened transport plus what the driver learned
/// about the printer on the other end.
///
/// Transport I/O is serialised through an internal lock, so a session can be
/// shared freely between threads.
pub struct PrinterSession {
    id: SessionId,
    handle: ConnectionHandle,
    control_language: ControlLanguage,
    extended: OnceLock<ExtendedCapabilities>,
    connected_at: DateTime<Utc>,
    command_timeouts: Timeouts,
    transport: Mutex<Box<dyn Transport>>,
}

impl std::fmt::Debug for PrinterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterSession")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("control_language", &self.control_language)
            .field("tier", &self.tier())
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

impl PrinterSession {
    pub(crate) fn new(
        handle: ConnectionHandle,
        transport: Box<dyn Transport>,
        control_language: ControlLanguage,
        command_timeouts: Timeouts,
    ) -> Self {
        Self {
            id: SessionId::new(),
            handle,
            control_language,
            extended: OnceLock::new(),
            connected_at: Utc::now(),
            command_timeouts,
            transport: Mutex::new(transport),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn descriptor(&self) -> &TransportDescriptor {
        self.handle.descriptor()
    }

    pub fn control_language(&self) -> ControlLanguage {
        self.control_language
    }

    pub fn tier(&self) -> SessionTier {
        if self.extended.get().is_some() {
            SessionTier::Extended
        } else {
            SessionTier::Basic
        }
    }

    /// Extended capabilities, once negotiated.
    pub fn extended(&self) -> Option<&ExtendedCapabilities> {
        self.extended.get()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn is_connected(&self) -> bool {
        self.transport().is_connected()
    }

    /// Write raw bytes to the printing channel.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.transport().write(data)
    }

    /// Send a command and collect the printer's reply using the command
    /// timeouts.
    pub fn send_command(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.transport()
            .send_and_wait_for_response(data, self.command_timeouts)
    }

    /// Run `f` with exclusive access to the transport, e.g. for driver
    /// queries.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut dyn Transport) -> R) -> R {
        let mut transport = self.transport();
        f(&mut **transport)
    }

    /// Record the outcome of extended negotiation. The first upgrade wins.
    pub(crate) fn upgrade(&self, capabilities: ExtendedCapabilities) -> &ExtendedCapabilities {
        self.extended.get_or_init(|| capabilities)
    }

    /// Close the transport. Errors are logged and otherwise ignored.
    pub fn close(&self) {
        if let Err(e) = self.transport().close() {
            debug!(handle = %self.handle, error = %e, "ignoring close error");
        }
    }

    fn transport(&self) -> MutexGuard<'_, Box<dyn Transport>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
