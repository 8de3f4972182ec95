// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection registry: at most one open session per handle.
//
// Every entry point takes a handle string, canonicalises it, and looks the
// session up in a map of per-handle slots. The slot lock is held across
// lookup, transport creation, open and identification, so two callers for the
// same printer never open two connections, while callers for different
// printers proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use labelport_bridge::traits::{PlatformBridge, PrinterDriver};
use labelport_core::error::Result;
use labelport_core::{ConnectionHandle, ConnectionSummary, LinkConfig, Timeouts};
use tracing::{debug, info, instrument, warn};

use crate::factory::TransportFactory;
use crate::permission::UsbPermissionGate;
use crate::session::PrinterSession;

type Slot = Arc<Mutex<Option<Arc<PrinterSession>>>>;

/// Process-wide cache of open printer sessions, owned by the embedding
/// application.
pub struct ConnectionRegistry {
    factory: TransportFactory,
    driver: Arc<dyn PrinterDriver>,
    connect_timeouts: Timeouts,
    command_timeouts: Timeouts,
    slots: Mutex<HashMap<ConnectionHandle, Slot>>,
}

impl ConnectionRegistry {
    pub fn new(
        platform: Arc<dyn PlatformBridge>,
        driver: Arc<dyn PrinterDriver>,
        config: &LinkConfig,
    ) -> Self {
        let gate = UsbPermissionGate::new(Arc::clone(&platform), config.usb_permission_timeout());
        info!(platform = platform.platform_name(), "connection registry ready");
        Self {
            factory: TransportFactory::new(platform, gate),
            driver,
            connect_timeouts: config.connect_timeouts(),
            command_timeouts: config.command_timeouts(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached session for `handle`, or connect with the default
    /// timeouts.
    pub fn retrieve_or_connect(&self, handle: &str) -> Result<Arc<PrinterSession>> {
        self.retrieve_or_connect_with(handle, self.connect_timeouts)
    }

    /// Return the cached session for `handle`, or open and identify a new one.
    ///
    /// A cached session is returned as is, without checking liveness. On any
    /// failure nothing is cached.
    #[instrument(skip(self, timeouts))]
    pub fn retrieve_or_connect_with(
        &self,
        handle: &str,
        timeouts: Timeouts,
    ) -> Result<Arc<PrinterSession>> {
        let handle = ConnectionHandle::parse(handle)?;
        let slot = self.slot(&handle);

        let mut entry = lock(&slot);
        if let Some(session) = entry.as_ref() {
            debug!(session = %session.id(), "reusing cached session");
            return Ok(Arc::clone(session));
        }

        match self.open_session(&handle, timeouts) {
            Ok(session) => {
                let session = Arc::new(session);
                *entry = Some(Arc::clone(&session));
                Ok(session)
            }
            Err(e) => {
                drop(entry);
                self.prune(&handle, slot);
                Err(e)
            }
        }
    }

    /// Connect (or reuse) and report the printer's language and status.
    #[instrument(skip(self))]
    pub fn connect(&self, handle: &str) -> Result<ConnectionSummary> {
        let session = self.retrieve_or_connect(handle)?;
        let status = session.with_transport(|t| self.driver.current_status(t))?;
        Ok(ConnectionSummary {
            handle: session.handle().clone(),
            control_language: session.control_language(),
            status,
        })
    }

    /// Connect (or reuse) and upgrade the session to the extended tier.
    ///
    /// Negotiation runs once per session; `NotExtendedCapable` leaves the
    /// basic session cached.
    #[instrument(skip(self))]
    pub fn retrieve_extended(&self, handle: &str) -> Result<Arc<PrinterSession>> {
        let session = self.retrieve_or_connect(handle)?;
        if session.extended().is_none() {
            let capabilities = session.with_transport(|t| self.driver.negotiate_extended(t))?;
            let capabilities = session.upgrade(capabilities);
            info!(firmware = %capabilities.firmware, "session upgraded to extended tier");
        }
        Ok(session)
    }

    /// Close and forget the session for `handle`. Unknown or malformed
    /// handles are a no-op, as are close failures.
    #[instrument(skip(self))]
    pub fn disconnect(&self, handle: &str) {
        let handle = match ConnectionHandle::parse(handle) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(error = %e, "nothing to disconnect");
                return;
            }
        };

        let Some(slot) = lock(&self.slots).get(&handle).cloned() else {
            debug!("no session cached");
            return;
        };

        let session = lock(&slot).take();
        if let Some(session) = session {
            session.close();
            info!(session = %session.id(), "printer disconnected");
        }
        self.prune(&handle, slot);
    }

    /// Whether `handle` has a live session, connecting first if needed.
    /// Every failure reads as `false`.
    pub fn is_connected(&self, handle: &str) -> bool {
        match self.retrieve_or_connect(handle) {
            Ok(session) => session.is_connected(),
            Err(e) => {
                debug!(handle, error = %e, "treating failure as not connected");
                false
            }
        }
    }

    /// Handles with an open session, in handle order.
    pub fn connected_handles(&self) -> Vec<ConnectionHandle> {
        let slots: Vec<(ConnectionHandle, Slot)> = lock(&self.slots)
            .iter()
            .map(|(handle, slot)| (handle.clone(), Arc::clone(slot)))
            .collect();

        let mut handles: Vec<ConnectionHandle> = slots
            .into_iter()
            .filter(|(_, slot)| lock(slot).is_some())
            .map(|(handle, _)| handle)
            .collect();
        handles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        handles
    }

    pub fn len(&self) -> usize {
        self.connected_handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every session and empty the registry.
    pub fn shutdown(&self) {
        let slots: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        let mut closed = 0;
        for slot in slots {
            if let Some(session) = lock(&slot).take() {
                session.close();
                closed += 1;
            }
        }
        if closed > 0 {
            info!(closed, "connection registry shut down");
        }
    }

    fn open_session(&self, handle: &ConnectionHandle, timeouts: Timeouts) -> Result<PrinterSession> {
        let mut transport = self.factory.create(handle.descriptor(), timeouts)?;
        transport.open()?;

        let language = match self.driver.identify(&mut *transport) {
            Ok(language) => language,
            Err(e) => {
                warn!(error = %e, "printer identification failed, closing transport");
                if let Err(close_err) = transport.close() {
                    debug!(error = %close_err, "ignoring close error");
                }
                return Err(e);
            }
        };

        let session = PrinterSession::new(handle.clone(), transport, language, self.command_timeouts);
        info!(session = %session.id(), language = %language, "printer connected");
        Ok(session)
    }

    fn slot(&self, handle: &ConnectionHandle) -> Slot {
        Arc::clone(lock(&self.slots).entry(handle.clone()).or_default())
    }

    /// Drop `slot` from the map if it is empty and nobody else holds it.
    fn prune(&self, handle: &ConnectionHandle, slot: Slot) {
        let mut slots = lock(&self.slots);
        let ours = slots.get(handle).is_some_and(|s| Arc::ptr_eq(s, &slot));
        // Clones are only taken under the map lock, so the count cannot grow here.
        if ours && Arc::strong_count(&slot) == 2 && lock(&slot).is_none() {
            slots.remove(handle);
        }
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
