// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB permission gate.
//
// Turns the OS's asynchronous "permission result" broadcast into a blocking
// yes/no for one device. Each device moves through
// `NoRequest -> Pending -> {Granted, Denied}`; concurrent callers for the same
// device share one pending request and one prompt.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use labelport_bridge::traits::{ListenerId, PlatformBridge, UsbDevice, UsbPermissionEvent};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermissionState {
    Pending,
    Granted,
    Denied,
}

/// Single-value slot resolved at most once by the OS listener or the leader.
struct PendingRequest {
    state: Mutex<PermissionState>,
    resolved: Condvar,
}

impl PendingRequest {
    fn new() -> Self {
        Self {
            state: Mutex::new(PermissionState::Pending),
            resolved: Condvar::new(),
        }
    }

    /// First resolution wins; later ones are ignored.
    fn resolve(&self, granted: bool) {
        let mut state = lock(&self.state);
        if *state == PermissionState::Pending {
            *state = if granted {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            self.resolved.notify_all();
        }
    }

    /// Block until resolved or `timeout` elapses. Still pending counts as denied.
    fn wait(&self, timeout: Duration) -> bool {
        let state = lock(&self.state);
        let (state, _) = self
            .resolved
            .wait_timeout_while(state, timeout, |s| *s == PermissionState::Pending)
            .unwrap_or_else(PoisonError::into_inner);
        *state == PermissionState::Granted
    }
}

/// Unregisters the permission listener when dropped.
struct ListenerRegistration<'a> {
    host: &'a dyn PlatformBridge,
    id: ListenerId,
}

impl Drop for ListenerRegistration<'_> {
    fn drop(&mut self) {
        self.host.unregister_usb_permission_listener(self.id);
        debug!(listener = self.id.0, "USB permission listener unregistered");
    }
}

/// Blocking USB permission flow over the platform's prompt and listener API.
pub struct UsbPermissionGate {
    host: Arc<dyn PlatformBridge>,
    pending: Mutex<HashMap<u32, Arc<PendingRequest>>>,
    timeout: Duration,
}

impl UsbPermissionGate {
    pub fn new(host: Arc<dyn PlatformBridge>, timeout: Duration) -> Self {
        Self {
            host,
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask for permission with the configured timeout.
    pub fn request(&self, device: &UsbDevice) -> bool {
        self.request_with_timeout(device, self.timeout)
    }

    /// Ask for permission to use `device`, blocking up to `timeout`.
    ///
    /// Returns `true` straight away when the OS already recorded permission.
    /// A timeout, an explicit denial, or a prompt that could not be shown all
    /// return `false`.
    pub fn request_with_timeout(&self, device: &UsbDevice, timeout: Duration) -> bool {
        if self.host.has_usb_permission(device) {
            debug!(device = device.device_id, "USB permission already held");
            return true;
        }

        let (request, leader) = {
            let mut pending = lock(&self.pending);
            match pending.get(&device.device_id) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let request = Arc::new(PendingRequest::new());
                    pending.insert(device.device_id, Arc::clone(&request));
                    (request, true)
                }
            }
        };

        if !leader {
            debug!(device = device.device_id, "joining pending USB permission request");
            return request.wait(timeout);
        }

        let granted = self.prompt_and_wait(device, &request, timeout);

        // Wake any followers still waiting when the leader gave up.
        request.resolve(granted);
        lock(&self.pending).remove(&device.device_id);

        info!(device = device.device_id, granted, "USB permission resolved");
        granted
    }

    fn prompt_and_wait(
        &self,
        device: &UsbDevice,
        request: &Arc<PendingRequest>,
        timeout: Duration,
    ) -> bool {
        let device_id = device.device_id;
        let slot = Arc::downgrade(request);
        let id = self
            .host
            .register_usb_permission_listener(Box::new(move |event: &UsbPermissionEvent| {
                if event.device_id != Some(device_id) {
                    return;
                }
                if let Some(request) = slot.upgrade() {
                    request.resolve(event.granted);
                }
            }));
        let _registration = ListenerRegistration {
            host: self.host.as_ref(),
            id,
        };

        if let Err(e) = self.host.request_usb_permission(device) {
            warn!(device = device_id, error = %e, "USB permission prompt failed");
            return false;
        }

        let granted = request.wait(timeout);
        if !granted {
            debug!(device = device_id, timeout_ms = timeout.as_millis() as u64, "USB permission not granted");
        }
        granted
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
