// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS network scan for raw-socket label printers.
//
// We browse for `_pdl-datastream._tcp.local.` (the raw 9100 print service
// advertised by networked label printers) using the `mdns-sd` crate. Each
// resolved service is reported once as a `TCP:<ip>:<port>` connection with its
// TXT record as discovery data.

use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, warn};

use labelport_core::TransportDescriptor;
use labelport_core::error::{LinkError, Result};

use crate::traits::{FoundPrinter, ScannedConnection};

/// mDNS service type for raw page-description-language printers.
pub const PRINTER_SERVICE: &str = "_pdl-datastream._tcp.local.";

/// Blocking mDNS browse that ends after a fixed window.
pub struct MdnsScanner {
    browse_for: Duration,
}

impl MdnsScanner {
    pub fn new(browse_for: Duration) -> Self {
        Self { browse_for }
    }

    /// Browse for printers until the window closes, reporting each resolved
    /// service once.
    pub fn scan(&self, found: &mut dyn FnMut(FoundPrinter)) -> Result<()> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| LinkError::Discovery(format!("failed to start mDNS daemon: {e}")))?;
        let receiver = daemon
            .browse(PRINTER_SERVICE)
            .map_err(|e| LinkError::Discovery(format!("browse {PRINTER_SERVICE}: {e}")))?;

        info!(service = PRINTER_SERVICE, window_ms = self.browse_for.as_millis() as u64, "mDNS scan started");

        let deadline = Instant::now() + self.browse_for;
        let mut reported = HashSet::new();

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            let event = match receiver.recv_timeout(remaining) {
                Ok(event) => event,
                Err(_) => break,
            };
            match event {
                ServiceEvent::ServiceResolved(info) => {
                    let fullname = info.get_fullname().to_owned();
                    if reported.contains(&fullname) {
                        continue;
                    }
                    match service_info_to_printer(&info) {
                        Ok(printer) => {
                            info!(name = %fullname, address = %printer.address, "printer resolved");
                            reported.insert(fullname);
                            found(printer);
                        }
                        Err(e) => {
                            warn!(name = %fullname, error = %e, "skipping unusable mDNS record");
                        }
                    }
                }
                ServiceEvent::SearchStopped(stype) => {
                    debug!(service_type = %stype, "mDNS search stopped");
                    break;
                }
                _ => {}
            }
        }

        if let Err(e) = daemon.stop_browse(PRINTER_SERVICE) {
            debug!(error = %e, "stop browse failed");
        }
        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "mDNS daemon shutdown failed");
        }

        info!(printers = reported.len(), "mDNS scan finished");
        Ok(())
    }
}

/// Convert a resolved service into a scan result, preferring IPv4.
fn service_info_to_printer(info: &ServiceInfo) -> Result<FoundPrinter> {
    let ip: IpAddr = info
        .get_addresses()
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| info.get_addresses().iter().next())
        .copied()
        .ok_or_else(|| {
            LinkError::Discovery(format!("no address for service {}", info.get_fullname()))
        })?;

    let properties = info
        .get_properties()
        .iter()
        .map(|p| (p.key().to_owned(), p.val_str().to_owned()));

    found_printer(ip, info.get_port(), properties)
}

/// Build the scan result for a printer at `ip:port`.
///
/// Handles cannot carry IPv6 literals, so those are rejected here.
fn found_printer(
    ip: IpAddr,
    port: u16,
    properties: impl IntoIterator<Item = (String, String)>,
) -> Result<FoundPrinter> {
    let address = ip.to_string();
    let descriptor = TransportDescriptor::tcp(&address, port)?;
    Ok(FoundPrinter {
        address,
        connection: ScannedConnection::Descriptor(descriptor),
        discovery_data: properties.into_iter().collect::<BTreeMap<_, _>>(),
    })
}
