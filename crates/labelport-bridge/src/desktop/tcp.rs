// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TCP transport for the `TCP`, `TCP_STATUS` and `TCP_MULTI` handles.
//
// The connection layer is blocking, so each transport owns a small
// current-thread Tokio runtime and drives its sockets with `block_on`. Do not
// call these methods from inside another Tokio runtime.
//
// `TCP_MULTI` opens two sockets to the same host: the printing port receives
// writes, the status port carries command responses.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use labelport_core::error::{LinkError, Result};
use labelport_core::{Timeouts, TransportDescriptor};

use crate::traits::Transport;

/// Read buffer size for command responses.
const READ_CHUNK: usize = 1024;

/// A printer reached over TCP, possibly with a separate status socket.
pub struct TcpTransport {
    descriptor: TransportDescriptor,
    host: String,
    port: u16,
    status_port: Option<u16>,
    timeouts: Timeouts,
    runtime: Runtime,
    printing: Option<TcpStream>,
    status: Option<TcpStream>,
}

impl TcpTransport {
    /// Create a closed transport for a TCP descriptor.
    pub fn new(descriptor: &TransportDescriptor, timeouts: Timeouts) -> Result<Self> {
        let (host, port, status_port) = match descriptor {
            TransportDescriptor::Tcp { host, port } | TransportDescriptor::TcpStatus { host, port } => {
                (host.to_string(), *port, None)
            }
            TransportDescriptor::TcpMulti {
                host,
                print_port,
                status_port,
            } => (host.to_string(), *print_port, Some(*status_port)),
            other => {
                return Err(LinkError::UnsupportedTransport(format!(
                    "{other} is not a TCP handle"
                )));
            }
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            descriptor: descriptor.clone(),
            host,
            port,
            status_port,
            timeouts,
            runtime,
            printing: None,
            status: None,
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

impl Transport for TcpTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn open(&mut self) -> Result<()> {
        if self.printing.is_some() {
            return Ok(());
        }

        let connect_timeout = self.timeouts.read;
        let printing = self
            .runtime
            .block_on(connect(&self.host, self.port, connect_timeout))?;
        let status = match self.status_port {
            Some(port) => Some(
                self.runtime
                    .block_on(connect(&self.host, port, connect_timeout))?,
            ),
            None => None,
        };

        self.printing = Some(printing);
        self.status = status;
        info!(handle = %self.descriptor, "TCP transport open");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for mut stream in [self.printing.take(), self.status.take()].into_iter().flatten() {
            if let Err(e) = self.runtime.block_on(stream.shutdown()) {
                first_error.get_or_insert(e);
            }
        }
        debug!(handle = %self.descriptor, "TCP transport closed");
        match first_error {
            Some(e) => Err(LinkError::Connection(format!("TCP shutdown: {e}"))),
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        let alive = |s: &Option<TcpStream>| s.as_ref().is_some_and(|s| s.peer_addr().is_ok());
        alive(&self.printing) && (self.status_port.is_none() || alive(&self.status))
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self
            .printing
            .as_mut()
            .ok_or_else(|| LinkError::Connection(format!("{} is not open", self.descriptor)))?;

        self.runtime.block_on(async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .map_err(|e| LinkError::Connection(format!("TCP send failed: {e}")))?;

        debug!(bytes = data.len(), "TCP write");
        Ok(())
    }

    fn send_and_wait_for_response(&mut self, data: &[u8], timeouts: Timeouts) -> Result<Vec<u8>> {
        self.write(data)?;

        let stream = match self.status.as_mut() {
            Some(status) => status,
            None => self.printing.as_mut().ok_or_else(|| {
                LinkError::Connection(format!("{} is not open", self.descriptor))
            })?,
        };

        let response = self
            .runtime
            .block_on(read_response(stream, timeouts))
            .map_err(|e| LinkError::Connection(format!("TCP read failed: {e}")))?;

        debug!(bytes = response.len(), "TCP response");
        Ok(response)
    }
}

/// Connect with the read timeout as the upper bound.
async fn connect(host: &str, port: u16, limit: std::time::Duration) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    debug!(addr = %addr, "connecting via TCP");

    let stream = tokio::time::timeout(limit, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            LinkError::Connection(format!(
                "TCP connection to {addr} timed out after {}ms",
                limit.as_millis()
            ))
        })?
        .map_err(|e| LinkError::Connection(format!("TCP connect to {addr}: {e}")))?;

    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Collect a response: first byte within `timeouts.read`, then keep reading
/// until a gap of `timeouts.inter_byte` or end of stream.
async fn read_response(stream: &mut TcpStream, timeouts: Timeouts) -> std::io::Result<Vec<u8>> {
    let mut response = Vec::new();
    let mut buf = [0u8; READ_CHUNK];

    match tokio::time::timeout(timeouts.read, stream.read(&mut buf)).await {
        Err(_) | Ok(Ok(0)) => return Ok(response),
        Ok(Ok(n)) => response.extend_from_slice(&buf[..n]),
        Ok(Err(e)) => return Err(e),
    }

    loop {
        match tokio::time::timeout(timeouts.inter_byte, stream.read(&mut buf)).await {
            Err(_) | Ok(Ok(0)) => break,
            Ok(Ok(n)) => response.extend_from_slice(&buf[..n]),
            Ok(Err(e)) => return Err(e),
        }
    }

    Ok(response)
}
