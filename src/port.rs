//! Free port selection for the development server.

use std::net::TcpListener;

use crate::error::{Error, Result};
use crate::util::blocking;

/// Outcome of a port scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSelection {
    pub port: u16,
    pub preferred: u16,
}

impl PortSelection {
    /// Whether the scan had to move past the preferred port.
    pub fn preferred_busy(&self) -> bool {
        self.port != self.preferred
    }
}

/// Find the first port in `start..=end` on `host` that can be bound.
///
/// A port counts as free when a listener can be bound to it; the listener is
/// dropped again straight away so the bundler can take the port.
pub fn find_free_port(host: &str, start: u16, end: u16) -> Result<PortSelection> {
    (start..=end)
        .find(|&port| TcpListener::bind((host, port)).is_ok())
        .map(|port| PortSelection {
            port,
            preferred: start,
        })
        .ok_or(Error::NoFreePort { start, end })
}

/// Async wrapper around [`find_free_port`].
pub async fn select_port(host: &str, start: u16, end: u16) -> Result<PortSelection> {
    let host = host.to_string();
    blocking(move || find_free_port(&host, start, end)).await
}
