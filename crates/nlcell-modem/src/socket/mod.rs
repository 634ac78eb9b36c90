//! Sockets tunnelled through AT commands.
//!
//! Every model exposes the same lifecycle:
//!
//! ```text
//! Unbound --create--> Created --connect--> Connected --close--> Closed
//!                        |                                 ^
//!                        +------------close----------------+
//! ```
//!
//! How each step maps onto the wire is model specific and lives behind the
//! [`Dialect`] trait. A failed `connect` leaves the socket `Created`. `close`
//! on a socket that is already closed, or was never created, does nothing.
//! Dropping a live [`Socket`] closes it.

mod nano;
mod src7611;
mod tg1wwg;

pub use nano::NanoDialect;
pub use src7611::{extract_payload, Src7611Dialect, EOF_PATTERN};
pub use tg1wwg::{IdPool, SharedPool, Tg1wwgDialect, ID_RANGE, MAX_RECV};

use std::fmt;
use std::time::Duration;

use nlcell_at::Interface;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ModemError, Result, SocketError};
use crate::modem::SharedInterface;

/// Where a socket is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Not yet created on the modem.
    Unbound,
    /// Created, not connected.
    Created,
    /// Connected to a peer.
    Connected,
    /// Closed. Terminal.
    Closed,
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SocketState::Unbound => "unbound",
            SocketState::Created => "created",
            SocketState::Connected => "connected",
            SocketState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Transport type of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    #[default]
    Stream,
    Datagram,
}

/// Arguments for creating a socket.
#[derive(Debug, Clone, Default)]
pub struct SocketOptions {
    /// Transport type.
    pub kind: SocketKind,
    /// Bind to a socket that already exists on the modem instead of creating
    /// one. Only the Skywire Nano supports this.
    pub fileno: Option<u32>,
}

impl SocketOptions {
    pub fn with_kind(mut self, kind: SocketKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_fileno(mut self, fileno: u32) -> Self {
        self.fileno = Some(fileno);
        self
    }
}

/// Socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// How long the modem waits for data on a receive.
    pub recv_timeout_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        SocketConfig {
            recv_timeout_ms: 60_000,
        }
    }
}

impl SocketConfig {
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Receive timeout as a [`Duration`].
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

// ============================================================================
// Dialect Trait
// ============================================================================

/// One model's socket command set.
///
/// Implementations hold the modem-side id and whatever else they need between
/// calls. [`Socket`] enforces the lifecycle, so each method is only called
/// from the state it belongs to.
pub trait Dialect: Send {
    /// Allocate the socket.
    fn create(&mut self, at: &mut Interface) -> Result<()>;

    /// Connect to `host:port`.
    fn connect(&mut self, at: &mut Interface, host: &str, port: u16) -> Result<()>;

    /// Send `data`, returning how many bytes the modem accepted.
    fn send(&mut self, at: &mut Interface, data: &[u8]) -> Result<usize>;

    /// Receive up to `size` bytes, letting the modem wait up to `timeout`.
    fn recv(&mut self, at: &mut Interface, size: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Release the socket on the modem.
    fn close(&mut self, at: &mut Interface) -> Result<()>;

    /// The modem-side id, once there is one.
    fn id(&self) -> Option<u32>;
}

// ============================================================================
// Socket
// ============================================================================

/// A socket on a modem.
///
/// Each call locks the shared AT channel for its duration. Do not hold that
/// lock while dropping a live socket.
pub struct Socket {
    at: SharedInterface,
    dialect: Box<dyn Dialect>,
    state: SocketState,
    config: SocketConfig,
}

impl Socket {
    /// Wrap a dialect without creating anything on the modem.
    pub fn new(at: SharedInterface, dialect: Box<dyn Dialect>, config: SocketConfig) -> Self {
        Socket {
            at,
            dialect,
            state: SocketState::Unbound,
            config,
        }
    }

    /// Create a socket on the modem.
    pub fn open(at: SharedInterface, dialect: Box<dyn Dialect>, config: SocketConfig) -> Result<Self> {
        let mut socket = Self::new(at, dialect, config);
        socket.create()?;
        Ok(socket)
    }

    /// The lifecycle state.
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// The modem-side id, once there is one.
    pub fn id(&self) -> Option<u32> {
        self.dialect.id()
    }

    /// Allocate the socket on the modem.
    pub fn create(&mut self) -> Result<()> {
        if self.state != SocketState::Unbound {
            return Err(ModemError::usage(format!("cannot create a {} socket", self.state)));
        }

        self.dialect.create(&mut self.at.lock())?;
        self.state = SocketState::Created;
        debug!(id = ?self.id(), "socket created");
        Ok(())
    }

    /// Connect to `host:port`.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.state != SocketState::Created {
            return Err(ModemError::usage(format!("cannot connect a {} socket", self.state)));
        }

        self.dialect.connect(&mut self.at.lock(), host, port)?;
        self.state = SocketState::Connected;
        info!(id = ?self.id(), host, port, "socket connected");
        Ok(())
    }

    /// Send `data`, returning how many bytes the modem accepted.
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        if self.state != SocketState::Connected {
            return Err(SocketError::NotConnected.into());
        }

        let sent = self.dialect.send(&mut self.at.lock(), data)?;
        debug!(id = ?self.id(), sent, "socket send");
        Ok(sent)
    }

    /// Receive up to `size` bytes. An empty result means nothing arrived.
    pub fn recv(&mut self, size: usize) -> Result<Vec<u8>> {
        if self.state != SocketState::Connected {
            return Err(SocketError::NotConnected.into());
        }

        let data = self
            .dialect
            .recv(&mut self.at.lock(), size, self.config.recv_timeout())?;
        debug!(id = ?self.id(), received = data.len(), "socket recv");
        Ok(data)
    }

    /// Close the socket. Closing twice is not an error.
    ///
    /// If the modem refuses, the socket stays open so the close can be
    /// retried.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            SocketState::Closed => return Ok(()),
            SocketState::Unbound => {
                self.state = SocketState::Closed;
                return Ok(());
            }
            SocketState::Created | SocketState::Connected => {}
        }

        let id = self.id();
        self.dialect.close(&mut self.at.lock())?;
        self.state = SocketState::Closed;
        info!(id = ?id, "socket closed");
        Ok(())
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id())
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(id = ?self.id(), "failed to close socket: {}", e);
        }
    }
}
