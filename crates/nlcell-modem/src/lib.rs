//! Cellular Modem Driver
//!
//! Builds on [`nlcell_at`] to drive a modem as one device:
//!
//! - [`Modem`]: power control, boot detection and network mode for a chosen
//!   [`Model`]
//! - [`socket`]: TCP/UDP sockets tunnelled through each model's AT dialect
//! - [`dfu`]: firmware image framing, upload and the completion handshake
//! - SIM, GPIO and firmware version registries (Skywire Nano)
//!
//! Hardware the driver does not own (the host board, a debug probe, the bulk
//! transfer codec) is reached through the traits in [`host`].
//!
//! # Example
//!
//! ```rust,ignore
//! use nlcell_at::{Interface, InterfaceConfig};
//! use nlcell_modem::{Modem, ModemConfig, socket::SocketOptions};
//!
//! let at = Interface::open("/dev/ttyACM0", InterfaceConfig::default())?;
//! let modem = Modem::new(ModemConfig::default()).with_at(at);
//!
//! let mut socket = modem.socket(SocketOptions::default())?;
//! socket.connect("example.com", 80)?;
//! socket.send(b"GET / HTTP/1.0\r\n\r\n")?;
//! let reply = socket.recv(1024)?;
//! ```

mod app;
mod error;
mod modem;
mod registry;
mod sim;

pub mod dfu;
pub mod gpio;
pub mod host;
pub mod socket;

pub use app::*;
pub use error::*;
pub use modem::*;
pub use registry::*;
pub use sim::*;
