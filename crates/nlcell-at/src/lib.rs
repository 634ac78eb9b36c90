//! AT Command Engine
//!
//! Host-side plumbing for talking to a cellular modem over its AT command
//! interface: a deadline-bounded line reader, a command/response matcher with
//! the CME/CMS result taxonomy, a notification (URC) stream and an interactive
//! prompt mode for commands that take a raw payload.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → modem): ASCII text terminated with `\r`
//! - **Replies** (modem → host): zero or more output lines, then one status
//!   line (`OK`, `ERROR`, `+CME ERROR: <n>`, `+CMS ERROR: <n>`), each line
//!   terminated with `\r\n`
//! - **Echo**: the modem may echo the command back; it is filtered from output
//! - **URCs**: unsolicited lines can arrive at any time between exchanges
//!
//! # Example
//!
//! ```rust,ignore
//! use nlcell_at::{Interface, InterfaceConfig};
//!
//! let mut at = Interface::open("/dev/ttyACM0", InterfaceConfig::default())?;
//!
//! let response = at.send_command("AT+CGMR")?;
//! if response.is_ok() {
//!     println!("firmware: {}", response.lines()[0]);
//! }
//!
//! let urc = at.get_urc(Some("READY"), None)?;
//! ```

mod config;
mod error;
mod interface;
mod mock;
mod prompt;
mod reader;
mod response;
mod result;
mod tables;
mod transport;

pub use config::*;
pub use error::*;
pub use interface::*;
pub use mock::*;
pub use prompt::*;
pub use reader::*;
pub use response::*;
pub use result::*;
pub use transport::*;
