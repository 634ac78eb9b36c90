//! Interactive commands that take a raw payload before completing.

use std::time::Duration;

use log::warn;

use crate::error::AtResult;
use crate::interface::Interface;
use crate::response::Response;

/// ASCII SUB, which ends a dynamic-length payload.
pub const PAYLOAD_TERMINATOR: u8 = 0x1A;

/// A command in payload-receiving mode.
///
/// The device stays in payload mode until the exchange is finished or times
/// out, so every started prompt should reach [`finish`](Self::finish). If a
/// dynamic prompt is dropped early, the terminator is still written so the
/// device returns to command mode.
pub struct Prompt<'a> {
    interface: &'a mut Interface,
    dynamic: bool,
    command: Option<String>,
    finished: bool,
}

impl<'a> Prompt<'a> {
    pub(crate) fn new(interface: &'a mut Interface, dynamic: bool) -> Self {
        Prompt {
            interface,
            dynamic,
            command: None,
            finished: false,
        }
    }

    /// Whether the payload is ended with [`PAYLOAD_TERMINATOR`].
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Begin the command without waiting for a reply.
    pub fn start_command(&mut self, command: &str) -> AtResult<()> {
        let canonical = self.interface.begin_command(command)?;
        self.command = Some(canonical);
        Ok(())
    }

    /// Write payload bytes as-is.
    pub fn write_data(&mut self, data: &[u8]) -> AtResult<()> {
        self.interface.write_raw(data)
    }

    /// End the payload and wait for the command's reply.
    pub fn finish(mut self, timeout: Option<Duration>) -> AtResult<Response> {
        self.finished = true;
        if self.dynamic {
            self.interface.write_raw(&[PAYLOAD_TERMINATOR])?;
        }
        let command = self.command.take();
        self.interface.wait_for_response(command.as_deref(), timeout)
    }
}

impl Drop for Prompt<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(command) = &self.command {
            warn!("prompt for {:?} abandoned before finishing", command);
            if self.dynamic {
                if let Err(e) = self.interface.write_raw(&[PAYLOAD_TERMINATOR]) {
                    warn!("failed to terminate payload: {}", e);
                }
            }
        }
    }
}
