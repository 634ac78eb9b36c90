//! The duplex byte channel underneath the AT engine.
//!
//! [`Port`] is deliberately small: timed reads, writes and buffer resets. The
//! serial implementation wraps the `serialport` crate; tests use
//! [`ScriptedPort`](crate::ScriptedPort).

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::AtResult;

/// A raw duplex byte channel with a configurable read timeout.
pub trait Port: Send {
    /// A human readable name for logging.
    fn name(&self) -> String;

    /// The current read timeout.
    fn timeout(&self) -> Duration;

    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> AtResult<()>;

    /// Write bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> AtResult<usize>;

    /// Read up to `max` bytes, waiting at most the read timeout.
    ///
    /// May return fewer bytes than requested, including none.
    fn read(&mut self, max: usize) -> AtResult<Vec<u8>>;

    /// Read through the next `\n`, waiting at most the read timeout.
    ///
    /// On timeout the partial data read so far is returned without a
    /// terminator.
    fn read_line(&mut self) -> AtResult<Vec<u8>>;

    /// Read whatever is immediately available without waiting.
    fn drain(&mut self) -> AtResult<Vec<u8>>;

    /// Discard everything in the input and output buffers.
    fn clear(&mut self) -> AtResult<()>;

    /// The line rate, for channels that have one.
    fn baud_rate(&self) -> AtResult<u32>;

    /// Change the line rate.
    fn set_baud_rate(&mut self, baud_rate: u32) -> AtResult<()>;

    /// Enable or disable RTS/CTS flow control.
    fn set_flow_control(&mut self, enabled: bool) -> AtResult<()>;
}

/// A [`Port`] backed by a host serial device.
pub struct SerialPort {
    inner: Box<dyn serialport::SerialPort>,
}

impl SerialPort {
    /// Open a serial device.
    pub fn open(path: &str, baud_rate: u32, flow_control: bool, timeout: Duration) -> AtResult<Self> {
        let flow = if flow_control {
            serialport::FlowControl::Hardware
        } else {
            serialport::FlowControl::None
        };

        let inner = serialport::new(path, baud_rate)
            .timeout(timeout)
            .flow_control(flow)
            .open()?;

        debug!("opened {} at {} baud", path, baud_rate);
        Ok(SerialPort { inner })
    }

    /// Wrap an already opened device.
    pub fn from_inner(inner: Box<dyn serialport::SerialPort>) -> Self {
        SerialPort { inner }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

impl Port for SerialPort {
    fn name(&self) -> String {
        self.inner.name().unwrap_or_else(|| "serial".to_string())
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> AtResult<()> {
        if self.inner.timeout() != timeout {
            self.inner.set_timeout(timeout)?;
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> AtResult<usize> {
        let written = self.inner.write(data)?;
        self.inner.flush()?;
        trace!("{} <- {}", self.name(), data.escape_ascii());
        Ok(written)
    }

    fn read(&mut self, max: usize) -> AtResult<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let mut filled = 0;
        let deadline = Instant::now() + self.inner.timeout();

        while filled < max {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn read_line(&mut self) -> AtResult<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        let deadline = Instant::now() + self.inner.timeout();

        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        Ok(line)
    }

    fn drain(&mut self) -> AtResult<Vec<u8>> {
        let available = self.inner.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        match self.inner.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if is_timeout(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&mut self) -> AtResult<()> {
        self.inner.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn baud_rate(&self) -> AtResult<u32> {
        Ok(self.inner.baud_rate()?)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> AtResult<()> {
        self.inner.set_baud_rate(baud_rate)?;
        Ok(())
    }

    fn set_flow_control(&mut self, enabled: bool) -> AtResult<()> {
        let flow = if enabled {
            serialport::FlowControl::Hardware
        } else {
            serialport::FlowControl::None
        };
        self.inner.set_flow_control(flow)?;
        Ok(())
    }
}
