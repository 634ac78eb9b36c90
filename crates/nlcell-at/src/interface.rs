//! The AT protocol engine.
//!
//! An [`Interface`] owns one [`Port`] and serializes everything that happens
//! on it: command/response exchanges, notification waits, prompt-mode payload
//! writes and raw reads. There is no background reader. Whatever the caller
//! is waiting for is the only thing consuming input.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use log::{debug, info, trace, warn};
use regex::Regex;

use crate::config::InterfaceConfig;
use crate::error::{AtError, AtResult};
use crate::prompt::Prompt;
use crate::reader::Lines;
use crate::response::Response;
use crate::transport::{Port, SerialPort};

/// Written before every command to claim the channel.
const SYNC_PREFIX: &[u8] = b"AT";

/// Upper bound on buffered lines discarded before a command.
const MAX_DRAIN_LINES: usize = 64;

/// A command/response and notification engine over a byte channel.
pub struct Interface {
    port: Box<dyn Port>,
    config: InterfaceConfig,
}

impl Interface {
    /// Open a serial device and wrap it.
    pub fn open(path: &str, config: InterfaceConfig) -> AtResult<Self> {
        let port = SerialPort::open(path, config.baud_rate, config.flow_control, config.timeout())?;
        Self::new(Box::new(port), config)
    }

    /// Wrap an existing channel, discarding anything already buffered on it.
    pub fn new(mut port: Box<dyn Port>, config: InterfaceConfig) -> AtResult<Self> {
        port.set_timeout(config.timeout())?;
        loop {
            port.clear()?;
            let leftover = port.drain()?;
            if leftover.is_empty() {
                break;
            }
            trace!("discarded {} stale bytes on {}", leftover.len(), port.name());
        }

        Ok(Interface { port, config })
    }

    /// Wrap a channel with the default configuration.
    pub fn with_port(port: impl Port + 'static) -> AtResult<Self> {
        Self::new(Box::new(port), InterfaceConfig::default())
    }

    /// The active configuration.
    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// The channel's name.
    pub fn port_name(&self) -> String {
        self.port.name()
    }

    /// The default deadline used when a call passes `None`.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Change the default deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    /// The channel's line rate.
    pub fn baud_rate(&self) -> AtResult<u32> {
        self.port.baud_rate()
    }

    /// Change the channel's line rate.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> AtResult<()> {
        self.port.set_baud_rate(baud_rate)?;
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    /// Whether RTS/CTS flow control is configured.
    pub fn flow_control(&self) -> bool {
        self.config.flow_control
    }

    /// Enable or disable RTS/CTS flow control.
    pub fn set_flow_control(&mut self, enabled: bool) -> AtResult<()> {
        self.port.set_flow_control(enabled)?;
        self.config.flow_control = enabled;
        Ok(())
    }

    /// Read lines under a single deadline. See [`Lines`].
    pub fn lines(&mut self, timeout: Option<Duration>) -> Lines<'_> {
        let timeout = timeout.unwrap_or_else(|| self.config.timeout());
        Lines::new(self.port.as_mut(), timeout)
    }

    // ========================================================================
    // Raw access
    // ========================================================================

    /// Write bytes with no framing.
    pub fn write_raw(&mut self, data: &[u8]) -> AtResult<()> {
        let written = self.port.write(data)?;
        if written != data.len() {
            warn!("failed to write {}", data.escape_ascii());
            return Err(AtError::WriteFailed {
                written,
                expected: data.len(),
            });
        }
        Ok(())
    }

    /// Read up to `size` raw bytes, stopping early at the deadline.
    pub fn read_raw(&mut self, size: usize, timeout: Option<Duration>) -> AtResult<Vec<u8>> {
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.config.timeout());
        let mut data = Vec::with_capacity(size);

        while data.len() < size {
            self.port.set_timeout(deadline.saturating_duration_since(Instant::now()))?;
            let chunk = self.port.read(size - data.len())?;
            data.extend_from_slice(&chunk);
            if Instant::now() >= deadline {
                break;
            }
        }

        if data.len() < size {
            debug!("raw read returned {} of {} bytes", data.len(), size);
        }
        Ok(data)
    }

    /// Read single bytes until `pattern` matches the bytes read so far.
    ///
    /// Returns `false` if the deadline passes first. The bytes read are
    /// consumed either way.
    pub fn wait_for_pattern(&mut self, pattern: &str, timeout: Option<Duration>) -> AtResult<bool> {
        let regex = regex::bytes::Regex::new(pattern)?;
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.config.timeout());
        let mut buffer = BytesMut::new();

        loop {
            self.port.set_timeout(deadline.saturating_duration_since(Instant::now()))?;
            let byte = self.port.read(1)?;
            if !byte.is_empty() {
                buffer.extend_from_slice(&byte);
                if regex.is_match(&buffer) {
                    trace!("matched {:?} in {}", pattern, buffer.escape_ascii());
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                debug!("no match for {:?} in {}", pattern, buffer.escape_ascii());
                return Ok(false);
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start a command without waiting for its reply.
    ///
    /// Writes the sync prefix, drops every complete line already buffered, then
    /// writes the rest of the command with the send terminator. Returns the
    /// command as it will be echoed, for filtering the reply.
    pub fn begin_command(&mut self, command: &str) -> AtResult<String> {
        self.write_raw(SYNC_PREFIX)?;

        // Each zero-deadline pass reads at most one line
        for _ in 0..MAX_DRAIN_LINES {
            let Some(line) = self.lines(Some(Duration::ZERO)).next() else {
                break;
            };
            debug!("discarding buffered {:?}", line?);
        }

        let command = command.trim_end_matches(['\r', '\n']);
        let body = match command.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("AT") => &command[2..],
            _ => command,
        };

        let canonical = format!("AT{}", body);
        info!("sending {:?}", canonical);

        let wire = format!("{}{}", body, self.config.send_terminator);
        self.write_raw(wire.as_bytes())?;

        Ok(canonical)
    }

    /// Accumulate lines until they end in a status line.
    pub fn wait_for_response(&mut self, command: Option<&str>, timeout: Option<Duration>) -> AtResult<Response> {
        let newline = self.config.newline.clone();
        let mut data = Vec::new();
        let mut lines = self.lines(timeout);

        while let Some(line) = lines.next_bytes() {
            data.extend_from_slice(&line?);
            if let Some(response) = Response::parse_bytes(&data, command, &newline) {
                debug!("received {:?}", response.to_string());
                return Ok(response);
            }
        }

        warn!("timeout waiting for response, have {}", data.escape_ascii());
        Err(AtError::Timeout(match command {
            Some(command) => format!("response to {}", command),
            None => "response".to_string(),
        }))
    }

    /// Send a command and wait for its reply using the default deadline.
    ///
    /// A reply carrying `ERROR` is still `Ok`: inspect
    /// [`Response::is_ok`]. Only channel failures and timeouts are errors.
    pub fn send_command(&mut self, command: &str) -> AtResult<Response> {
        self.send_command_with_timeout(command, self.config.timeout())
    }

    /// Send a command and wait up to `timeout` for its reply.
    pub fn send_command_with_timeout(&mut self, command: &str, timeout: Duration) -> AtResult<Response> {
        let canonical = self.begin_command(command)?;
        self.wait_for_response(Some(&canonical), Some(timeout))
    }

    /// Begin an interactive command that takes a raw payload.
    ///
    /// With `dynamic` set the payload is terminated by writing `0x1A`;
    /// otherwise the device expects a length announced in the command.
    pub fn start_prompt(&mut self, dynamic: bool) -> Prompt<'_> {
        Prompt::new(self, dynamic)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn next_urc(&mut self, pattern: Option<&Regex>, timeout: Option<Duration>) -> AtResult<String> {
        for line in self.lines(timeout) {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if pattern.map_or(true, |p| p.is_match(line)) {
                debug!("notification {:?}", line);
                return Ok(line.to_string());
            }
            trace!("skipping {:?}", line);
        }

        Err(AtError::Timeout(match pattern {
            Some(pattern) => format!("notification matching {:?}", pattern.as_str()),
            None => "notification".to_string(),
        }))
    }

    /// Wait for one notification, optionally matching `pattern` anywhere in the
    /// line. Blank lines and non-matching lines are consumed and skipped.
    pub fn get_urc(&mut self, pattern: Option<&str>, timeout: Option<Duration>) -> AtResult<String> {
        let pattern = pattern.map(Regex::new).transpose()?;
        self.next_urc(pattern.as_ref(), timeout)
    }

    /// A lazy stream of notifications, each waited for with a fresh `timeout`.
    ///
    /// The stream ends quietly at the first timeout.
    pub fn urcs(&mut self, pattern: Option<&str>, timeout: Option<Duration>) -> AtResult<Urcs<'_>> {
        let pattern = pattern.map(Regex::new).transpose()?;
        Ok(Urcs {
            interface: self,
            pattern,
            timeout,
            done: false,
        })
    }
}

/// Notifications read one at a time until a wait times out.
pub struct Urcs<'a> {
    interface: &'a mut Interface,
    pattern: Option<Regex>,
    timeout: Option<Duration>,
    done: bool,
}

impl Iterator for Urcs<'_> {
    type Item = AtResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.interface.next_urc(self.pattern.as_ref(), self.timeout) {
            Ok(line) => Some(Ok(line)),
            Err(e) if e.is_timeout() => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
