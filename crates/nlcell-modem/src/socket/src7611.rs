//! SRC7611 sockets (`AT+KTCP*`).
//!
//! The modem needs the peer address to allocate a session, so the session is
//! configured and dialed together in `connect`. Payloads in both directions
//! are delimited by a `CONNECT` marker and [`EOF_PATTERN`].

use std::time::Duration;

use nlcell_at::Interface;
use tracing::{debug, warn};

use super::{Dialect, SocketKind, SocketOptions};
use crate::error::{expect_ok, ModemError, Result, SocketError};

/// End-of-data marker, the modem's default `AT+KPATTERN`.
pub const EOF_PATTERN: &str = "--EOF--Pattern--";

/// Marker the modem prints before payload data.
const CONNECT: &str = "CONNECT";

/// `CONNECT` plus its line terminator.
const CONNECT_LEN: usize = 9;

/// How long the modem has to report a dialed session as up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time on top of the device-side receive timeout.
const RECV_MARGIN: Duration = Duration::from_secs(5);

/// Pull the payload out of `AT+KTCPRCV` output.
///
/// The payload sits between the first `CONNECT` line and the last
/// [`EOF_PATTERN`]. It is raw data and need not be text.
pub fn extract_payload(output: &[u8]) -> Result<&[u8]> {
    let malformed = |message: &str| ModemError::protocol(message, String::from_utf8_lossy(output));

    let start = find(output, CONNECT.as_bytes())
        .ok_or_else(|| malformed("no CONNECT in receive output"))?;
    let end = rfind(output, EOF_PATTERN.as_bytes())
        .ok_or_else(|| malformed("no EOF pattern in receive output"))?;

    let start = start + CONNECT_LEN;
    if start > end {
        return Err(malformed("EOF pattern before CONNECT"));
    }
    Ok(&output[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

/// Sessions on an SRC7611.
#[derive(Debug, Default)]
pub struct Src7611Dialect {
    session: Option<u32>,
}

impl Src7611Dialect {
    /// TCP is the only transport supported.
    pub fn new(options: &SocketOptions) -> Result<Self> {
        if options.kind != SocketKind::Stream {
            return Err(ModemError::Unsupported("datagram sockets on the SRC7611".to_string()));
        }
        if options.fileno.is_some() {
            return Err(ModemError::Unsupported("binding existing sockets on the SRC7611".to_string()));
        }
        Ok(Src7611Dialect::default())
    }

    fn session(&self) -> Result<u32> {
        self.session.ok_or_else(|| SocketError::NotConnected.into())
    }

    fn delete(&mut self, at: &mut Interface) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };

        let response = at.send_command(&format!("AT+KTCPDEL={}", session))?;
        expect_ok(response, &format!("failed to delete session {}", session))?;
        self.session = None;
        Ok(())
    }

    fn dial(&mut self, at: &mut Interface, session: u32, address: &str) -> Result<()> {
        let response = at.send_command(&format!("AT+KTCPCNX={}", session))?;
        expect_ok(response, "failed to initiate connection")?;

        let pattern = format!(r"\+KTCP_IND: {},1", session);
        match at.get_urc(Some(&pattern), Some(CONNECT_TIMEOUT)) {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => Err(SocketError::connect_failed(address, None).into()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Dialect for Src7611Dialect {
    fn create(&mut self, at: &mut Interface) -> Result<()> {
        let response = expect_ok(at.send_command("AT+KCNXCFG?")?, "failed to query KCNXCFG")?;
        if !response.contains("+KCNXCFG:") {
            return Err(ModemError::usage("AT+KCNXCFG must be configured"));
        }
        Ok(())
    }

    fn connect(&mut self, at: &mut Interface, host: &str, port: u16) -> Result<()> {
        let address = format!("{}:{}", host, port);
        let command = format!("AT+KTCPCFG=1,0,\"{}\",{}", host, port);
        let response = expect_ok(at.send_command(&command)?, "failed to create session")?;

        let session = response
            .lines()
            .into_iter()
            .find(|line| line.contains("+KTCPCFG: "))
            .and_then(|line| line.split(' ').nth(1))
            .and_then(|id| id.trim().parse::<u32>().ok())
            .ok_or_else(|| ModemError::protocol("session id not in response", response.output()))?;

        debug!(session, "configured session");
        self.session = Some(session);

        if let Err(e) = self.dial(at, session, &address) {
            if let Err(cleanup) = self.delete(at) {
                warn!(session, "failed to delete session after failed connect: {}", cleanup);
            }
            self.session = None;
            return Err(e);
        }
        Ok(())
    }

    fn send(&mut self, at: &mut Interface, data: &[u8]) -> Result<usize> {
        let session = self.session()?;
        at.begin_command(&format!("AT+KTCPSND={},{}", session, data.len()))?;

        if !at.wait_for_pattern(CONNECT, None)? {
            return Err(ModemError::protocol("no CONNECT prompt for send", ""));
        }

        at.write_raw(data)?;
        at.write_raw(EOF_PATTERN.as_bytes())?;

        if !at.wait_for_pattern("OK\r\n", None)? {
            return Err(ModemError::protocol("send not acknowledged", ""));
        }
        Ok(data.len())
    }

    fn recv(&mut self, at: &mut Interface, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        let session = self.session()?;
        let command = format!("AT+KTCPRCV={},{}", session, size);
        let response = at.send_command_with_timeout(&command, timeout + RECV_MARGIN)?;

        if !response.is_ok() {
            debug!(session, result = %response.result(), "receive failed, returning nothing");
            return Ok(Vec::new());
        }

        Ok(extract_payload(response.output_bytes())?.to_vec())
    }

    fn close(&mut self, at: &mut Interface) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };

        let response = at.send_command(&format!("AT+KTCPCLOSE={}", session))?;
        if !response.is_ok() {
            debug!(session, result = %response.result(), "close refused, deleting anyway");
        }

        self.delete(at)
    }

    fn id(&self) -> Option<u32> {
        self.session
    }
}
