//! Skywire Nano sockets (`AT#XSOCKET`, `AT#XTCP*`).

use std::time::Duration;

use nlcell_at::Interface;
use tracing::debug;

use super::{Dialect, SocketKind, SocketOptions};
use crate::error::{expect_ok, ModemError, Result, SocketError};

/// Socket creation and connection can wait on the network.
const SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time on top of the device-side receive timeout.
const RECV_MARGIN: Duration = Duration::from_secs(5);

/// Value after the `:` of a `#XNAME: value` line.
fn field_value(line: &str) -> Option<&str> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != 2 {
        return None;
    }
    Some(fields[1].trim())
}

/// Ids of the sockets listed in an `AT#XSOCKET?` reply.
fn existing_ids(lines: &[&str]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(_, rest)| {
            let fields: Vec<&str> = rest.trim().split(',').collect();
            if fields.len() < 3 {
                return None;
            }
            fields[0].trim().parse().ok()
        })
        .collect()
}

/// Split `AT#XTCPRECV` output into its declared size and payload.
fn split_received(output: &[u8]) -> Option<(usize, &[u8])> {
    let colon = output.iter().position(|&b| b == b':')?;
    let rest = &output[colon + 1..];
    let comma = rest.iter().position(|&b| b == b',')?;
    let size = std::str::from_utf8(&rest[..comma]).ok()?.trim().parse().ok()?;
    Some((size, &rest[comma + 1..]))
}

/// A socket on a Skywire Nano.
#[derive(Debug)]
pub struct NanoDialect {
    kind: SocketKind,
    fileno: Option<u32>,
    id: Option<u32>,
}

impl NanoDialect {
    pub fn new(options: &SocketOptions) -> Self {
        NanoDialect {
            kind: options.kind,
            fileno: options.fileno,
            id: None,
        }
    }

    fn kind_code(&self) -> u32 {
        match self.kind {
            SocketKind::Stream => 1,
            SocketKind::Datagram => 2,
        }
    }

    fn id_or_err(&self) -> Result<u32> {
        self.id.ok_or_else(|| SocketError::NotConnected.into())
    }
}

impl Dialect for NanoDialect {
    fn create(&mut self, at: &mut Interface) -> Result<()> {
        let response = expect_ok(at.send_command("AT#XSOCKET?")?, "failed to list sockets")?;
        let existing = existing_ids(&response.lines());

        if let Some(fileno) = self.fileno {
            if !existing.contains(&fileno) {
                return Err(SocketError::UnknownFileno(fileno).into());
            }
            debug!(id = fileno, "bound to existing socket");
            self.id = Some(fileno);
            return Ok(());
        }

        let mut candidate = 1;
        while existing.contains(&candidate) {
            candidate += 1;
        }

        let command = format!("AT#XSOCKET={},1,{}", candidate, self.kind_code());
        let response = expect_ok(
            at.send_command_with_timeout(&command, SETUP_TIMEOUT)?,
            "failed to create socket",
        )?;

        let lines = response.lines();
        let first = lines.first().copied().unwrap_or_default();
        let id = field_value(first)
            .and_then(|value| {
                let fields: Vec<&str> = value.split(',').collect();
                if fields.len() != 2 {
                    return None;
                }
                fields[0].trim().parse::<u32>().ok()
            })
            .ok_or_else(|| ModemError::protocol("invalid socket creation reply", response.output()))?;

        self.id = Some(id);
        Ok(())
    }

    fn connect(&mut self, at: &mut Interface, host: &str, port: u16) -> Result<()> {
        let id = self.id_or_err()?;
        let address = format!("{}:{}", host, port);
        let command = format!("AT#XTCPCONN={},\"{}\",{}", id, host, port);
        let response = at.send_command_with_timeout(&command, SETUP_TIMEOUT)?;
        if !response.is_ok() {
            return Err(SocketError::connect_failed(address, Some(response)).into());
        }

        let connected = response
            .lines()
            .first()
            .and_then(|line| field_value(line))
            .and_then(|value| value.parse::<u32>().ok())
            .ok_or_else(|| ModemError::protocol("invalid connect reply", response.output()))?;

        if connected == 0 {
            return Err(SocketError::connect_failed(address, Some(response)).into());
        }
        Ok(())
    }

    fn send(&mut self, at: &mut Interface, data: &[u8]) -> Result<usize> {
        let id = self.id_or_err()?;

        let mut prompt = at.start_prompt(false);
        prompt.start_command(&format!("AT#XTCPSEND={},{}", id, data.len()))?;
        prompt.write_data(data)?;
        let response = expect_ok(prompt.finish(None)?, "failed to send")?;

        // Data may be echoed ahead of the count, so only the last line counts
        let lines = response.lines();
        lines
            .last()
            .and_then(|line| field_value(line))
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(|| ModemError::protocol("invalid send reply", response.output()))
    }

    fn recv(&mut self, at: &mut Interface, size: usize, timeout: Duration) -> Result<Vec<u8>> {
        let id = self.id_or_err()?;
        let command = format!("AT#XTCPRECV={},{},{}", id, size, timeout.as_secs());
        let response = at.send_command_with_timeout(&command, timeout + RECV_MARGIN)?;

        if !response.is_ok() {
            debug!(id, result = %response.result(), "receive failed, returning nothing");
            return Ok(Vec::new());
        }

        let (declared, payload) = split_received(response.output_bytes())
            .ok_or_else(|| ModemError::protocol("invalid receive reply", response.output()))?;

        if declared != payload.len() {
            debug!(id, declared, actual = payload.len(), "receive size mismatch, returning nothing");
            return Ok(Vec::new());
        }
        Ok(payload.to_vec())
    }

    fn close(&mut self, at: &mut Interface) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };

        expect_ok(
            at.send_command(&format!("AT#XSOCKET={},0", id))?,
            &format!("failed to close socket {}", id),
        )?;
        self.id = None;
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_ids() {
        let lines = ["#XSOCKET: 1,1,6", "#XSOCKET: 3,2,17", "#XSOCKET: 4,1", "garbage"];
        assert_eq!(existing_ids(&lines), vec![1, 3]);
    }

    #[test]
    fn test_split_received() {
        assert_eq!(split_received(b"#XTCPRECV: 5,hello"), Some((5, &b"hello"[..])));
        assert_eq!(split_received(b"#XTCPRECV: 3,a,b"), Some((3, &b"a,b"[..])));
        assert_eq!(split_received(b"#XTCPRECV: 0,"), Some((0, &b""[..])));
        assert_eq!(split_received(b"#XTCPRECV: 2,\xff\x00"), Some((2, &[0xff, 0x00][..])));
        assert_eq!(split_received(b"#XTCPRECV 5,hello"), None);
        assert_eq!(split_received(b"#XTCPRECV: x,hello"), None);
    }

    #[test]
    fn test_field_value() {
        assert_eq!(field_value("#XTCPSEND: 12"), Some("12"));
        assert_eq!(field_value("#XTCPSEND 12"), None);
        assert_eq!(field_value("a:b:c"), None);
    }
}
