//! TG1WWG sockets (`AT#SD`, `AT#SSENDEXT`, `AT#SRECV`, `AT#SH`).
//!
//! The modem has ten preconfigured connection ids. Creating a socket only
//! reserves one from the modem-wide [`IdPool`]; nothing is sent until
//! `connect`. A PDP context must be active first.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use nlcell_at::Interface;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Dialect, SocketKind, SocketOptions};
use crate::error::{expect_ok, ModemError, Result, SocketError};

/// Connection ids the modem provides.
pub const ID_RANGE: RangeInclusive<u32> = 1..=10;

/// Largest single receive.
pub const MAX_RECV: usize = 1500;

/// Default contexts to try activating, in order.
const DEFAULT_CONTEXTS: [u32; 2] = [1, 3];

const CONTEXT_TIMEOUT: Duration = Duration::from_secs(5);
const PROMPT_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Free connection ids. The lowest free id is always handed out first.
#[derive(Debug, Clone)]
pub struct IdPool {
    free: BTreeSet<u32>,
}

impl IdPool {
    /// A pool holding every id in `ids`.
    pub fn new(ids: RangeInclusive<u32>) -> Self {
        IdPool { free: ids.collect() }
    }

    /// Take the lowest free id.
    pub fn reserve(&mut self) -> Option<u32> {
        self.free.pop_first()
    }

    /// Return an id.
    pub fn release(&mut self, id: u32) {
        self.free.insert(id);
    }

    /// Number of free ids.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl Default for IdPool {
    fn default() -> Self {
        Self::new(ID_RANGE)
    }
}

/// An [`IdPool`] shared by every socket on one modem.
pub type SharedPool = Arc<Mutex<IdPool>>;

/// Count the active PDP contexts in an `AT#SGACT?` reply.
fn active_contexts(at: &mut Interface) -> Result<usize> {
    let response = expect_ok(
        at.send_command_with_timeout("AT#SGACT?", CONTEXT_TIMEOUT)?,
        "failed to query PDP contexts",
    )?;

    let mut active = 0;
    for line in response.lines() {
        if !line.contains("#SGACT: ") {
            continue;
        }
        let state = line
            .split(',')
            .nth(1)
            .and_then(|s| s.trim().parse::<u32>().ok())
            .ok_or_else(|| ModemError::protocol("invalid context state", line))?;
        if state == 1 {
            active += 1;
        }
    }
    Ok(active)
}

/// Make sure a PDP context is active, activating a default one if needed.
pub fn ensure_context(at: &mut Interface) -> Result<()> {
    if active_contexts(at)? > 0 {
        return Ok(());
    }

    let mut last = None;
    for context in DEFAULT_CONTEXTS {
        let response = at.send_command(&format!("AT#SGACT={},1", context))?;
        if response.is_ok() {
            info!(context, "activated PDP context");
            return Ok(());
        }
        last = Some(response);
    }

    match last {
        Some(response) => Err(ModemError::device("failed to activate a PDP context", response)),
        None => Err(ModemError::usage("no PDP contexts to activate")),
    }
}

/// A connection on a TG1WWG.
#[derive(Debug)]
pub struct Tg1wwgDialect {
    pool: SharedPool,
    id: Option<u32>,
}

impl Tg1wwgDialect {
    /// TCP is the only transport supported.
    pub fn new(pool: SharedPool, options: &SocketOptions) -> Result<Self> {
        if options.kind != SocketKind::Stream {
            return Err(ModemError::Unsupported("datagram sockets on the TG1WWG".to_string()));
        }
        if options.fileno.is_some() {
            return Err(ModemError::Unsupported("binding existing sockets on the TG1WWG".to_string()));
        }
        Ok(Tg1wwgDialect { pool, id: None })
    }

    fn id_or_err(&self) -> Result<u32> {
        self.id.ok_or_else(|| SocketError::NotConnected.into())
    }
}

impl Dialect for Tg1wwgDialect {
    fn create(&mut self, at: &mut Interface) -> Result<()> {
        ensure_context(at)?;

        let id = self.pool.lock().reserve().ok_or(SocketError::PoolExhausted)?;
        debug!(id, "reserved connection id");
        self.id = Some(id);
        Ok(())
    }

    fn connect(&mut self, at: &mut Interface, host: &str, port: u16) -> Result<()> {
        let id = self.id_or_err()?;
        let command = format!("AT#SD={},0,{},\"{}\",0,0,1", id, port, host);
        let response = at.send_command(&command)?;
        if !response.is_ok() {
            let address = format!("{}:{}", host, port);
            return Err(SocketError::connect_failed(address, Some(response)).into());
        }
        Ok(())
    }

    fn send(&mut self, at: &mut Interface, data: &[u8]) -> Result<usize> {
        let id = self.id_or_err()?;
        at.write_raw(format!("AT#SSENDEXT={},{}\r\n", id, data.len()).as_bytes())?;

        if !at.wait_for_pattern("> ", Some(PROMPT_TIMEOUT))? {
            return Err(ModemError::protocol("no prompt for send", ""));
        }

        at.write_raw(data)?;

        // The modem acknowledges once the payload has been taken
        let response = at.wait_for_response(None, None)?;
        expect_ok(response, "failed to send")?;
        Ok(data.len())
    }

    fn recv(&mut self, at: &mut Interface, size: usize, _timeout: Duration) -> Result<Vec<u8>> {
        if !(1..=MAX_RECV).contains(&size) {
            return Err(SocketError::InvalidSize {
                size,
                min: 1,
                max: MAX_RECV,
            }
            .into());
        }

        let id = self.id_or_err()?;
        at.write_raw(format!("AT#SRECV={},{}\r\n", id, size).as_bytes())?;

        let mut available = None;
        for line in at.lines(Some(RECV_TIMEOUT)) {
            let line = line?;
            if line.contains("#SRECV: ") {
                let size = line
                    .split(',')
                    .nth(1)
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .ok_or_else(|| ModemError::protocol("invalid receive size", line.as_str()))?;
                available = Some(size);
                break;
            }
        }

        let available =
            available.ok_or_else(|| ModemError::protocol("no #SRECV header in receive output", ""))?;
        let data = at.read_raw(available, None)?;

        if !at.wait_for_pattern("OK\r\n", None)? {
            return Err(ModemError::protocol("no OK after receive", ""));
        }
        Ok(data)
    }

    fn close(&mut self, at: &mut Interface) -> Result<()> {
        let Some(id) = self.id else {
            return Ok(());
        };

        expect_ok(
            at.send_command(&format!("AT#SH={}", id))?,
            &format!("failed to shut down connection {}", id),
        )?;

        self.pool.lock().release(id);
        self.id = None;
        debug!(id, "released connection id");
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        self.id
    }
}
