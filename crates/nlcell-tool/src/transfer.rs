//! XMODEM sender for firmware images.
//!
//! The Skywire Nano bootloader receives images on its kernel-log port with
//! XMODEM: 1024-byte `STX` blocks by default, 128-byte `SOH` blocks when the
//! packet size is lowered. The receiver picks the error check by what it
//! sends to start the transfer: `C` for CRC-16, `NAK` for an additive
//! checksum.

use std::time::{Duration, Instant};

use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_16_XMODEM};
use nlcell_at::Port;
use nlcell_modem::host::ChunkedTransfer;
use tracing::{debug, trace, warn};

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const EOT: u8 = 0x04;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
pub const CAN: u8 = 0x18;

/// Receiver request for CRC-16 blocks.
pub const CRC_START: u8 = b'C';

/// Fill for the unused tail of the last block.
pub const PAD: u8 = 0x1A;

const XMODEM_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Block payload sizes.
const SMALL_BLOCK: usize = 128;
const LARGE_BLOCK: usize = 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RETRIES: usize = 16;

/// Error check the receiver asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Crc,
    Checksum,
}

/// Build one block: header, sequence and its complement, padded payload,
/// then the error check.
fn build_block(sequence: u8, chunk: &[u8], size: usize, check: Check) -> BytesMut {
    let mut block = BytesMut::with_capacity(size + 5);
    block.put_u8(if size == LARGE_BLOCK { STX } else { SOH });
    block.put_u8(sequence);
    block.put_u8(!sequence);
    block.put_slice(chunk);
    block.put_bytes(PAD, size - chunk.len());

    match check {
        Check::Crc => {
            let crc = XMODEM_CRC.checksum(&block[3..]);
            block.put_u16(crc);
        }
        Check::Checksum => {
            let sum = block[3..].iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
            block.put_u8(sum);
        }
    }
    block
}

/// An XMODEM / XMODEM-1K sender.
#[derive(Debug)]
pub struct Xmodem {
    packet_size: usize,
    timeout: Duration,
    retries: usize,
}

impl Xmodem {
    pub fn new() -> Self {
        Xmodem {
            packet_size: LARGE_BLOCK,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    /// How long to wait for each reply from the receiver.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many times a block, the start or the end is retried.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Read until one of `wanted` arrives. Other bytes are log noise.
    fn wait_for(&self, channel: &mut dyn Port, wanted: &[u8]) -> nlcell_modem::Result<Option<u8>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            channel.set_timeout(deadline.saturating_duration_since(Instant::now()))?;
            if let Some(&byte) = channel.read(1)?.first() {
                if wanted.contains(&byte) {
                    return Ok(Some(byte));
                }
                trace!(byte, "ignoring byte while waiting for receiver");
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn wait_for_start(&self, channel: &mut dyn Port) -> nlcell_modem::Result<Option<Check>> {
        for _ in 0..self.retries {
            match self.wait_for(channel, &[CRC_START, NAK, CAN])? {
                Some(CRC_START) => return Ok(Some(Check::Crc)),
                Some(NAK) => return Ok(Some(Check::Checksum)),
                Some(_) => {
                    warn!("receiver cancelled before the transfer started");
                    return Ok(None);
                }
                None => continue,
            }
        }
        warn!("receiver never requested a transfer");
        Ok(None)
    }

    /// Send `frame` until it is acknowledged. `false` if the receiver
    /// cancels or the retries run out.
    fn send_acknowledged(&self, channel: &mut dyn Port, frame: &[u8], what: &str) -> nlcell_modem::Result<bool> {
        for attempt in 0..self.retries {
            let written = channel.write(frame)?;
            if written != frame.len() {
                warn!(written, expected = frame.len(), "short write of {}", what);
                return Ok(false);
            }

            match self.wait_for(channel, &[ACK, NAK, CAN])? {
                Some(ACK) => return Ok(true),
                Some(CAN) => {
                    warn!("receiver cancelled during {}", what);
                    return Ok(false);
                }
                reply => debug!(attempt, nak = reply.is_some(), "resending {}", what),
            }
        }
        warn!(retries = self.retries, "{} was never acknowledged", what);
        Ok(false)
    }
}

impl Default for Xmodem {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedTransfer for Xmodem {
    fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Only the two block sizes exist; anything below 1024 selects 128.
    fn set_packet_size(&mut self, size: usize) {
        self.packet_size = if size >= LARGE_BLOCK { LARGE_BLOCK } else { SMALL_BLOCK };
    }

    fn transfer(&mut self, data: &[u8], channel: &mut dyn Port) -> nlcell_modem::Result<bool> {
        let Some(check) = self.wait_for_start(channel)? else {
            return Ok(false);
        };
        debug!(?check, packet_size = self.packet_size, "receiver ready");

        let mut sequence: u8 = 1;
        for (i, chunk) in data.chunks(self.packet_size).enumerate() {
            let block = build_block(sequence, chunk, self.packet_size, check);
            if !self.send_acknowledged(channel, &block, &format!("block {}", i + 1))? {
                return Ok(false);
            }
            trace!(block = i + 1, "block acknowledged");
            sequence = sequence.wrapping_add(1);
        }

        self.send_acknowledged(channel, &[EOT], "end of transmission")
    }
}
