//! Device firmware update.
//!
//! # Image Framing
//!
//! Every image is prefixed with a fixed-size header before it is pushed over
//! the kernel-log channel:
//!
//! ```text
//! +--------+--------+--------+---------------------+---------------+
//! | magic  | type   | length | zero padding        | payload...    |
//! | u32 LE | u32 LE | u32 LE | to HEADER_SIZE      |               |
//! +--------+--------+--------+---------------------+---------------+
//! ```
//!
//! An image that already starts with the magic is passed through as-is, so
//! formatting twice is harmless.
//!
//! # Completion
//!
//! The modem reports progress as `DFU: <type>[,<value>]` notifications on the
//! AT channel. See [`wait_for_finish`] for how they are interpreted.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use nlcell_at::{Interface, Port};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::{Position, Url};

use crate::error::{expect_ok, DfuError, ModemError, Result};
use crate::host::{ChunkedTransfer, DebugProbe};
use crate::modem::wait_for_boot;

/// Total size of the image header.
pub const HEADER_SIZE: usize = 64;

/// First word of every image header.
pub const MAGIC: u32 = 0xecce_1347;

/// Notification prefix for update progress.
const DFU_PATTERN: &str = "DFU: ";

/// Packet size the transfer codec defaults to.
const DEFAULT_PACKET_SIZE: usize = 1024;

/// Packet size used for images that fit in one default packet. The bootloader
/// stalls on a single full-size packet.
const SMALL_PACKET_SIZE: usize = 128;

// ============================================================================
// Image Types
// ============================================================================

/// The component an image updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ImageType {
    Stack = 0,
    Application = 1,
    Modem = 2,
    Key = 3,
    Partition = 4,
}

impl ImageType {
    /// All image types in wire order.
    pub const ALL: [ImageType; 5] = [
        ImageType::Stack,
        ImageType::Application,
        ImageType::Modem,
        ImageType::Key,
        ImageType::Partition,
    ];

    /// Whether the modem must reboot for the image to take effect.
    pub fn needs_reboot(self) -> bool {
        !matches!(self, ImageType::Key | ImageType::Partition)
    }

    /// Decode a wire value.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u32 == value)
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Stack => "stack",
            ImageType::Application => "application",
            ImageType::Modem => "modem",
            ImageType::Key => "key",
            ImageType::Partition => "partition",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown image type: {}", s))
    }
}

/// Prefix `data` with an image header unless it already has one.
pub fn format(data: &[u8], image: ImageType) -> Vec<u8> {
    if data.len() >= 4 && data[..4] == MAGIC.to_le_bytes() {
        debug!(len = data.len(), "image already formatted");
        return data.to_vec();
    }

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
    buf.put_u32_le(MAGIC);
    buf.put_u32_le(image as u32);
    buf.put_u32_le(data.len() as u32);
    buf.resize(HEADER_SIZE, 0);
    debug!(header = %hex::encode(&buf[..12]), %image, "formatted image");

    buf.extend_from_slice(data);
    buf.to_vec()
}

// ============================================================================
// Progress Events
// ============================================================================

/// A decoded `DFU:` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuEvent {
    /// The update failed with a device error code.
    Failure(u32),
    /// The update finished.
    Done,
    /// Progress, in device-defined units.
    Progress(u32),
    /// The modem is about to reboot into the bootloader to apply the image.
    Applying,
}

impl DfuEvent {
    /// Parse a notification line such as `DFU: 0,4`.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(':').collect();
        if fields.len() != 2 || fields[0].trim() != "DFU" {
            return Err(ModemError::protocol("invalid DFU notification", line));
        }

        let mut params = fields[1].split(',').map(str::trim);
        let kind = params
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| ModemError::protocol("invalid DFU event type", line))?;
        let value = params
            .next()
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| ModemError::protocol("invalid DFU event value", line))
            })
            .transpose()?;
        let required =
            || value.ok_or_else(|| ModemError::protocol("DFU event is missing its value", line));

        match kind {
            0 => Ok(DfuEvent::Failure(required()?)),
            1 => Ok(DfuEvent::Done),
            2 => Ok(DfuEvent::Progress(required()?)),
            3 => Ok(DfuEvent::Applying),
            _ => Err(ModemError::protocol("unknown DFU event type", line)),
        }
    }
}

// ============================================================================
// Timeouts
// ============================================================================

/// Waits used while updating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DfuTimeouts {
    /// Pause between triggering and transferring, so device logging settles.
    pub settle_ms: u64,
    /// Window for progress notifications before the modem reboots.
    pub pre_apply_ms: u64,
    /// Wait for the boot marker after the modem starts applying.
    pub boot_ms: u64,
    /// Window for completion notifications after boot.
    pub post_boot_ms: u64,
}

impl Default for DfuTimeouts {
    fn default() -> Self {
        DfuTimeouts {
            settle_ms: 1_000,
            pre_apply_ms: 30_000,
            boot_ms: 120_000,
            post_boot_ms: 2_000,
        }
    }
}

impl DfuTimeouts {
    /// Scale every wait down to `ms`, for tests against scripted channels.
    pub fn immediate(ms: u64) -> Self {
        DfuTimeouts {
            settle_ms: 0,
            pre_apply_ms: ms,
            boot_ms: ms,
            post_boot_ms: ms,
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn pre_apply(&self) -> Duration {
        Duration::from_millis(self.pre_apply_ms)
    }

    pub fn boot(&self) -> Duration {
        Duration::from_millis(self.boot_ms)
    }

    pub fn post_boot(&self) -> Duration {
        Duration::from_millis(self.post_boot_ms)
    }
}

// ============================================================================
// Completion Handshake
// ============================================================================

/// Follow `DFU:` notifications until the update is complete.
///
/// A `Done` before the modem reboots finishes immediately. `Applying` means
/// the modem is about to reboot; with `reboot` unset that is as far as this
/// waits. Otherwise the boot marker must follow, and at least one `Done`
/// must arrive shortly after it. A `Failure` at any point is an error.
pub fn wait_for_finish(at: &mut Interface, reboot: bool, timeouts: &DfuTimeouts) -> Result<()> {
    for urc in at.urcs(Some(DFU_PATTERN), Some(timeouts.pre_apply()))? {
        match DfuEvent::parse(&urc?)? {
            DfuEvent::Failure(code) => return Err(DfuError::Failed { code }.into()),
            DfuEvent::Done => {
                info!("update finished");
                return Ok(());
            }
            DfuEvent::Applying => {
                if !reboot {
                    info!("update staged, reboot suppressed");
                    return Ok(());
                }
                info!("applying update");
                break;
            }
            DfuEvent::Progress(progress) => debug!(progress, "update progress"),
        }
    }

    wait_for_boot(at, Some(timeouts.boot()))?;

    let mut done = 0;
    for urc in at.urcs(Some(DFU_PATTERN), Some(timeouts.post_boot()))? {
        let urc = urc?;
        match DfuEvent::parse(&urc)? {
            DfuEvent::Done => done += 1,
            DfuEvent::Failure(code) => return Err(DfuError::Failed { code }.into()),
            _ => return Err(DfuError::Unexpected(urc).into()),
        }
    }

    if done < 1 {
        return Err(DfuError::Incomplete.into());
    }

    info!("update applied");
    Ok(())
}

/// Build the `AT#XFOTA` command for a download URL.
pub fn fota_command(url: &str, reboot: bool) -> Result<String> {
    let url = Url::parse(url)?;
    let location = &url[Position::BeforeUsername..Position::AfterPort];
    let path = url.path().strip_prefix('/').unwrap_or(url.path());

    let mut command = format!("AT#XFOTA=\"{}\",\"{}\"", location, path);
    if !reboot {
        command.push_str(",,0");
    }
    Ok(command)
}

/// Have the modem download an image from `url` itself, then wait for it to
/// apply.
pub fn fota(at: &mut Interface, url: &str, reboot: bool, timeouts: &DfuTimeouts) -> Result<()> {
    let command = fota_command(url, reboot)?;
    info!(url, reboot, "starting FOTA");
    expect_ok(at.send_command(&command)?, "failed to start FOTA")?;
    wait_for_finish(at, reboot, timeouts)
}

// ============================================================================
// Updater
// ============================================================================

/// Drives one firmware update against whatever channels are available.
pub struct Updater<'a> {
    at: Option<&'a mut Interface>,
    kernel_log: Option<&'a mut dyn Port>,
    probe: Option<&'a mut dyn DebugProbe>,
    transfer: &'a mut dyn ChunkedTransfer,
    timeouts: DfuTimeouts,
}

impl<'a> Updater<'a> {
    /// Create an updater that pushes images with `transfer`.
    pub fn new(transfer: &'a mut dyn ChunkedTransfer) -> Self {
        Updater {
            at: None,
            kernel_log: None,
            probe: None,
            transfer,
            timeouts: DfuTimeouts::default(),
        }
    }

    /// Trigger and follow the update over this AT channel.
    pub fn with_at(mut self, at: &'a mut Interface) -> Self {
        self.at = Some(at);
        self
    }

    /// Carry the image over this channel.
    pub fn with_kernel_log(mut self, port: &'a mut dyn Port) -> Self {
        self.kernel_log = Some(port);
        self
    }

    /// Trigger through this probe when there is no AT channel.
    pub fn with_probe(mut self, probe: &'a mut dyn DebugProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Override the waits.
    pub fn with_timeouts(mut self, timeouts: DfuTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn trigger(&mut self, reboot: bool) -> Result<()> {
        if let Some(at) = self.at.as_deref_mut() {
            let command = if reboot { "AT#FWUPD=1" } else { "AT#FWUPD=1,0" };
            expect_ok(at.send_command(command)?, "failed to trigger firmware update")?;
            return Ok(());
        }

        if let Some(probe) = self.probe.as_deref_mut() {
            if probe.trigger_dfu(reboot)? {
                return Ok(());
            }
        }

        Err(DfuError::NoTrigger.into())
    }

    /// Upload an image and, if it needs one, wait through the reboot.
    pub fn upload(&mut self, data: &[u8], image: ImageType, reboot: bool) -> Result<()> {
        if self.kernel_log.is_none() {
            return Err(DfuError::NoLogChannel.into());
        }

        let payload = format(data, image);
        info!(%image, len = payload.len(), reboot, "starting update");

        self.trigger(reboot)?;
        thread::sleep(self.timeouts.settle());

        let packet_size = self.transfer.packet_size();
        if packet_size == DEFAULT_PACKET_SIZE && payload.len() <= DEFAULT_PACKET_SIZE {
            debug!(packet_size = SMALL_PACKET_SIZE, "small image, shrinking packets");
            self.transfer.set_packet_size(SMALL_PACKET_SIZE);
        }

        let channel = self.kernel_log.as_deref_mut().ok_or(DfuError::NoLogChannel)?;
        let transferred = self.transfer.transfer(&payload, channel);
        self.transfer.set_packet_size(packet_size);
        if !transferred? {
            return Err(DfuError::TransferFailed.into());
        }
        info!("image transferred");

        if !image.needs_reboot() || !reboot {
            return Ok(());
        }

        match self.at.as_deref_mut() {
            Some(at) => wait_for_finish(at, reboot, &self.timeouts),
            None => {
                warn!("no AT channel, cannot wait for the update to finish");
                Ok(())
            }
        }
    }
}
