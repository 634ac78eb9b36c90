//! Integration tests for firmware updates.
//!
//! The AT channel and the kernel-log channel are both scripted; the bulk
//! transfer codec is replaced by a recorder that copies the image onto the
//! kernel-log channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nlcell_at::{Interface, InterfaceConfig, Port, ScriptedPort};
use nlcell_modem::dfu::{self, DfuTimeouts, ImageType, HEADER_SIZE, MAGIC};
use nlcell_modem::host::{ChunkedTransfer, DebugProbe};
use nlcell_modem::{DfuError, Model, Modem, ModemConfig, ModemError};

/// Records what it was asked to transfer.
struct RecordingTransfer {
    packet_size: usize,
    sizes_seen: Vec<usize>,
    images: Vec<Vec<u8>>,
    succeed: bool,
}

impl RecordingTransfer {
    fn new() -> Self {
        RecordingTransfer {
            packet_size: 1024,
            sizes_seen: Vec::new(),
            images: Vec::new(),
            succeed: true,
        }
    }
}

impl ChunkedTransfer for RecordingTransfer {
    fn packet_size(&self) -> usize {
        self.packet_size
    }

    fn set_packet_size(&mut self, size: usize) {
        self.packet_size = size;
    }

    fn transfer(&mut self, data: &[u8], channel: &mut dyn Port) -> nlcell_modem::Result<bool> {
        self.sizes_seen.push(self.packet_size);
        self.images.push(data.to_vec());
        channel.write(data)?;
        Ok(self.succeed)
    }
}

/// A probe that counts triggers.
struct CountingProbe {
    triggers: Arc<AtomicUsize>,
    accept: bool,
}

impl DebugProbe for CountingProbe {
    fn trigger_dfu(&mut self, _auto_reboot: bool) -> nlcell_modem::Result<bool> {
        self.triggers.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept)
    }
}

const OK_REPLY: &str = "\r\nOK\r\n";

fn config() -> ModemConfig {
    ModemConfig::default().with_dfu(DfuTimeouts::immediate(200))
}

/// Helper to build a Nano with scripted AT and kernel-log channels.
fn scripted_nano() -> (Modem, ScriptedPort, ScriptedPort) {
    let at_port = ScriptedPort::new();
    let log_port = ScriptedPort::new();
    let at_config = InterfaceConfig::default().with_timeout(Duration::from_millis(500));
    let at = Interface::new(Box::new(at_port.clone()), at_config).unwrap();
    let modem = Modem::new(config())
        .with_at(at)
        .with_kernel_log(log_port.clone());
    (modem, at_port, log_port)
}

// ============================================================================
// Header Framing
// ============================================================================

#[test]
fn test_format_keeps_existing_header() {
    let once = dfu::format(b"firmware", ImageType::Modem);
    assert_eq!(once.len(), HEADER_SIZE + 8);
    assert_eq!(&once[..4], &MAGIC.to_le_bytes());
    // The type of an already-framed image is not rewritten
    assert_eq!(dfu::format(&once, ImageType::Key), once);
}

// ============================================================================
// Upload
// ============================================================================

#[test]
fn test_upload_applying_boot_done_succeeds() {
    let (mut modem, at_port, log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write(
        "AT#FWUPD=1\r",
        "\r\nOK\r\n\r\nDFU: 2,50\r\n\r\nDFU: 3\r\n\r\nREADY\r\n\r\nDFU: 1\r\n",
    );

    modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap();

    assert_eq!(transfer.images.len(), 1);
    assert_eq!(transfer.images[0].len(), HEADER_SIZE + 5);
    assert_eq!(log_port.written(), transfer.images[0]);
    assert_eq!(at_port.pending_incoming(), 0);
}

#[test]
fn test_upload_failure_code_is_surfaced() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", "\r\nOK\r\n\r\nDFU: 2,10\r\n\r\nDFU: 0,4\r\n");

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Modem, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::Failed { code: 4 })));
}

#[test]
fn test_upload_failure_after_boot() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write(
        "AT#FWUPD=1\r",
        "\r\nOK\r\n\r\nDFU: 3\r\n\r\nREADY\r\n\r\nDFU: 0,7\r\n",
    );

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Stack, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::Failed { code: 7 })));
}

#[test]
fn test_upload_needs_done_after_boot() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", "\r\nOK\r\n\r\nDFU: 3\r\n\r\nREADY\r\n");

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Stack, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::Incomplete)));
}

#[test]
fn test_upload_unexpected_event_after_boot() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write(
        "AT#FWUPD=1\r",
        "\r\nOK\r\n\r\nDFU: 3\r\n\r\nREADY\r\n\r\nDFU: 2,100\r\n",
    );

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Stack, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::Unexpected(_))));
}

#[test]
fn test_upload_without_boot_marker() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", "\r\nOK\r\n\r\nDFU: 3\r\n");

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Stack, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::NoBoot));
}

#[test]
fn test_upload_done_before_reboot() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", "\r\nOK\r\n\r\nDFU: 1\r\n");

    modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap();
}

#[test]
fn test_upload_key_skips_completion() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", OK_REPLY);

    modem
        .upload(&mut transfer, b"key material", ImageType::Key, true)
        .unwrap();
    assert_eq!(transfer.images.len(), 1);
}

#[test]
fn test_upload_without_reboot() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1,0\r", OK_REPLY);

    modem
        .upload(&mut transfer, b"image", ImageType::Application, false)
        .unwrap();
    assert!(at_port.written_text().contains("AT#FWUPD=1,0\r"));
}

#[test]
fn test_upload_trigger_refused() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", "\r\n+CME ERROR: 3\r\n");

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Device { .. }));
    assert!(transfer.images.is_empty());
}

#[test]
fn test_upload_transfer_failure() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();
    transfer.succeed = false;

    at_port.on_write("AT#FWUPD=1\r", OK_REPLY);

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::TransferFailed)));
}

#[test]
fn test_small_image_uses_small_packets() {
    let (mut modem, at_port, _log_port) = scripted_nano();
    let mut transfer = RecordingTransfer::new();

    at_port.on_write("AT#FWUPD=1\r", OK_REPLY);
    modem
        .upload(&mut transfer, &[0u8; 100], ImageType::Key, true)
        .unwrap();

    at_port.on_write("AT#FWUPD=1\r", OK_REPLY);
    modem
        .upload(&mut transfer, &[0u8; 4096], ImageType::Key, true)
        .unwrap();

    assert_eq!(transfer.sizes_seen, vec![128, 1024]);
    assert_eq!(transfer.packet_size, 1024);
}

#[test]
fn test_upload_requires_kernel_log() {
    let at_port = ScriptedPort::new();
    let at = Interface::with_port(at_port.clone()).unwrap();
    let mut modem = Modem::new(config()).with_at(at);
    let mut transfer = RecordingTransfer::new();

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::NoLogChannel)));
    assert!(!at_port.written_text().contains("FWUPD"));
}

#[test]
fn test_upload_through_probe() {
    let triggers = Arc::new(AtomicUsize::new(0));
    let probe = CountingProbe {
        triggers: triggers.clone(),
        accept: true,
    };
    let mut modem = Modem::new(config())
        .with_kernel_log(ScriptedPort::new())
        .with_probe(probe);
    let mut transfer = RecordingTransfer::new();

    // No AT channel: the upload ends after the transfer
    modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap();
    assert_eq!(triggers.load(Ordering::SeqCst), 1);
    assert_eq!(transfer.images.len(), 1);
}

#[test]
fn test_upload_probe_refuses() {
    let probe = CountingProbe {
        triggers: Arc::new(AtomicUsize::new(0)),
        accept: false,
    };
    let mut modem = Modem::new(config())
        .with_kernel_log(ScriptedPort::new())
        .with_probe(probe);
    let mut transfer = RecordingTransfer::new();

    let err = modem
        .upload(&mut transfer, b"image", ImageType::Application, true)
        .unwrap_err();
    assert!(matches!(err, ModemError::Dfu(DfuError::NoTrigger)));
}

#[test]
fn test_upload_unsupported_model() {
    let mut modem = Modem::new(config().with_model(Model::Tg1wwg));
    let mut transfer = RecordingTransfer::new();
    assert!(matches!(
        modem.upload(&mut transfer, b"image", ImageType::Application, true),
        Err(ModemError::Unsupported(_))
    ));
}

// ============================================================================
// FOTA
// ============================================================================

#[test]
fn test_fota() {
    let (modem, at_port, _log_port) = scripted_nano();

    at_port.on_write(
        "AT#XFOTA=\"updates.example.com\",\"images/app.bin\"\r",
        "\r\nOK\r\n\r\nDFU: 3\r\n\r\nREADY\r\n\r\nDFU: 1\r\n",
    );

    modem
        .fota("https://updates.example.com/images/app.bin", true)
        .unwrap();
}

#[test]
fn test_fota_without_reboot() {
    let (modem, at_port, _log_port) = scripted_nano();

    at_port.on_write("AT#XFOTA=\"example.com\",\"app.bin\",,0\r", "\r\nOK\r\n\r\nDFU: 3\r\n");

    modem.fota("http://example.com/app.bin", false).unwrap();
}

#[test]
fn test_fota_bad_url() {
    let (modem, at_port, _log_port) = scripted_nano();
    assert!(matches!(
        modem.fota("example.com/app.bin", true),
        Err(ModemError::InvalidUrl(_))
    ));
    assert!(at_port.written().is_empty());
}
