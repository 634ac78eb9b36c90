//! Integration tests for the modem facade against a scripted AT channel.

use std::sync::Arc;
use std::time::Duration;

use nlcell_at::{Interface, InterfaceConfig, ResultCode, ScriptedPort};
use nlcell_modem::{Entry, Key, Model, Modem, ModemConfig, ModemError, NetworkMode};
use parking_lot::Mutex;

const OK: &str = "\r\nOK\r\n";

/// Helper to build a modem over a scripted AT channel.
fn scripted_modem(model: Model) -> (Modem, ScriptedPort) {
    let port = ScriptedPort::new();
    let config = InterfaceConfig::default().with_timeout(Duration::from_millis(500));
    let at = Interface::new(Box::new(port.clone()), config).unwrap();
    let modem = Modem::new(ModemConfig::default().with_model(model)).with_at(at);
    (modem, port)
}

/// Board actions seen by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostAction {
    Pin(String, bool),
    Reset,
}

/// A host board that records what it was asked to do. A reset can script
/// the modem's boot marker.
struct RecordingHost {
    actions: Arc<Mutex<Vec<HostAction>>>,
    boot_on_reset: Option<ScriptedPort>,
}

impl nlcell_modem::host::Host for RecordingHost {
    fn write_pin(&mut self, name: &str, state: bool) -> nlcell_modem::Result<()> {
        self.actions.lock().push(HostAction::Pin(name.to_string(), state));
        Ok(())
    }

    fn reset(&mut self) -> nlcell_modem::Result<()> {
        self.actions.lock().push(HostAction::Reset);
        if let Some(port) = &self.boot_on_reset {
            port.push_incoming("\r\nREADY\r\n");
        }
        Ok(())
    }
}

// ============================================================================
// Power
// ============================================================================

#[test]
fn test_nano_reboot_waits_for_reset() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#REBOOT\r", "\r\nOK\r\n\r\n+RESET\r\n");

    modem.reboot().unwrap();
    assert_eq!(port.pending_incoming(), 0);
}

#[test]
fn test_nano_reboot_without_reset_times_out() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#REBOOT\r", OK);

    let err = modem.reboot().unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_tg1wwg_power() {
    let (modem, port) = scripted_modem(Model::Tg1wwg);
    port.on_write("AT#ENHRST=1,0\r", OK);
    port.on_write("AT#SHDN\r", OK);

    modem.reboot().unwrap();
    modem.shutdown().unwrap();
    assert_eq!(port.pending_rules(), 0);
}

#[test]
fn test_tg1wwg_power_refused() {
    let (modem, port) = scripted_modem(Model::Tg1wwg);
    port.on_write("AT#ENHRST=1,0\r", "\r\nERROR\r\n");
    port.on_write("AT#SHDN\r", "\r\n+CME ERROR: 4\r\n");

    let err = modem.reboot().unwrap_err();
    assert!(matches!(err, ModemError::Device { .. }));
    assert_eq!(err.result(), Some(ResultCode::GenericError));

    let err = modem.shutdown().unwrap_err();
    assert!(matches!(err, ModemError::Device { .. }));
    assert_eq!(err.result(), Some(ResultCode::cme(4)));
}

#[test]
fn test_nano_refused_reboot_does_not_wait_for_reset() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#REBOOT\r", "\r\n+CME ERROR: 3\r\n");
    port.on_write("AT#SHUTDOWN\r", "\r\nERROR\r\n");

    let started = std::time::Instant::now();
    let err = modem.reboot().unwrap_err();
    assert!(matches!(err, ModemError::Device { .. }));
    assert!(!err.is_timeout());

    let err = modem.shutdown().unwrap_err();
    assert!(matches!(err, ModemError::Device { .. }));
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_wait_for_boot() {
    let (modem, port) = scripted_modem(Model::Nano);

    port.push_incoming("\r\n+CEREG: 2\r\n\r\nREADY\r\n");
    modem.wait_for_boot(None).unwrap();

    let err = modem
        .wait_for_boot(Some(Duration::from_millis(50)))
        .unwrap_err();
    assert!(matches!(err, ModemError::NoBoot));
}

#[test]
fn test_serial_bootloader_recovery() {
    let (modem, port) = scripted_modem(Model::Nano);
    let actions = Arc::new(Mutex::new(Vec::new()));
    let mut modem = modem.with_host(RecordingHost {
        actions: actions.clone(),
        boot_on_reset: Some(port.clone()),
    });

    port.on_write("AT#SHUTDOWN\r", "\r\nOK\r\n\r\n+SHUTDOWN\r\n");
    modem.enter_serial_bootloader_recovery().unwrap();
    assert_eq!(
        *actions.lock(),
        vec![HostAction::Pin("IO5".to_string(), true), HostAction::Reset]
    );

    // Consume the boot marker the first reset scripted
    modem.wait_for_boot(None).unwrap();

    actions.lock().clear();
    modem.exit_serial_bootloader_recovery().unwrap();
    assert_eq!(
        *actions.lock(),
        vec![HostAction::Pin("IO5".to_string(), false), HostAction::Reset]
    );
}

#[test]
fn test_recovery_is_nano_only() {
    let (modem, _port) = scripted_modem(Model::Tg1wwg);
    let mut modem = modem.with_host(RecordingHost {
        actions: Arc::new(Mutex::new(Vec::new())),
        boot_on_reset: None,
    });

    assert!(matches!(
        modem.enter_serial_bootloader_recovery(),
        Err(ModemError::Unsupported(_))
    ));
}

// ============================================================================
// Network
// ============================================================================

#[test]
fn test_network_mode() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT+CEREG?\r", "\r\n+CEREG: 0,5\r\n\r\nOK\r\n");
    port.on_write("AT+CFUN=4\r", OK);
    port.on_write("AT+CEREG?\r", "\r\n+CEREG: garbage\r\n\r\nOK\r\n");

    assert_eq!(modem.network_mode().unwrap(), 5);
    modem.set_network_mode(NetworkMode::Limited).unwrap();
    assert!(matches!(
        modem.network_mode(),
        Err(ModemError::Protocol { .. })
    ));
}

#[test]
fn test_set_network_mode_rejected() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT+CFUN=1\r", "\r\n+CME ERROR: 4\r\n");

    let err = modem.set_network_mode(NetworkMode::On).unwrap_err();
    assert_eq!(err.result(), Some(ResultCode::cme(4)));
}

// ============================================================================
// SIMs
// ============================================================================

#[test]
fn test_iccid_is_cached() {
    let (mut modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#ICCID?\r", "\r\n89014103211118510720\r\n\r\nOK\r\n");

    assert_eq!(modem.iccid(None).unwrap(), "89014103211118510720");

    port.clear_written();
    assert_eq!(modem.iccid(None).unwrap(), "89014103211118510720");
    assert!(port.written().is_empty());
}

#[test]
fn test_select_sim_forgets_removable_iccid() {
    let (mut modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#ICCID?\r", "\r\n8901000000000000001\r\n\r\nOK\r\n");
    port.on_write("AT#SIMSELECT=1\r", OK);
    port.on_write("AT#ICCID?\r", "\r\n8901000000000000002\r\n\r\nOK\r\n");
    port.on_write("AT#SIMSELECT=0\r", OK);

    let soldered = Key::from("soldered");
    let caged = Key::from("caged");

    assert_eq!(modem.iccid(None).unwrap(), "8901000000000000001");
    modem.select_sim(&caged).unwrap();
    assert_eq!(modem.sims().unwrap().current().cached_iccid(), None);
    assert_eq!(modem.iccid(None).unwrap(), "8901000000000000002");

    // The soldered SIM keeps its ICCID while inactive
    assert_eq!(modem.iccid(Some(&soldered)).unwrap(), "8901000000000000001");

    modem.select_sim(&Key::Id(0)).unwrap();
    assert!(matches!(
        modem.iccid(Some(&caged)),
        Err(ModemError::Usage(_))
    ));
    assert_eq!(port.pending_rules(), 0);
}

#[test]
fn test_select_unknown_sim() {
    let (mut modem, port) = scripted_modem(Model::Nano);

    assert!(matches!(
        modem.select_sim(&Key::from("esim")),
        Err(ModemError::NotFound { .. })
    ));
    assert!(port.written().is_empty());
}

#[test]
fn test_select_sim_rejected() {
    let (mut modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#SIMSELECT=1\r", "\r\nERROR\r\n");

    let err = modem.select_sim(&Key::Id(1)).unwrap_err();
    assert!(matches!(err, ModemError::Device { .. }));
    assert_eq!(modem.sims().unwrap().current().id(), 0);
}

// ============================================================================
// GPIO
// ============================================================================

#[test]
fn test_gpio_single_pin() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#GPIO=3,1,1\r", OK);
    port.on_write("AT#GPIO=5,0\r", "\r\n#GPIO: 1\r\n\r\nOK\r\n");
    port.on_write("AT#GPIO=7,2,3\r", OK);

    modem.gpio_write(&[Key::Id(3)], &[true]).unwrap();
    assert_eq!(modem.gpio_read(&[Key::Id(5)]).unwrap(), vec![true]);
    modem.gpio_set_configs(&["7".parse().unwrap()], &[3]).unwrap();
    assert_eq!(port.pending_rules(), 0);
}

#[test]
fn test_gpio_masks() {
    let (modem, port) = scripted_modem(Model::Nano);
    let mask = "00000000000000000000000000001001";
    port.on_write(
        format!("AT#GPIO={},1,00000000000000000000000000000001\r", mask),
        OK,
    );
    port.on_write(
        format!("AT#GPIO={},0\r", mask),
        "\r\n#GPIO: 00000000000000000000000000001000\r\n\r\nOK\r\n",
    );

    modem
        .gpio_write(&[Key::Id(0), Key::Id(3)], &[true, false])
        .unwrap();
    assert_eq!(
        modem.gpio_read(&[Key::Id(0), Key::Id(3)]).unwrap(),
        vec![false, true]
    );
}

#[test]
fn test_gpio_bad_arguments() {
    let (modem, port) = scripted_modem(Model::Nano);

    assert!(matches!(
        modem.gpio_write(&[Key::Id(0), Key::Id(1)], &[true]),
        Err(ModemError::Usage(_))
    ));
    assert!(matches!(
        modem.gpio_read(&[Key::Id(40)]),
        Err(ModemError::NotFound { .. })
    ));
    assert!(matches!(
        modem.gpio_set_configs(&[Key::Id(1)], &[12]),
        Err(ModemError::Usage(_))
    ));
    assert!(matches!(
        modem.gpio_configs(&[Key::Id(1)]),
        Err(ModemError::Unsupported(_))
    ));
    assert!(port.written().is_empty());
}

// ============================================================================
// Apps
// ============================================================================

const APPVER_REPLY: &str = "\r\n#APPVER: NLS: 1.4.2\r\n#APPVER: ATI: 0.9.0\r\n\r\nOK\r\n";
const CGMR_REPLY: &str = "\r\nmfw_nrf9160_1.3.4\r\n\r\nOK\r\n";

#[test]
fn test_app_versions() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#APPVER?\r", APPVER_REPLY);
    port.on_write("AT+CGMR\r", CGMR_REPLY);

    let versions = modem.app_versions().unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(versions["NLS"], "1.4.2");
    assert_eq!(versions["ATI"], "0.9.0");
    assert_eq!(versions["MFW"], "mfw_nrf9160_1.3.4");
}

#[test]
fn test_app_version_by_name() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#APPVER?\r", APPVER_REPLY);
    port.on_write("AT+CGMR\r", CGMR_REPLY);
    port.on_write("AT#APPVER?\r", APPVER_REPLY);
    port.on_write("AT+CGMR\r", CGMR_REPLY);

    assert_eq!(modem.app_version(&Key::from("stack")).unwrap(), "1.4.2");
    assert_eq!(
        modem.app_version(&Key::from("modem")).unwrap(),
        "mfw_nrf9160_1.3.4"
    );
    assert!(matches!(
        modem.app_version(&Key::from("bootloader")),
        Err(ModemError::NotFound { .. })
    ));
}

#[test]
fn test_app_versions_malformed() {
    let (modem, port) = scripted_modem(Model::Nano);
    port.on_write("AT#APPVER?\r", "\r\n#APPVER: NLS: 1.4.2\r\n\r\nOK\r\n");
    port.on_write("AT#APPVER?\r", "\r\n#APPVER NLS 1.4.2\r\n\r\nOK\r\n");

    assert!(matches!(
        modem.app_versions(),
        Err(ModemError::Protocol { .. })
    ));
    assert!(matches!(
        modem.app_versions(),
        Err(ModemError::Protocol { .. })
    ));
}
