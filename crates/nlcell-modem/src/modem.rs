//! The modem facade.
//!
//! A [`Modem`] ties an AT channel, an optional kernel-log channel and the
//! board collaborators to one model's command set. Sockets share the AT
//! channel through a [`SharedInterface`]; everything else borrows it for the
//! length of one call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use nlcell_at::{Interface, Port};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::AppRegistry;
use crate::dfu::{self, DfuTimeouts, ImageType, Updater};
use crate::error::{expect_ok, ModemError, Result};
use crate::gpio::Gpio;
use crate::host::{ChunkedTransfer, DebugProbe, Host, RECOVERY_PIN};
use crate::registry::Key;
use crate::sim::SimRegistry;
use crate::socket::{
    Dialect, IdPool, NanoDialect, SharedPool, Socket, SocketConfig, SocketOptions, Src7611Dialect,
    Tg1wwgDialect,
};

/// An AT channel shared between a modem and its sockets.
pub type SharedInterface = Arc<Mutex<Interface>>;

/// Boot marker printed by the Skywire Nano.
const BOOT_PATTERN: &str = "READY";

/// Default wait for the boot marker.
const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the boot marker after leaving bootloader recovery.
const RECOVERY_BOOT_TIMEOUT: Duration = Duration::from_secs(60);

/// `AT+CFUN` can take a while to bring the radio up or down.
const NETWORK_MODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for the modem's boot marker.
pub fn wait_for_boot(at: &mut Interface, timeout: Option<Duration>) -> Result<()> {
    let timeout = timeout.unwrap_or(DEFAULT_BOOT_TIMEOUT);
    match at.get_urc(Some(BOOT_PATTERN), Some(timeout)) {
        Ok(_) => {
            info!("modem booted");
            Ok(())
        }
        Err(e) if e.is_timeout() => Err(ModemError::NoBoot),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Models
// ============================================================================

/// Supported modem models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Skywire Nano.
    #[default]
    Nano,
    /// NL-SW-LTE-SRC7611.
    Src7611,
    /// NL-SW-LTE-TG1WWG.
    Tg1wwg,
}

impl Model {
    pub fn as_str(self) -> &'static str {
        match self {
            Model::Nano => "nano",
            Model::Src7611 => "src7611",
            Model::Tg1wwg => "tg1wwg",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        [Model::Nano, Model::Src7611, Model::Tg1wwg]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown modem model: {}", s))
    }
}

/// `AT+CFUN` functionality levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NetworkMode {
    Off = 0,
    On = 1,
    Limited = 4,
}

/// Modem settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    pub model: Model,
    pub socket: SocketConfig,
    pub dfu: DfuTimeouts,
}

impl ModemConfig {
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn with_socket(mut self, socket: SocketConfig) -> Self {
        self.socket = socket;
        self
    }

    pub fn with_dfu(mut self, dfu: DfuTimeouts) -> Self {
        self.dfu = dfu;
        self
    }
}

// ============================================================================
// Modem
// ============================================================================

/// One modem and the channels and hardware around it.
pub struct Modem {
    config: ModemConfig,
    at: Option<SharedInterface>,
    kernel_log: Option<Box<dyn Port>>,
    host: Option<Box<dyn Host>>,
    probe: Option<Box<dyn DebugProbe>>,
    socket_ids: SharedPool,
    apps: Option<AppRegistry>,
    sims: Option<SimRegistry>,
    gpio: Option<Gpio>,
}

impl Modem {
    /// Create a modem with no channels attached.
    pub fn new(config: ModemConfig) -> Self {
        let nano = config.model == Model::Nano;
        Modem {
            config,
            at: None,
            kernel_log: None,
            host: None,
            probe: None,
            socket_ids: Arc::new(Mutex::new(IdPool::default())),
            apps: nano.then(AppRegistry::nano),
            sims: nano.then(SimRegistry::nano),
            gpio: nano.then(Gpio::nano),
        }
    }

    /// Attach the AT channel.
    pub fn with_at(mut self, at: Interface) -> Self {
        self.at = Some(Arc::new(Mutex::new(at)));
        self
    }

    /// Attach the kernel-log channel that carries firmware images.
    pub fn with_kernel_log(mut self, port: impl Port + 'static) -> Self {
        self.kernel_log = Some(Box::new(port));
        self
    }

    /// Attach the host board.
    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    /// Attach a debug probe.
    pub fn with_probe(mut self, probe: impl DebugProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn model(&self) -> Model {
        self.config.model
    }

    /// The shared AT channel, for sockets or direct use.
    pub fn shared_at(&self) -> Option<SharedInterface> {
        self.at.clone()
    }

    /// Lock the AT channel.
    pub fn at(&self) -> Result<MutexGuard<'_, Interface>> {
        self.at
            .as_ref()
            .map(|at| at.lock())
            .ok_or_else(|| ModemError::usage("no AT interface attached"))
    }

    fn unsupported(&self, what: &str) -> ModemError {
        ModemError::Unsupported(format!("{} on the {}", what, self.config.model))
    }

    // ========================================================================
    // Power
    // ========================================================================

    /// Reboot the modem.
    pub fn reboot(&self) -> Result<()> {
        match self.config.model {
            Model::Nano => {
                let mut at = self.at()?;
                expect_ok(at.send_command("AT#REBOOT")?, "failed to reboot")?;
                at.get_urc(Some(r"\+RESET"), None)?;
            }
            Model::Tg1wwg => {
                expect_ok(self.at()?.send_command("AT#ENHRST=1,0")?, "failed to reboot")?;
            }
            Model::Src7611 => return Err(self.unsupported("reboot")),
        }
        info!(model = %self.config.model, "rebooted");
        Ok(())
    }

    /// Power the modem down.
    pub fn shutdown(&self) -> Result<()> {
        match self.config.model {
            Model::Nano => {
                let mut at = self.at()?;
                expect_ok(at.send_command("AT#SHUTDOWN")?, "failed to shut down")?;
                at.get_urc(Some(r"\+SHUTDOWN"), None)?;
            }
            Model::Tg1wwg => {
                expect_ok(self.at()?.send_command("AT#SHDN")?, "failed to shut down")?;
            }
            Model::Src7611 => return Err(self.unsupported("shutdown")),
        }
        info!(model = %self.config.model, "shut down");
        Ok(())
    }

    /// Wait for the boot marker, 5 s by default.
    pub fn wait_for_boot(&self, timeout: Option<Duration>) -> Result<()> {
        wait_for_boot(&mut *self.at()?, timeout)
    }

    /// Pulse the reset line through the host board.
    pub fn reset(&mut self) -> Result<()> {
        let host = self
            .host
            .as_mut()
            .ok_or_else(|| ModemError::usage("no host attached"))?;
        host.reset()
    }

    /// The registration status field of `AT+CEREG?`.
    pub fn network_mode(&self) -> Result<u32> {
        let response = expect_ok(self.at()?.send_command("AT+CEREG?")?, "failed to query network mode")?;
        let lines = response.lines();
        lines
            .first()
            .and_then(|line| line.split(',').nth(1))
            .and_then(|field| field.trim().parse::<u32>().ok())
            .ok_or_else(|| ModemError::protocol("invalid network mode", response.output()))
    }

    /// Set the functionality level.
    pub fn set_network_mode(&self, mode: NetworkMode) -> Result<()> {
        let command = format!("AT+CFUN={}", mode as u8);
        let response = self.at()?.send_command_with_timeout(&command, NETWORK_MODE_TIMEOUT)?;
        expect_ok(response, "failed to set network mode")?;
        debug!(?mode, "set network mode");
        Ok(())
    }

    /// Hold the Skywire Nano in its serial bootloader.
    pub fn enter_serial_bootloader_recovery(&mut self) -> Result<()> {
        if self.config.model != Model::Nano {
            return Err(self.unsupported("serial bootloader recovery"));
        }
        self.host_pin(RECOVERY_PIN, true)?;
        self.shutdown()?;
        self.reset()?;
        info!("entered serial bootloader recovery");
        Ok(())
    }

    /// Release the Skywire Nano from its serial bootloader and wait for it
    /// to boot.
    pub fn exit_serial_bootloader_recovery(&mut self) -> Result<()> {
        if self.config.model != Model::Nano {
            return Err(self.unsupported("serial bootloader recovery"));
        }
        self.host_pin(RECOVERY_PIN, false)?;
        self.reset()?;
        self.wait_for_boot(Some(RECOVERY_BOOT_TIMEOUT))?;
        info!("exited serial bootloader recovery");
        Ok(())
    }

    fn host_pin(&mut self, name: &str, state: bool) -> Result<()> {
        let host = self
            .host
            .as_mut()
            .ok_or_else(|| ModemError::usage("no host attached"))?;
        host.write_pin(name, state)
    }

    // ========================================================================
    // Sockets
    // ========================================================================

    /// Create a socket.
    pub fn socket(&self, options: SocketOptions) -> Result<Socket> {
        let at = self
            .shared_at()
            .ok_or_else(|| ModemError::usage("no AT interface attached"))?;

        let dialect: Box<dyn Dialect> = match self.config.model {
            Model::Nano => Box::new(NanoDialect::new(&options)),
            Model::Src7611 => Box::new(Src7611Dialect::new(&options)?),
            Model::Tg1wwg => Box::new(Tg1wwgDialect::new(self.socket_ids.clone(), &options)?),
        };

        Socket::open(at, dialect, self.config.socket.clone())
    }

    /// Free TG1WWG connection ids.
    pub fn available_socket_ids(&self) -> usize {
        self.socket_ids.lock().available()
    }

    // ========================================================================
    // SIMs
    // ========================================================================

    pub fn sims(&self) -> Result<&SimRegistry> {
        self.sims.as_ref().ok_or_else(|| self.unsupported("SIM selection"))
    }

    /// Make a SIM the active one.
    pub fn select_sim(&mut self, key: &Key) -> Result<()> {
        let Some(sims) = self.sims.as_mut() else {
            return Err(self.unsupported("SIM selection"));
        };
        let at = self.at.as_ref().ok_or_else(|| ModemError::usage("no AT interface attached"))?;
        sims.select(&mut at.lock(), key)
    }

    /// A SIM's ICCID, the active SIM's if `key` is `None`.
    pub fn iccid(&mut self, key: Option<&Key>) -> Result<String> {
        let Some(sims) = self.sims.as_mut() else {
            return Err(self.unsupported("ICCID queries"));
        };
        let at = self.at.as_ref().ok_or_else(|| ModemError::usage("no AT interface attached"))?;
        sims.iccid(&mut at.lock(), key)
    }

    // ========================================================================
    // GPIO
    // ========================================================================

    fn gpio(&self) -> Result<&Gpio> {
        self.gpio.as_ref().ok_or_else(|| self.unsupported("GPIO access"))
    }

    /// Configure pins.
    pub fn gpio_set_configs(&self, pins: &[Key], configs: &[u8]) -> Result<()> {
        self.gpio()?.set_configs(&mut *self.at()?, pins, configs)
    }

    /// Read pin configurations.
    pub fn gpio_configs(&self, pins: &[Key]) -> Result<Vec<u8>> {
        self.gpio()?.configs(pins)
    }

    /// Drive pins.
    pub fn gpio_write(&self, pins: &[Key], states: &[bool]) -> Result<()> {
        self.gpio()?.write(&mut *self.at()?, pins, states)
    }

    /// Read pins.
    pub fn gpio_read(&self, pins: &[Key]) -> Result<Vec<bool>> {
        self.gpio()?.read(&mut *self.at()?, pins)
    }

    // ========================================================================
    // Apps
    // ========================================================================

    pub fn apps(&self) -> Result<&AppRegistry> {
        self.apps.as_ref().ok_or_else(|| self.unsupported("app versions"))
    }

    /// Every firmware component's version, keyed by tag.
    pub fn app_versions(&self) -> Result<BTreeMap<String, String>> {
        self.apps()?.versions(&mut *self.at()?)
    }

    /// One firmware component's version.
    pub fn app_version(&self, key: &Key) -> Result<String> {
        self.apps()?.version(&mut *self.at()?, key)
    }

    /// Upload a firmware image over the kernel-log channel.
    pub fn upload(
        &mut self,
        transfer: &mut dyn ChunkedTransfer,
        data: &[u8],
        image: ImageType,
        reboot: bool,
    ) -> Result<()> {
        if self.config.model != Model::Nano {
            return Err(self.unsupported("firmware upload"));
        }

        let mut at = self.at.as_ref().map(|at| at.lock());
        let mut updater = Updater::new(transfer).with_timeouts(self.config.dfu.clone());
        if let Some(at) = at.as_mut() {
            updater = updater.with_at(at);
        }
        if let Some(port) = self.kernel_log.as_mut() {
            updater = updater.with_kernel_log(port.as_mut());
        }
        if let Some(probe) = self.probe.as_mut() {
            updater = updater.with_probe(probe.as_mut());
        }

        updater.upload(data, image, reboot)
    }

    /// Have the modem download and apply an image from `url`.
    pub fn fota(&self, url: &str, reboot: bool) -> Result<()> {
        if self.config.model != Model::Nano {
            return Err(self.unsupported("FOTA"));
        }
        dfu::fota(&mut *self.at()?, url, reboot, &self.config.dfu)
    }
}

impl fmt::Debug for Modem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modem")
            .field("model", &self.config.model)
            .field("at", &self.at.is_some())
            .field("kernel_log", &self.kernel_log.is_some())
            .field("host", &self.host.is_some())
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names() {
        assert_eq!("nano".parse::<Model>().unwrap(), Model::Nano);
        assert_eq!("SRC7611".parse::<Model>().unwrap(), Model::Src7611);
        assert_eq!(Model::Tg1wwg.to_string(), "tg1wwg");
        assert!("sw-lte".parse::<Model>().is_err());
    }

    #[test]
    fn test_registries_follow_model() {
        let nano = Modem::new(ModemConfig::default());
        assert!(nano.sims().is_ok());
        assert!(nano.apps().is_ok());

        let tg1wwg = Modem::new(ModemConfig::default().with_model(Model::Tg1wwg));
        assert!(matches!(tg1wwg.sims(), Err(ModemError::Unsupported(_))));
        assert!(matches!(
            tg1wwg.gpio_configs(&[Key::Id(0)]),
            Err(ModemError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unsupported_power_control() {
        let modem = Modem::new(ModemConfig::default().with_model(Model::Src7611));
        assert!(matches!(modem.reboot(), Err(ModemError::Unsupported(_))));
        assert!(matches!(modem.shutdown(), Err(ModemError::Unsupported(_))));
    }

    #[test]
    fn test_missing_collaborators() {
        let mut modem = Modem::new(ModemConfig::default());
        assert!(matches!(modem.reset(), Err(ModemError::Usage(_))));
        assert!(matches!(modem.network_mode(), Err(ModemError::Usage(_))));
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = "model: tg1wwg\nsocket:\n  recv_timeout_ms: 1000\n";
        let config: ModemConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model, Model::Tg1wwg);
        assert_eq!(config.socket.recv_timeout(), Duration::from_secs(1));
        assert_eq!(config.dfu.boot_ms, 120_000);
    }
}
