//! Modem GPIO access over `AT#GPIO`.
//!
//! Single-pin commands carry the pin index and value as plain decimals.
//! Multi-pin commands carry 32-character masks printed most significant pin
//! first, so character `31 - n` belongs to pin `n`:
//!
//! ```text
//! pins [0, 3]  ->  mask "00000000000000000000000000001001"
//! ```

use nlcell_at::Interface;
use tracing::debug;

use crate::error::{expect_ok, ModemError, Result};
use crate::registry::{Entry, Key, Registry};

/// Number of GPIO pins on the Skywire Nano.
pub const PIN_COUNT: usize = 32;

/// `AT#GPIO` operation selectors.
const OP_READ: u8 = 0;
const OP_WRITE: u8 = 1;
const OP_CONFIGURE: u8 = 2;

/// One GPIO pin.
#[derive(Debug, Clone)]
pub struct Pin {
    id: u32,
    name: Option<String>,
}

impl Pin {
    /// Create a pin.
    pub fn new(id: u32, name: Option<String>) -> Self {
        Pin { id, name }
    }
}

impl Entry for Pin {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Build the pin and value parameters for an `AT#GPIO` command.
///
/// The value parameter is `None` when `values` is.
pub fn make_parameters(pins: &[u32], values: Option<&[u8]>) -> Result<(String, Option<String>)> {
    if pins.is_empty() {
        return Err(ModemError::usage("no GPIOs given"));
    }
    if let Some(values) = values {
        if values.len() != pins.len() {
            return Err(ModemError::usage("need matching GPIOs and values"));
        }
        if let Some(value) = values.iter().find(|v| **v > 9) {
            return Err(ModemError::usage(format!("GPIO value {} is not a digit", value)));
        }
    }
    if let Some(pin) = pins.iter().find(|p| **p as usize >= PIN_COUNT) {
        return Err(ModemError::usage(format!("no GPIO {}", pin)));
    }

    if pins.len() == 1 {
        let value = values.map(|v| v[0].to_string());
        return Ok((pins[0].to_string(), value));
    }

    let mut mask = [b'0'; PIN_COUNT];
    let mut things = [b'0'; PIN_COUNT];
    for (i, &pin) in pins.iter().enumerate() {
        let slot = PIN_COUNT - 1 - pin as usize;
        mask[slot] = b'1';
        if let Some(values) = values {
            things[slot] = b'0' + values[i];
        }
    }

    let mask = String::from_utf8_lossy(&mask).into_owned();
    let things = values.map(|_| String::from_utf8_lossy(&things).into_owned());
    Ok((mask, things))
}

/// Extract per-pin values from an `AT#GPIO` reply parameter.
///
/// For a single pin the reply may be either one digit or a full mask.
pub fn parse_parameter(pins: &[u32], text: &str) -> Result<Vec<u8>> {
    let mut values = text
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| ModemError::protocol("invalid GPIO values", text))?;
    values.reverse();

    if values.is_empty() {
        return Err(ModemError::protocol("no GPIO values", text));
    }

    if pins.len() < 2 && values.len() < 2 {
        return Ok(values);
    }

    pins.iter()
        .map(|&pin| {
            values
                .get(pin as usize)
                .copied()
                .ok_or_else(|| ModemError::protocol(format!("GPIO {} not in reply", pin), text))
        })
        .collect()
}

/// The GPIO pins of a modem.
#[derive(Debug, Clone)]
pub struct Gpio {
    pins: Registry<Pin>,
}

impl Gpio {
    /// The Skywire Nano's 32 unnamed pins.
    pub fn nano() -> Self {
        Gpio {
            pins: Registry::new(
                "GPIO",
                (0..PIN_COUNT as u32).map(|id| Pin::new(id, None)).collect(),
            ),
        }
    }

    /// Number of pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether there are no pins.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Resolve keys to pin ids.
    pub fn resolve(&self, keys: &[Key]) -> Result<Vec<u32>> {
        keys.iter()
            .map(|key| self.pins.find(key).map(|pin| pin.id))
            .collect()
    }

    /// Set pin configurations.
    pub fn set_configs(&self, at: &mut Interface, pins: &[Key], configs: &[u8]) -> Result<()> {
        if pins.len() != configs.len() {
            return Err(ModemError::usage("need matching GPIOs and configurations"));
        }
        let pins = self.resolve(pins)?;
        let (mask, configs) = make_parameters(&pins, Some(configs))?;
        let configs = configs.unwrap_or_default();

        let command = format!("AT#GPIO={},{},{}", mask, OP_CONFIGURE, configs);
        expect_ok(at.send_command(&command)?, "failed to configure GPIOs")?;
        Ok(())
    }

    /// Read pin configurations. The Skywire Nano cannot report them.
    pub fn configs(&self, _pins: &[Key]) -> Result<Vec<u8>> {
        Err(ModemError::Unsupported(
            "reading GPIO configuration on the Skywire Nano".to_string(),
        ))
    }

    /// Drive output pins.
    pub fn write(&self, at: &mut Interface, pins: &[Key], states: &[bool]) -> Result<()> {
        if pins.len() != states.len() {
            return Err(ModemError::usage("need matching GPIOs and states"));
        }
        let pins = self.resolve(pins)?;
        let values: Vec<u8> = states.iter().map(|&s| s as u8).collect();
        let (mask, states) = make_parameters(&pins, Some(&values))?;
        let states = states.unwrap_or_default();

        let command = format!("AT#GPIO={},{},{}", mask, OP_WRITE, states);
        expect_ok(at.send_command(&command)?, "failed to set GPIOs")?;
        Ok(())
    }

    /// Read pin states.
    pub fn read(&self, at: &mut Interface, pins: &[Key]) -> Result<Vec<bool>> {
        let pins = self.resolve(pins)?;
        let (mask, _) = make_parameters(&pins, None)?;

        let command = format!("AT#GPIO={},{}", mask, OP_READ);
        let response = expect_ok(at.send_command(&command)?, "failed to read GPIOs")?;

        let line = response
            .lines()
            .first()
            .copied()
            .ok_or_else(|| ModemError::protocol("GPIO states not in response", response.output()))?;

        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 2 {
            return Err(ModemError::protocol("invalid GPIO states", line));
        }

        let values = parse_parameter(&pins, fields[1].trim())?;
        debug!(?pins, ?values, "read GPIOs");
        Ok(values.into_iter().map(|v| v != 0).collect())
    }
}
