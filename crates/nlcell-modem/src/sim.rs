//! SIM selection and ICCID queries.

use nlcell_at::Interface;
use tracing::{debug, info};

use crate::error::{expect_ok, ModemError, Result};
use crate::registry::{Entry, Key, Registry};

/// One SIM slot.
#[derive(Debug, Clone)]
pub struct Sim {
    id: u32,
    name: &'static str,
    fixed: bool,
    iccid: Option<String>,
}

impl Sim {
    /// Create a SIM slot. Fixed SIMs cannot be swapped, so their ICCID is
    /// cached for the life of the driver.
    pub fn new(id: u32, name: &'static str, fixed: bool) -> Self {
        Sim {
            id,
            name,
            fixed,
            iccid: None,
        }
    }

    /// Whether the SIM is soldered down.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// The cached ICCID, if it has been read.
    pub fn cached_iccid(&self) -> Option<&str> {
        self.iccid.as_deref()
    }
}

impl Entry for Sim {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> Option<&str> {
        Some(self.name)
    }
}

/// The SIM slots of a modem and which one is active.
#[derive(Debug, Clone)]
pub struct SimRegistry {
    sims: Registry<Sim>,
    current: usize,
}

impl SimRegistry {
    /// The Skywire Nano's soldered and caged SIMs, soldered active.
    pub fn nano() -> Self {
        SimRegistry {
            sims: Registry::new(
                "SIM",
                vec![Sim::new(0, "soldered", true), Sim::new(1, "caged", false)],
            ),
            current: 0,
        }
    }

    /// The active SIM.
    pub fn current(&self) -> &Sim {
        &self.sims.as_slice()[self.current]
    }

    /// Look up a SIM.
    pub fn find(&self, key: &Key) -> Result<&Sim> {
        self.sims.find(key)
    }

    /// All SIM slots.
    pub fn iter(&self) -> impl Iterator<Item = &Sim> {
        self.sims.iter()
    }

    /// Make a SIM the active one.
    ///
    /// The previously active SIM forgets its ICCID unless it is fixed, since a
    /// removable card may be swapped while it is inactive.
    pub fn select(&mut self, at: &mut Interface, key: &Key) -> Result<()> {
        let index = self.sims.position(key)?;
        let id = self.sims.get(index).map(|sim| sim.id).unwrap_or_default();

        let response = at.send_command(&format!("AT#SIMSELECT={}", id))?;
        expect_ok(response, &format!("failed to select SIM {}", id))?;

        if let Some(previous) = self.sims.get_mut(self.current) {
            if !previous.fixed {
                previous.iccid = None;
            }
        }

        info!(sim = id, "selected SIM");
        self.current = index;
        Ok(())
    }

    /// The ICCID of a SIM, the active one if `key` is `None`.
    ///
    /// Only the active SIM can be queried; an uncached inactive SIM is a
    /// usage error.
    pub fn iccid(&mut self, at: &mut Interface, key: Option<&Key>) -> Result<String> {
        let index = match key {
            Some(key) => self.sims.position(key)?,
            None => self.current,
        };

        let Some(sim) = self.sims.get_mut(index) else {
            return Err(ModemError::usage("no active SIM"));
        };

        if let Some(iccid) = &sim.iccid {
            return Ok(iccid.clone());
        }

        if index != self.current {
            return Err(ModemError::usage(format!(
                "cannot query the ICCID of inactive SIM {}",
                sim.name
            )));
        }

        let response = expect_ok(at.send_command("AT#ICCID?")?, "failed to query ICCID")?;
        let iccid = match response.lines().first() {
            Some(line) if !line.is_empty() => line.to_string(),
            _ => {
                return Err(ModemError::protocol(
                    "ICCID not in response",
                    response.output(),
                ))
            }
        };

        debug!(sim = sim.id, %iccid, "read ICCID");
        sim.iccid = Some(iccid.clone());
        Ok(iccid)
    }
}
