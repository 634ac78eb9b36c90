//! Firmware components and their versions.

use std::collections::BTreeMap;

use nlcell_at::Interface;
use tracing::debug;

use crate::error::{expect_ok, ModemError, Result};
use crate::registry::{Entry, Key, Registry};

/// One firmware component, keyed by the tag its version is reported under.
#[derive(Debug, Clone)]
pub struct App {
    id: u32,
    name: &'static str,
    tag: &'static str,
}

impl App {
    /// Create an app.
    pub fn new(id: u32, name: &'static str, tag: &'static str) -> Self {
        App { id, name, tag }
    }

    /// The version tag, e.g. `NLS`.
    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl Entry for App {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> Option<&str> {
        Some(self.name)
    }
}

/// The firmware components of a modem.
#[derive(Debug, Clone)]
pub struct AppRegistry {
    apps: Registry<App>,
}

impl AppRegistry {
    /// The Skywire Nano's network stack, AT application and modem firmware.
    pub fn nano() -> Self {
        AppRegistry {
            apps: Registry::new(
                "app",
                vec![
                    App::new(0, "stack", "NLS"),
                    App::new(1, "at", "ATI"),
                    App::new(2, "modem", "MFW"),
                ],
            ),
        }
    }

    /// Look up an app.
    pub fn find(&self, key: &Key) -> Result<&App> {
        self.apps.find(key)
    }

    /// All apps.
    pub fn iter(&self) -> impl Iterator<Item = &App> {
        self.apps.iter()
    }

    /// Every component version, keyed by tag.
    pub fn versions(&self, at: &mut Interface) -> Result<BTreeMap<String, String>> {
        let response = expect_ok(at.send_command("AT#APPVER?")?, "failed to get app versions")?;

        let mut versions = BTreeMap::new();
        for line in response.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 3 {
                return Err(ModemError::protocol("invalid app version", line));
            }
            versions.insert(fields[1].trim().to_string(), fields[2].trim().to_string());
        }

        if versions.len() != 2 {
            return Err(ModemError::protocol(
                format!("expected 2 app versions, got {}", versions.len()),
                response.output(),
            ));
        }

        let response = expect_ok(at.send_command("AT+CGMR")?, "failed to get modem version")?;
        let mfw = response
            .lines()
            .first()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| ModemError::protocol("modem version not in response", response.output()))?;
        versions.insert("MFW".to_string(), mfw);

        debug!(?versions, "read app versions");
        Ok(versions)
    }

    /// The version of one app.
    pub fn version(&self, at: &mut Interface, key: &Key) -> Result<String> {
        let tag = self.find(key)?.tag;
        let mut versions = self.versions(at)?;
        versions
            .remove(tag)
            .ok_or_else(|| ModemError::protocol(format!("no {} version reported", tag), ""))
    }
}
