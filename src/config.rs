//! Bridge configuration file

use crate::device::DeviceIdentity;
use crate::transport::BluetoothConfig;
use anyhow::{bail, Context, Result};
use govee_ble_shared::SceneTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A configured light
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub entry_id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub model: String,
}

impl DeviceEntry {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.name, &self.address, &self.model)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bluetooth adapter, e.g. "hci0"
    pub adapter: Option<String>,
    /// Use the simulated transport instead of BlueZ
    pub simulate: bool,
    pub devices: Vec<DeviceEntry>,
    /// Scene name -> scene code
    pub scenes: HashMap<String, u16>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(data)?;

        let mut seen = HashSet::new();
        for entry in &config.devices {
            if !seen.insert(entry.entry_id.as_str()) {
                bail!("Duplicate device entry id: {}", entry.entry_id);
            }
        }
        Ok(config)
    }

    pub fn scene_table(&self) -> SceneTable {
        SceneTable::from(self.scenes.clone())
    }

    pub fn bluetooth(&self) -> BluetoothConfig {
        BluetoothConfig {
            adapter: self.adapter.clone(),
            ..Default::default()
        }
    }
}
