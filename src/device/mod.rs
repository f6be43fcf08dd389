//! Registered lights and their observable state

mod coordinator;
pub mod registry;

pub use coordinator::DeviceCoordinator;
pub use registry::DeviceRegistry;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Who a light is. Fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub address: String,
    pub model: String,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, address: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            model: model.into(),
        }
    }

    /// Stable id for something this device exposes, e.g. `last_op_success`
    pub fn unique_id(&self, suffix: &str) -> String {
        format!("govee_ble_{}_{}", self.address, suffix)
    }

    /// Display id for something this device exposes
    pub fn object_id(&self, suffix: &str) -> String {
        format!("{} {}", self.name, suffix)
    }
}

/// Snapshot of a light as last observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub identity: DeviceIdentity,
    pub last_command_success: bool,
}

/// Shared, observable [`DeviceState`]
///
/// Each recorded result replaces the whole snapshot and wakes every
/// subscriber once.
#[derive(Debug, Clone)]
pub struct SharedDeviceState {
    tx: Arc<watch::Sender<DeviceState>>,
}

impl SharedDeviceState {
    pub fn new(identity: DeviceIdentity) -> Self {
        let (tx, _rx) = watch::channel(DeviceState {
            identity,
            last_command_success: false,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> DeviceState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.tx.subscribe()
    }

    /// Replace the state with the outcome of the latest command
    pub fn record_result(&self, success: bool) {
        let identity = self.tx.borrow().identity.clone();
        self.tx.send_replace(DeviceState {
            identity,
            last_command_success: success,
        });
    }
}
