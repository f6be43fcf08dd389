//! Registry of configured lights

use super::{DeviceCoordinator, DeviceIdentity};
use crate::command::{CommandExecutor, CommandRequest, ExecutionResult, RequestError};
use crate::transport::GattTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Tracks every configured light by entry id
pub struct DeviceRegistry<T: GattTransport> {
    executor: Arc<CommandExecutor<T>>,
    /// Map of entry_id -> coordinator
    devices: Arc<RwLock<HashMap<String, Arc<DeviceCoordinator<T>>>>>,
}

impl<T: GattTransport> DeviceRegistry<T> {
    pub fn new(executor: Arc<CommandExecutor<T>>) -> Self {
        Self {
            executor,
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a light; an existing entry with the same id is replaced
    pub async fn setup_entry(
        &self,
        entry_id: impl Into<String>,
        identity: DeviceIdentity,
    ) -> Arc<DeviceCoordinator<T>> {
        let entry_id = entry_id.into();
        info!("[REG] Setting up {} ({} {})", entry_id, identity.name, identity.address);

        let device = Arc::new(DeviceCoordinator::new(identity, self.executor.clone()));
        let mut devices = self.devices.write().await;
        if devices.insert(entry_id.clone(), device.clone()).is_some() {
            warn!("[REG] Replaced existing entry {}", entry_id);
        }
        device
    }

    /// Forget a light. Returns whether it was registered.
    pub async fn unload_entry(&self, entry_id: &str) -> bool {
        let removed = self.devices.write().await.remove(entry_id).is_some();
        if removed {
            info!("[REG] Unloaded {}", entry_id);
        }
        removed
    }

    pub async fn get(&self, entry_id: &str) -> Option<Arc<DeviceCoordinator<T>>> {
        self.devices.read().await.get(entry_id).cloned()
    }

    /// Registered entry ids, sorted
    pub async fn entries(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Execute one request on each addressed light in turn
    ///
    /// The request is resolved once up front; if it does not resolve, every
    /// addressed light records a failed operation. Unknown entry ids are
    /// logged and skipped.
    pub async fn dispatch(
        &self,
        entry_ids: &[String],
        request: &CommandRequest,
    ) -> Result<Vec<(String, ExecutionResult)>, RequestError> {
        let commands = match request.to_command_set() {
            Ok(commands) => commands,
            Err(e) => {
                for entry_id in entry_ids {
                    match self.get(entry_id).await {
                        Some(device) => device.reject(&e),
                        None => warn!("[REG] Unknown entry {}, skipping", entry_id),
                    }
                }
                return Err(e);
            }
        };
        let mut results = Vec::with_capacity(entry_ids.len());

        for entry_id in entry_ids {
            let Some(device) = self.get(entry_id).await else {
                warn!("[REG] Unknown entry {}, skipping", entry_id);
                continue;
            };
            let result = device.execute(&commands).await;
            results.push((entry_id.clone(), result));
        }
        Ok(results)
    }

    /// Unload every entry
    pub async fn shutdown(&self) {
        let mut devices = self.devices.write().await;
        info!("[REG] Shutting down {} device(s)", devices.len());
        devices.clear();
    }
}
