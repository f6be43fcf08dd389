use super::{DeviceIdentity, DeviceState, SharedDeviceState};
use crate::command::{CommandExecutor, CommandRequest, ExecutionResult, RequestError};
use crate::transport::GattTransport;
use govee_ble_shared::CommandSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// One registered light: its identity, its state and the executor that drives it
pub struct DeviceCoordinator<T: GattTransport> {
    state: SharedDeviceState,
    executor: Arc<CommandExecutor<T>>,
}

impl<T: GattTransport> DeviceCoordinator<T> {
    pub fn new(identity: DeviceIdentity, executor: Arc<CommandExecutor<T>>) -> Self {
        Self {
            state: SharedDeviceState::new(identity),
            executor,
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.state.snapshot().identity
    }

    pub fn state(&self) -> DeviceState {
        self.state.snapshot()
    }

    /// Watch state changes, one per executed command
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state.subscribe()
    }

    pub fn unique_id(&self, suffix: &str) -> String {
        self.identity().unique_id(suffix)
    }

    pub fn object_id(&self, suffix: &str) -> String {
        self.identity().object_id(suffix)
    }

    /// Resolve a host request and execute it
    ///
    /// A request that does not resolve never reaches the light but still
    /// counts as a failed operation.
    pub async fn exec_cmds(&self, request: &CommandRequest) -> Result<ExecutionResult, RequestError> {
        match request.to_command_set() {
            Ok(commands) => Ok(self.execute(&commands).await),
            Err(e) => {
                self.reject(&e);
                Err(e)
            }
        }
    }

    /// Record a request that could not be executed
    pub fn reject(&self, error: &RequestError) {
        warn!("[DEV] {} rejected command: {}", self.state.snapshot().identity.name, error);
        self.state.record_result(false);
    }

    pub async fn execute(&self, commands: &CommandSet) -> ExecutionResult {
        debug!("[DEV] {} executing {:?}", self.state.snapshot().identity.name, commands);
        self.executor.execute_for(&self.state, commands).await
    }
}
