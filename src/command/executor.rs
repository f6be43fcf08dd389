//! Command executor - builds frames and delivers them over one session

use crate::device::SharedDeviceState;
use crate::session::{ConnectionSession, LogNotifications, NotificationHandler, SessionError};
use crate::transport::{ConnectTarget, GattEndpoints, GattLink, GattTransport};
use govee_ble_shared::{command, BuildError, CommandSet, Frame, SceneCatalog};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Outcome of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
}

/// Reasons an execution failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Executes command sets against lights reachable through a transport
pub struct CommandExecutor<T: GattTransport> {
    transport: Arc<T>,
    scenes: Arc<dyn SceneCatalog>,
    endpoints: GattEndpoints,
    handler: Arc<dyn NotificationHandler>,
}

impl<T: GattTransport> CommandExecutor<T> {
    /// Create a new command executor
    pub fn new(transport: Arc<T>, scenes: Arc<dyn SceneCatalog>) -> Self {
        Self {
            transport,
            scenes,
            endpoints: GattEndpoints::default(),
            handler: Arc::new(LogNotifications),
        }
    }

    /// Use different characteristics than the stock ones
    pub fn with_endpoints(mut self, endpoints: GattEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Route notifications from every session to `handler`
    pub fn with_notification_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Apply `commands` to the light at `address`
    ///
    /// Every failure is logged and reported as an unsuccessful result.
    pub async fn execute(&self, address: &str, commands: &CommandSet) -> ExecutionResult {
        match self.try_execute(address, commands).await {
            Ok(()) => {
                info!("[CMD] {} command completed", address);
                ExecutionResult { success: true }
            }
            Err(e) => {
                error!("[CMD] {} command failed: {}", address, e);
                ExecutionResult { success: false }
            }
        }
    }

    /// Execute against a registered device and record the outcome in its state
    pub async fn execute_for(
        &self,
        device: &SharedDeviceState,
        commands: &CommandSet,
    ) -> ExecutionResult {
        let address = device.snapshot().identity.address;
        let result = self.execute(&address, commands).await;
        device.record_result(result.success);
        result
    }

    async fn try_execute(&self, address: &str, commands: &CommandSet) -> Result<(), ExecutionError> {
        let frames = command::build(commands, self.scenes.as_ref())?;
        if frames.is_empty() {
            warn!("[CMD] {} command set is empty, nothing to send", address);
        }

        let target = match self.transport.resolve(address).await {
            Some(handle) => ConnectTarget::Resolved(handle),
            None => {
                debug!("[CMD] {} not known to {}, connecting by address", address, self.transport.name());
                ConnectTarget::Address(address.to_string())
            }
        };

        let mut session =
            ConnectionSession::new(address, self.endpoints).with_handler(self.handler.clone());
        session.connect(self.transport.as_ref(), target).await?;

        if let Err(e) = session.subscribe().await {
            warn!("[CMD] {} notifications unavailable: {}", address, e);
        }

        let sent = send_all(&mut session, &frames).await;

        if let Err(e) = session.disconnect().await {
            warn!("[CMD] {}", e);
        }

        sent
    }
}

async fn send_all<L: GattLink>(
    session: &mut ConnectionSession<L>,
    frames: &[Frame],
) -> Result<(), ExecutionError> {
    for (i, frame) in frames.iter().enumerate() {
        session.send(frame).await?;
        debug!("[CMD] {} frame {}/{} sent", session.address(), i + 1, frames.len());
    }
    Ok(())
}
