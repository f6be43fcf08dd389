//! One connect/subscribe/send/disconnect lifecycle against a single light

use crate::transport::{ConnectTarget, GattEndpoints, GattLink, GattTransport, LinkEvent};
use bluer::Uuid;
use govee_ble_shared::state_machine::DisconnectReason;
use govee_ble_shared::{Frame, SessionEvent, SessionState, SessionStateMachine, TransitionResult};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Errors raised while driving a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Connect failed: {0}")]
    ConnectFailure(String),

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailure(String),

    #[error("Device disconnected unexpectedly")]
    UnexpectedDisconnect,

    #[error("Disconnect failed: {0}")]
    DisconnectFailure(String),

    #[error("Session is {0}, not connected")]
    NotConnected(SessionState),
}

/// Receives data notified by a device
pub trait NotificationHandler: Send + Sync {
    fn on_notify(&self, address: &str, characteristic: Uuid, data: &[u8]);
}

/// Default handler: log the notification and nothing else
#[derive(Debug, Default)]
pub struct LogNotifications;

impl NotificationHandler for LogNotifications {
    fn on_notify(&self, address: &str, characteristic: Uuid, data: &[u8]) {
        match Frame::decode(data) {
            Ok(frame) => debug!("[BLE] {} notify {}: {}", address, characteristic, frame),
            Err(_) => debug!("[BLE] {} notify {}: {:02x?}", address, characteristic, data),
        }
    }
}

/// A single session with one device
///
/// Events pushed by the link (notifications, disconnects) queue on a channel
/// and are applied whenever the session is polled, so the state machine only
/// ever moves on the caller's task.
pub struct ConnectionSession<L: GattLink> {
    address: String,
    endpoints: GattEndpoints,
    link: Option<L>,
    fsm: SessionStateMachine,
    events: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    handler: Arc<dyn NotificationHandler>,
}

impl<L: GattLink> ConnectionSession<L> {
    /// Create an idle session for `address`
    pub fn new(address: impl Into<String>, endpoints: GattEndpoints) -> Self {
        Self {
            address: address.into(),
            endpoints,
            link: None,
            fsm: SessionStateMachine::new(),
            events: None,
            handler: Arc::new(LogNotifications),
        }
    }

    /// Replace the notification handler
    pub fn with_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current state, after applying any pending link events
    pub fn state(&mut self) -> SessionState {
        self.poll_events();
        self.fsm.state()
    }

    /// Open the connection
    pub async fn connect<T>(
        &mut self,
        transport: &T,
        target: ConnectTarget<T::Handle>,
    ) -> Result<(), SessionError>
    where
        T: GattTransport<Link = L>,
    {
        if let TransitionResult::Invalid { from, .. } =
            self.fsm.process_event(SessionEvent::ConnectStarted)
        {
            return Err(SessionError::NotConnected(from));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        match transport.connect(target, event_tx).await {
            Ok(link) => {
                self.fsm.process_event(SessionEvent::ConnectSucceeded);
                self.link = Some(link);
                self.events = Some(event_rx);
                info!("[BLE] Connected to {} via {}", self.address, transport.name());
                Ok(())
            }
            Err(e) => {
                self.fsm.process_event(SessionEvent::ConnectFailed);
                Err(SessionError::ConnectFailure(format!("{}: {:#}", self.address, e)))
            }
        }
    }

    /// Subscribe to the notify characteristic
    ///
    /// A failed subscription leaves the session connected.
    pub async fn subscribe(&mut self) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let characteristic = self.endpoints.notify;
        let link = self.link_mut()?;

        link.subscribe(characteristic)
            .await
            .map_err(|e| SessionError::SubscribeFailure(format!("{:#}", e)))?;
        debug!("[BLE] {} subscribed to {}", self.address, characteristic);
        Ok(())
    }

    /// Write one frame and wait for the transport to complete it
    pub async fn send(&mut self, frame: &Frame) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let characteristic = self.endpoints.write;
        debug!("[BLE] {} sending {}", self.address, frame);

        let result = self.link_mut()?.write(characteristic, frame.as_ref()).await;
        match result {
            Ok(()) => {
                self.fsm.process_event(SessionEvent::WriteSucceeded);
                Ok(())
            }
            Err(e) => {
                // The link may have announced why it went away
                self.poll_events();
                if self.fsm.ended_by() == Some(DisconnectReason::LinkLost) {
                    return Err(SessionError::UnexpectedDisconnect);
                }
                self.fsm.process_event(SessionEvent::WriteFailed);
                Err(SessionError::WriteFailure(format!("{:#}", e)))
            }
        }
    }

    /// Close the connection
    ///
    /// The transport is asked to disconnect whenever a link exists, even if
    /// the session already ended after a failed write or a pushed disconnect.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.poll_events();

        let result = match self.link.take() {
            Some(mut link) => link
                .disconnect()
                .await
                .map_err(|e| SessionError::DisconnectFailure(format!("{:#}", e))),
            None => Ok(()),
        };

        match self.fsm.process_event(SessionEvent::DisconnectRequested) {
            TransitionResult::Ended(_) => info!("[BLE] Disconnected from {}", self.address),
            TransitionResult::AlreadyDisconnected => debug!(
                "[BLE] {} already disconnected ({:?})",
                self.address,
                self.fsm.ended_by()
            ),
            _ => {}
        }

        // Deliver whatever arrived before the link closed
        self.poll_events();
        self.events = None;
        result
    }

    fn ensure_connected(&mut self) -> Result<(), SessionError> {
        self.poll_events();
        match self.fsm.state() {
            SessionState::Connected => Ok(()),
            _ if self.fsm.ended_by() == Some(DisconnectReason::LinkLost) => {
                Err(SessionError::UnexpectedDisconnect)
            }
            state => Err(SessionError::NotConnected(state)),
        }
    }

    fn link_mut(&mut self) -> Result<&mut L, SessionError> {
        let state = self.fsm.state();
        self.link.as_mut().ok_or(SessionError::NotConnected(state))
    }

    /// Apply queued link events
    fn poll_events(&mut self) {
        let Some(events) = self.events.as_mut() else {
            return;
        };

        loop {
            match events.try_recv() {
                Ok(LinkEvent::Notification { characteristic, data }) => {
                    self.handler.on_notify(&self.address, characteristic, &data);
                }
                Ok(LinkEvent::Disconnected) => {
                    match self.fsm.process_event(SessionEvent::LinkLost) {
                        TransitionResult::Ended(_) => {
                            warn!("[BLE] {} dropped the connection", self.address)
                        }
                        _ => debug!("[BLE] {} disconnect event ignored", self.address),
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SimulatedLink, SimulatedOp, SimulatedTransport};
    use govee_ble_shared::codec::{self, command_id};
    use std::sync::Mutex;

    const ADDRESS: &str = "A4:C1:38:00:00:01";

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl NotificationHandler for RecordingHandler {
        fn on_notify(&self, address: &str, _characteristic: Uuid, data: &[u8]) {
            self.seen
                .lock()
                .unwrap()
                .push((address.to_string(), data.to_vec()));
        }
    }

    fn power_frame(on: bool) -> Frame {
        codec::encode(command_id::POWER, &[u8::from(on)]).expect("encode failed")
    }

    async fn connected(transport: &SimulatedTransport) -> ConnectionSession<SimulatedLink> {
        let mut session = ConnectionSession::new(ADDRESS, GattEndpoints::default());
        session
            .connect(transport, ConnectTarget::Address(ADDRESS.into()))
            .await
            .expect("connect failed");
        session
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let transport = SimulatedTransport::new();
        let mut session: ConnectionSession<SimulatedLink> =
            ConnectionSession::new(ADDRESS, GattEndpoints::default());
        assert_eq!(session.state(), SessionState::Idle);

        session
            .connect(&transport, ConnectTarget::Address(ADDRESS.into()))
            .await
            .expect("connect failed");
        assert_eq!(session.state(), SessionState::Connected);

        session.subscribe().await.expect("subscribe failed");
        session.send(&power_frame(true)).await.expect("send failed");
        session.disconnect().await.expect("disconnect failed");
        assert_eq!(session.state(), SessionState::Disconnected);

        let ops = transport.operations().await;
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[1], SimulatedOp::Subscribe(GattEndpoints::default().notify));
        assert_eq!(ops[2], SimulatedOp::Write(power_frame(true).as_bytes().to_vec()));
        assert_eq!(ops[3], SimulatedOp::Disconnect);
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_is_noop() {
        let mut session: ConnectionSession<SimulatedLink> =
            ConnectionSession::new(ADDRESS, GattEndpoints::default());

        session.disconnect().await.expect("nothing to close");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let transport = SimulatedTransport::new().fail_connect();
        let mut session: ConnectionSession<SimulatedLink> =
            ConnectionSession::new(ADDRESS, GattEndpoints::default());

        let result = session
            .connect(&transport, ConnectTarget::Address(ADDRESS.into()))
            .await;
        assert!(matches!(result, Err(SessionError::ConnectFailure(_))));
        assert_eq!(session.state(), SessionState::Disconnected);

        // A session is single use
        let result = session
            .connect(&transport, ConnectTarget::Address(ADDRESS.into()))
            .await;
        assert_eq!(result, Err(SessionError::NotConnected(SessionState::Disconnected)));
    }

    #[tokio::test]
    async fn test_write_failure_ends_session() {
        let transport = SimulatedTransport::new().fail_write_at(1);
        let mut session = connected(&transport).await;

        let result = session.send(&power_frame(true)).await;
        assert!(matches!(result, Err(SessionError::WriteFailure(_))));
        assert_eq!(session.state(), SessionState::Disconnected);

        let result = session.send(&power_frame(false)).await;
        assert!(matches!(result, Err(SessionError::NotConnected(_))));

        // Cleanup still reaches the transport
        session.disconnect().await.expect("disconnect failed");
        assert_eq!(
            transport.operations().await.last(),
            Some(&SimulatedOp::Disconnect)
        );
    }

    #[tokio::test]
    async fn test_pushed_disconnect() {
        let transport = SimulatedTransport::new().drop_link_after(1);
        let mut session = connected(&transport).await;

        session.send(&power_frame(true)).await.expect("send failed");
        assert_eq!(session.state(), SessionState::Disconnected);

        let result = session.send(&power_frame(false)).await;
        assert_eq!(result, Err(SessionError::UnexpectedDisconnect));
        assert_eq!(transport.writes().await.len(), 1);

        // Explicit disconnect afterwards is not a second transition
        session.disconnect().await.expect("disconnect failed");
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_notifications_reach_handler() {
        let transport = SimulatedTransport::new().notify_on_subscribe(vec![0xaa, 0x01]);
        let handler = Arc::new(RecordingHandler::default());
        let mut session = ConnectionSession::new(ADDRESS, GattEndpoints::default())
            .with_handler(handler.clone());
        session
            .connect(&transport, ConnectTarget::Address(ADDRESS.into()))
            .await
            .expect("connect failed");

        session.subscribe().await.expect("subscribe failed");
        session.disconnect().await.expect("disconnect failed");

        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(ADDRESS.to_string(), vec![0xaa, 0x01])]);
    }

    #[tokio::test]
    async fn test_subscribe_failure_keeps_session() {
        let transport = SimulatedTransport::new().fail_subscribe();
        let mut session = connected(&transport).await;

        let result = session.subscribe().await;
        assert!(matches!(result, Err(SessionError::SubscribeFailure(_))));
        assert_eq!(session.state(), SessionState::Connected);
        session.send(&power_frame(true)).await.expect("send failed");
    }
}
