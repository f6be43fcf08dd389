//! Transport trait abstraction for pluggable GATT backends

use anyhow::Result;
use async_trait::async_trait;
use bluer::Uuid;
use govee_ble_shared::gatt;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::warn;

/// Events a link pushes without the caller asking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Data notified on a subscribed characteristic
    Notification { characteristic: Uuid, data: Vec<u8> },
    /// The remote end or the stack dropped the connection
    Disconnected,
}

/// Sending half of a link's event channel
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

/// What a transport should connect to
#[derive(Debug, Clone)]
pub enum ConnectTarget<H> {
    /// A device the transport already knows about
    Resolved(H),
    /// Raw address the transport could not resolve up front
    Address(String),
}

/// Characteristics a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattEndpoints {
    pub write: Uuid,
    pub notify: Uuid,
}

impl Default for GattEndpoints {
    fn default() -> Self {
        Self {
            write: Uuid::from_u128(gatt::WRITE_CHARACTERISTIC),
            notify: Uuid::from_u128(gatt::NOTIFY_CHARACTERISTIC),
        }
    }
}

/// An open connection to one device
#[async_trait]
pub trait GattLink: Send + 'static {
    /// Write without response to a characteristic
    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Start forwarding notifications from a characteristic as [`LinkEvent`]s
    async fn subscribe(&mut self, characteristic: Uuid) -> Result<()>;

    /// Close the connection
    async fn disconnect(&mut self) -> Result<()>;
}

/// Factory for device connections
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Transport-specific device handle
    type Handle: Send + Sync;

    /// The link type this transport produces
    type Link: GattLink;

    /// Look up a device by address
    async fn resolve(&self, address: &str) -> Option<Self::Handle>;

    /// Connect to a device; pushed events are delivered on `events`
    async fn connect(
        &self,
        target: ConnectTarget<Self::Handle>,
        events: LinkEventSender,
    ) -> Result<Self::Link>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// Finish opening a link once the device is connected
///
/// If `setup` fails the connection is released before the setup error is
/// returned, since no link will exist for the caller to disconnect.
pub async fn setup_or_release<L, S, R, RF>(address: &str, setup: S, release: R) -> Result<L>
where
    S: Future<Output = Result<L>>,
    R: FnOnce() -> RF,
    RF: Future<Output = Result<()>>,
{
    match setup.await {
        Ok(link) => Ok(link),
        Err(e) => {
            if let Err(release_err) = release().await {
                warn!("[BLE] Releasing {} after failed setup failed: {:#}", address, release_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_setup_success_keeps_connection() {
        let released = AtomicUsize::new(0);
        let counter = &released;
        let link = setup_or_release(
            "A4:C1:38:00:00:01",
            async { Ok::<_, anyhow::Error>(7u8) },
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            },
        )
        .await
        .expect("setup succeeds");

        assert_eq!(link, 7);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_setup_failure_releases_connection() {
        let released = AtomicUsize::new(0);
        let counter = &released;
        let result: Result<u8> = setup_or_release(
            "A4:C1:38:00:00:01",
            async { Err::<u8, _>(anyhow!("no services")) },
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow!("already gone"))
            },
        )
        .await;

        // The setup error wins over the release error
        assert_eq!(result.unwrap_err().to_string(), "no services");
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
