//! Simulated GATT transport
//!
//! Stands in for real lights during development: every operation is logged
//! and recorded, and failures can be injected at each lifecycle step.

use crate::transport::traits::{
    setup_or_release, ConnectTarget, GattLink, GattTransport, LinkEvent, LinkEventSender,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::Uuid;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// An operation the simulated transport saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedOp {
    Connect { address: String, resolved: bool },
    Subscribe(Uuid),
    Write(Vec<u8>),
    Disconnect,
}

/// Device handle produced by [`SimulatedTransport::resolve`]
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub address: String,
}

#[derive(Debug, Clone, Default)]
struct Faults {
    fail_connect: bool,
    fail_setup: bool,
    fail_subscribe: bool,
    fail_write_at: Option<usize>,
    fail_disconnect: bool,
    drop_link_after: Option<usize>,
    notify_on_subscribe: Option<Vec<u8>>,
}

/// In-memory transport with fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    faults: Faults,
    unknown_addresses: Vec<String>,
    ops: Arc<Mutex<Vec<SimulatedOp>>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection attempt fails
    pub fn fail_connect(mut self) -> Self {
        self.faults.fail_connect = true;
        self
    }

    /// The device connects but link setup fails afterwards
    pub fn fail_setup(mut self) -> Self {
        self.faults.fail_setup = true;
        self
    }

    /// Subscribing to notifications fails
    pub fn fail_subscribe(mut self) -> Self {
        self.faults.fail_subscribe = true;
        self
    }

    /// The `n`th write on a link (1-based) fails
    pub fn fail_write_at(mut self, n: usize) -> Self {
        self.faults.fail_write_at = Some(n);
        self
    }

    /// Disconnecting fails
    pub fn fail_disconnect(mut self) -> Self {
        self.faults.fail_disconnect = true;
        self
    }

    /// The link reports a disconnect after `n` successful writes
    pub fn drop_link_after(mut self, n: usize) -> Self {
        self.faults.drop_link_after = Some(n);
        self
    }

    /// Push a notification as soon as a characteristic is subscribed
    pub fn notify_on_subscribe(mut self, data: Vec<u8>) -> Self {
        self.faults.notify_on_subscribe = Some(data);
        self
    }

    /// The address does not resolve to a known device
    pub fn with_unknown_address(mut self, address: impl Into<String>) -> Self {
        self.unknown_addresses.push(address.into());
        self
    }

    /// Operations seen so far, in order
    pub async fn operations(&self) -> Vec<SimulatedOp> {
        self.ops.lock().await.clone()
    }

    /// Payloads of every attempted write, in order
    pub async fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .lock()
            .await
            .iter()
            .filter_map(|op| match op {
                SimulatedOp::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl GattTransport for SimulatedTransport {
    type Handle = SimulatedDevice;
    type Link = SimulatedLink;

    async fn resolve(&self, address: &str) -> Option<SimulatedDevice> {
        if self
            .unknown_addresses
            .iter()
            .any(|unknown| unknown.eq_ignore_ascii_case(address))
        {
            return None;
        }
        Some(SimulatedDevice {
            address: address.to_uppercase(),
        })
    }

    async fn connect(
        &self,
        target: ConnectTarget<SimulatedDevice>,
        events: LinkEventSender,
    ) -> Result<SimulatedLink> {
        let (address, resolved) = match target {
            ConnectTarget::Resolved(device) => (device.address, true),
            ConnectTarget::Address(address) => (address, false),
        };

        self.ops.lock().await.push(SimulatedOp::Connect {
            address: address.clone(),
            resolved,
        });

        if self.faults.fail_connect {
            return Err(anyhow!("Simulated connect failure for {}", address));
        }

        info!("[SIM] Connected to {}", address);

        let setup = async {
            if self.faults.fail_setup {
                return Err(anyhow!("Simulated setup failure for {}", address));
            }
            Ok(SimulatedLink {
                address: address.clone(),
                faults: self.faults.clone(),
                ops: self.ops.clone(),
                events,
                writes: 0,
            })
        };
        let ops = &self.ops;
        setup_or_release(&address, setup, move || async move {
            ops.lock().await.push(SimulatedOp::Disconnect);
            Ok::<(), anyhow::Error>(())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "Simulated"
    }
}

/// Link produced by [`SimulatedTransport`]
pub struct SimulatedLink {
    address: String,
    faults: Faults,
    ops: Arc<Mutex<Vec<SimulatedOp>>>,
    events: LinkEventSender,
    writes: usize,
}

#[async_trait]
impl GattLink for SimulatedLink {
    async fn write(&mut self, _characteristic: Uuid, data: &[u8]) -> Result<()> {
        self.ops.lock().await.push(SimulatedOp::Write(data.to_vec()));
        self.writes += 1;

        if self.faults.fail_write_at == Some(self.writes) {
            return Err(anyhow!("Simulated write failure on write {}", self.writes));
        }
        if let Some(limit) = self.faults.drop_link_after {
            if self.writes > limit {
                return Err(anyhow!("Not connected"));
            }
        }

        info!("[SIM] {} <- {:02x?}", self.address, data);

        if self.faults.drop_link_after == Some(self.writes) {
            let _ = self.events.send(LinkEvent::Disconnected);
        }
        Ok(())
    }

    async fn subscribe(&mut self, characteristic: Uuid) -> Result<()> {
        self.ops.lock().await.push(SimulatedOp::Subscribe(characteristic));

        if self.faults.fail_subscribe {
            return Err(anyhow!("Simulated subscribe failure"));
        }
        if let Some(data) = &self.faults.notify_on_subscribe {
            let _ = self.events.send(LinkEvent::Notification {
                characteristic,
                data: data.clone(),
            });
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.ops.lock().await.push(SimulatedOp::Disconnect);

        if self.faults.fail_disconnect {
            return Err(anyhow!("Simulated disconnect failure"));
        }
        info!("[SIM] Disconnected from {}", self.address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_resolve() {
        let transport = SimulatedTransport::new().with_unknown_address("AA:BB:CC:DD:EE:FF");

        assert!(transport.resolve("aa:bb:cc:dd:ee:ff").await.is_none());
        let device = transport.resolve("a4:c1:38:00:00:01").await.expect("should resolve");
        assert_eq!(device.address, "A4:C1:38:00:00:01");
    }

    #[tokio::test]
    async fn test_write_fault() {
        let transport = SimulatedTransport::new().fail_write_at(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut link = transport
            .connect(ConnectTarget::Address("A4:C1:38:00:00:01".into()), tx)
            .await
            .expect("connect failed");

        let uuid = Uuid::nil();
        assert!(link.write(uuid, &[1]).await.is_ok());
        assert!(link.write(uuid, &[2]).await.is_err());
        assert_eq!(transport.writes().await, vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_setup_failure_releases_connection() {
        let transport = SimulatedTransport::new().fail_setup();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = transport
            .connect(ConnectTarget::Address("A4:C1:38:00:00:01".into()), tx)
            .await;

        assert!(result.is_err());
        assert_eq!(
            transport.operations().await,
            vec![
                SimulatedOp::Connect {
                    address: "A4:C1:38:00:00:01".into(),
                    resolved: false
                },
                SimulatedOp::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_link_pushes_event() {
        let transport = SimulatedTransport::new().drop_link_after(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = transport
            .connect(ConnectTarget::Address("A4:C1:38:00:00:01".into()), tx)
            .await
            .expect("connect failed");

        link.write(Uuid::nil(), &[1]).await.expect("first write");
        assert_eq!(rx.try_recv(), Ok(LinkEvent::Disconnected));
        assert!(link.write(Uuid::nil(), &[2]).await.is_err());
    }
}
