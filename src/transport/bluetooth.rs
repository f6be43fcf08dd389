//! BlueZ GATT transport

use crate::transport::traits::{
    setup_or_release, ConnectTarget, GattEndpoints, GattLink, GattTransport, LinkEvent,
    LinkEventSender,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluer::gatt::remote::{Characteristic, CharacteristicWriteRequest};
use bluer::gatt::WriteOp;
use bluer::{Adapter, Address, Device, DeviceEvent, DeviceProperty, Uuid};
use futures::StreamExt;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the Bluetooth transport
#[derive(Debug, Clone, Default)]
pub struct BluetoothConfig {
    /// Adapter name (e.g. "hci0"); the default adapter when unset
    pub adapter: Option<String>,
    /// Characteristics used for commands and notifications
    pub endpoints: GattEndpoints,
}

/// GATT transport backed by BlueZ
pub struct BluetoothTransport {
    adapter: Adapter,
}

impl BluetoothTransport {
    /// Open a BlueZ session and power on the adapter
    pub async fn new(config: &BluetoothConfig) -> Result<Self> {
        let session = bluer::Session::new().await?;
        let adapter = match &config.adapter {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };
        adapter.set_powered(true).await?;
        info!("[BT] Using adapter {}", adapter.name());
        Ok(Self { adapter })
    }
}

fn parse_address(address: &str) -> Result<Address> {
    address
        .to_uppercase()
        .parse()
        .map_err(|e| anyhow!("Invalid Bluetooth address {}: {}", address, e))
}

#[async_trait]
impl GattTransport for BluetoothTransport {
    type Handle = Device;
    type Link = BluetoothLink;

    async fn resolve(&self, address: &str) -> Option<Device> {
        let addr = parse_address(address).ok()?;
        let known = self.adapter.device_addresses().await.ok()?;
        if !known.contains(&addr) {
            return None;
        }
        self.adapter.device(addr).ok()
    }

    async fn connect(
        &self,
        target: ConnectTarget<Device>,
        events: LinkEventSender,
    ) -> Result<BluetoothLink> {
        let device = match target {
            ConnectTarget::Resolved(device) => device,
            ConnectTarget::Address(address) => self.adapter.device(parse_address(&address)?)?,
        };

        if !device.is_connected().await? {
            debug!("[BT] Connecting to {}", device.address());
            device.connect().await?;
        }

        let address = device.address().to_string();
        let device = &device;
        setup_or_release(&address, open_link(device, events), move || async move {
            device.disconnect().await.map_err(anyhow::Error::from)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "Bluetooth"
    }
}

/// Discover characteristics and start watching for disconnects
async fn open_link(device: &Device, events: LinkEventSender) -> Result<BluetoothLink> {
    let mut characteristics = HashMap::new();
    for service in device.services().await? {
        for characteristic in service.characteristics().await? {
            characteristics.insert(characteristic.uuid().await?, characteristic);
        }
    }
    debug!(
        "[BT] {} exposes {} characteristics",
        device.address(),
        characteristics.len()
    );

    let watcher = spawn_disconnect_watcher(device, events.clone()).await?;

    Ok(BluetoothLink {
        device: device.clone(),
        characteristics,
        events,
        tasks: vec![watcher],
    })
}

/// Forward the device's `Connected(false)` property change as a link event
async fn spawn_disconnect_watcher(device: &Device, events: LinkEventSender) -> Result<JoinHandle<()>> {
    let stream = device.events().await?;
    let address = device.address();

    Ok(tokio::spawn(async move {
        tokio::pin!(stream);
        while let Some(event) = stream.next().await {
            if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                debug!("[BT] {} reported disconnect", address);
                let _ = events.send(LinkEvent::Disconnected);
                break;
            }
        }
    }))
}

/// Open GATT connection to one light
pub struct BluetoothLink {
    device: Device,
    characteristics: HashMap<Uuid, Characteristic>,
    events: LinkEventSender,
    tasks: Vec<JoinHandle<()>>,
}

impl BluetoothLink {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .get(&uuid)
            .ok_or_else(|| anyhow!("Characteristic {} not found on {}", uuid, self.device.address()))
    }

    fn stop_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl GattLink for BluetoothLink {
    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let mut request = CharacteristicWriteRequest::default();
        request.op_type = WriteOp::Command;
        self.characteristic(characteristic)?
            .write_ext(data, &request)
            .await?;
        Ok(())
    }

    async fn subscribe(&mut self, characteristic: Uuid) -> Result<()> {
        let stream = self.characteristic(characteristic)?.notify().await?;
        let events = self.events.clone();

        self.tasks.push(tokio::spawn(async move {
            tokio::pin!(stream);
            while let Some(data) = stream.next().await {
                if events
                    .send(LinkEvent::Notification { characteristic, data })
                    .is_err()
                {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.stop_tasks();
        if let Err(e) = self.device.disconnect().await {
            warn!("[BT] Disconnect from {} failed: {}", self.device.address(), e);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for BluetoothLink {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BluetoothConfig::default();
        assert!(config.adapter.is_none());
        assert_eq!(config.endpoints, GattEndpoints::default());
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("a4:c1:38:01:02:03").expect("valid address");
        assert_eq!(addr, Address::new([0xa4, 0xc1, 0x38, 0x01, 0x02, 0x03]));
        assert!(parse_address("not-an-address").is_err());
    }
}
