pub mod bluetooth;
pub mod simulated;
pub mod traits;

pub use bluetooth::{BluetoothConfig, BluetoothLink, BluetoothTransport};
pub use simulated::{SimulatedDevice, SimulatedLink, SimulatedOp, SimulatedTransport};
pub use traits::{ConnectTarget, GattEndpoints, GattLink, GattTransport, LinkEvent, LinkEventSender};
