//! Govee BLE Shared Protocol Types
//!
//! This crate provides the frame codec, command builder and session state
//! machine used to drive Govee lights over Bluetooth Low Energy. Nothing here
//! performs I/O.

pub mod codec;
pub mod color;
pub mod command;
pub mod scenes;
pub mod state_machine;

// Re-export commonly used types at crate root
pub use codec::{Frame, FrameError};
pub use color::Rgb;
pub use command::{BuildError, CommandIntent, CommandSet, MusicMode, VideoRegion};
pub use scenes::{SceneCatalog, SceneTable};
pub use state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult};

/// GATT endpoints exposed by the lights
pub mod gatt {
    /// Characteristic commands are written to (write without response),
    /// `00010203-0405-0607-0809-0a0b0c0d2b11`
    pub const WRITE_CHARACTERISTIC: u128 = 0x00010203_0405_0607_0809_0a0b0c0d2b11;

    /// Characteristic status and telemetry is notified on,
    /// `00010203-0405-0607-0809-0a0b0c0d2b10`
    pub const NOTIFY_CHARACTERISTIC: u128 = 0x00010203_0405_0607_0809_0a0b0c0d2b10;
}
