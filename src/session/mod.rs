//! Device sessions
//!
//! A session owns one connection to one light for the duration of a single
//! command: connect, subscribe to notifications, write frames, disconnect.

mod connection;

pub use connection::{ConnectionSession, LogNotifications, NotificationHandler, SessionError};
