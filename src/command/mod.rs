//! Command execution for the light bridge
//!
//! This module handles:
//! - Resolving host requests into command sets
//! - Building frames and delivering them over a single session
//! - Reporting each execution's outcome

mod executor;
pub mod request;

pub use executor::{CommandExecutor, ExecutionError, ExecutionResult};
pub use request::{CommandRequest, RequestError};
