//! Common types shared across the driver.
//!
//! This module provides the register access classification and the
//! crate-wide error type used by the register map, the device cache,
//! the bus, and the transports.

/// Register access classes.
pub mod data;

/// Error types and the crate `Result` alias.
pub mod error;

pub use data::Access;
pub use error::{Error, Result, TransportOp};
