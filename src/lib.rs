//! OpenServo Host Driver Library.
//!
//! This crate drives OpenServo actuators attached to a shared two-wire (I2C)
//! bus. Each servo exposes its state as a bank of registers; the driver keeps
//! a local mirror of every servo's register space, batches writes into it,
//! and flushes only the bytes that changed when asked to.
//!
//! # Architecture
//!
//! * **Registers**: a static table of named registers with offset, width,
//!   and access class.
//! * **Device**: the register cache of one servo, with dirty tracking and
//!   write-back of contiguous dirty runs.
//! * **Bus**: owns the transport, discovers servos, and reconciles the set of
//!   known devices across repeated scans.
//! * **Transport**: the raw byte link, either Linux i2c-dev or a simulated bus.
//!
//! # Modules
//!
//! * `common`: Access classes and error handling.
//! * `config`: Configuration loading and parsing.
//! * `registers`: The register map and command codes.
//! * `servo`: Bus, device cache, and transaction framing.
//! * `sim`: Simulated servos for running without hardware.
//! * `stats`: Bus transaction counters.
//! * `transport`: The transport contract and its Linux implementation.

/// Register access classes, error types, and the crate `Result` alias.
pub mod common;

/// Configuration system for the bus locator and probe range.
///
/// Loads and parses TOML configuration files.
pub mod config;

/// Static register map of the OpenServo address space.
///
/// Provides name resolution with normalization, register descriptors, the
/// refresh windows, and the command codes understood by the firmware.
pub mod registers;

/// Servo bus, per-device register cache, and wire framing.
pub mod servo;

/// In-process simulated servo bus.
///
/// Hosts virtual servos behind the transport contract so the driver can be
/// exercised without hardware.
pub mod sim;

/// Transaction statistics collected per bus link.
pub mod stats;

/// Raw byte transports and the locator parser.
pub mod transport;

pub use common::{Access, Error, Result};
pub use registers::Register;
pub use servo::{Bus, Device};
