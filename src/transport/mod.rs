//! Bus Transports.
//!
//! This module defines the contract between the servo bus and the physical
//! link it drives. A transport opens a two-wire bus, designates the slave for
//! the next transaction, moves raw bytes, and can probe the address space for
//! responsive devices. Every call blocks until it completes or fails.

use std::io;
use std::ops::RangeInclusive;

use crate::common::{Error, Result, TransportOp};

/// Linux `/dev/i2c-N` character device transport.
pub mod i2c_dev;

pub use i2c_dev::I2cDev;

/// Locator used when the caller passes an empty one.
pub const DEFAULT_LOCATOR: &str = "/dev/i2c-1";

/// Prefix selecting the in-process simulated bus.
pub const SIM_PREFIX: &str = "sim:";

/// Trait for raw byte transports.
///
/// Implementations only move bytes; framing is applied by the bus link.
pub trait Transport {
    /// Returns a short human-readable name of the link.
    ///
    /// Used for logging.
    fn name(&self) -> &str;

    /// Designates the slave addressed by the next read or write.
    fn select(&mut self, address: u8) -> io::Result<()>;

    /// Writes all of `bytes` to the selected slave in one transaction.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Fills `buffer` from the selected slave in one transaction.
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<()>;

    /// Returns the addresses in `range` that answer a one-byte read.
    ///
    /// The default implementation selects each address in turn and treats a
    /// successful read as presence. Transports with a cheaper presence check
    /// may override it.
    fn probe(&mut self, range: RangeInclusive<u8>) -> io::Result<Vec<u8>> {
        let mut found = Vec::new();
        let mut scratch = [0u8; 1];
        for address in range {
            if self.select(address).is_err() {
                continue;
            }
            if self.read(&mut scratch).is_ok() {
                found.push(address);
            }
        }
        Ok(found)
    }

    /// Releases the underlying handle.
    ///
    /// Default implementation does nothing; dropping the transport must
    /// release it as well.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens the transport named by `locator`.
///
/// * empty - the platform default, [`DEFAULT_LOCATOR`]
/// * `sim:16,17` - a simulated bus with servos at the listed addresses
/// * anything else - a path to an i2c-dev character device
pub fn open(locator: &str) -> Result<Box<dyn Transport>> {
    let locator = locator.trim();
    if let Some(list) = locator.strip_prefix(SIM_PREFIX) {
        let addresses = parse_address_list(list)
            .ok_or_else(|| Error::InvalidLocator(locator.to_string()))?;
        let (transport, _) = crate::sim::SimTransport::with_servos(&addresses);
        return Ok(Box::new(transport));
    }

    let path = if locator.is_empty() {
        DEFAULT_LOCATOR
    } else {
        locator
    };
    let transport = I2cDev::open(path).map_err(|e| Error::transport(TransportOp::Open, e))?;
    Ok(Box::new(transport))
}

/// Parses a comma separated list of decimal or `0x` hexadecimal addresses.
fn parse_address_list(list: &str) -> Option<Vec<u8>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_address)
        .collect()
}

/// Parses a single 7-bit slave address.
pub fn parse_address(s: &str) -> Option<u8> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok()?,
        None => s.parse::<u8>().ok()?,
    };
    (value < 0x80).then_some(value)
}
