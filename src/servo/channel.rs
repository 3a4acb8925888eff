//! Framed Servo Transactions.
//!
//! The [`Channel`] trait is the only capability a [`Device`](super::Device)
//! gets from its bus: send a payload to a register offset or command code,
//! and read a byte window back. [`Link`] implements it over a raw
//! [`Transport`] and applies the wire framing:
//!
//! * a zero-length payload is a command, sent as one byte with bit 7 set;
//! * any other transaction starts with the register offset, bit 7 cleared.

use log::{debug, trace};

use crate::common::{Error, Result, TransportOp};
use crate::stats::BusStats;
use crate::transport::Transport;

/// Bit 7 of the first byte distinguishes commands from register offsets.
pub const COMMAND_BIT: u8 = 0x80;

/// Transaction sender handed to devices.
pub trait Channel {
    /// Sends `data` to `register` on the device at `address`.
    ///
    /// An empty `data` turns the transaction into the command `register`.
    fn send(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()>;

    /// Reads `data.len()` bytes starting at `register` from the device at
    /// `address`.
    fn receive(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<()>;
}

/// Builds the bytes of a send transaction.
pub fn frame(register: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + 1);
    if data.is_empty() {
        bytes.push(register | COMMAND_BIT);
    } else {
        bytes.push(register & !COMMAND_BIT);
        bytes.extend_from_slice(data);
    }
    bytes
}

/// A bus transport plus the bookkeeping kept about it.
pub struct Link {
    transport: Box<dyn Transport>,
    stats: BusStats,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            stats: BusStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub(crate) fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub(crate) fn close(mut self) -> Result<()> {
        self.transport
            .close()
            .map_err(|e| Error::transport(TransportOp::Close, e))
    }

    fn select(&mut self, address: u8) -> Result<()> {
        self.transport.select(address).map_err(|e| {
            self.stats.failures += 1;
            Error::transport(TransportOp::Select, e)
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.write(bytes).map_err(|e| {
            self.stats.failures += 1;
            Error::transport(TransportOp::Write, e)
        })?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(())
    }
}

impl Channel for Link {
    fn send(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()> {
        let bytes = frame(register, data);
        if data.is_empty() {
            self.stats.commands += 1;
            debug!("[{:#04x}] command {:#04x}", address, bytes[0]);
        } else {
            self.stats.data_writes += 1;
            debug!(
                "[{:#04x}] write {} bytes @ {:#04x}",
                address,
                data.len(),
                bytes[0]
            );
        }
        trace!("[{:#04x}] tx {:02x?}", address, bytes);

        self.select(address)?;
        self.write(&bytes)
    }

    fn receive(&mut self, address: u8, register: u8, data: &mut [u8]) -> Result<()> {
        self.stats.reads += 1;
        debug!(
            "[{:#04x}] read {} bytes @ {:#04x}",
            address,
            data.len(),
            register & !COMMAND_BIT
        );

        self.select(address)?;
        self.write(&[register & !COMMAND_BIT])?;
        self.transport.read(data).map_err(|e| {
            self.stats.failures += 1;
            Error::transport(TransportOp::Read, e)
        })?;
        self.stats.bytes_read += data.len() as u64;
        trace!("[{:#04x}] rx {:02x?}", address, data);
        Ok(())
    }
}
