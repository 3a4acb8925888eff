//! Servo Register Cache.
//!
//! A [`Device`] mirrors the whole register space of one servo in a 128-byte
//! buffer. Writes only touch the buffer and mark the written bytes dirty;
//! [`Device::update`] later sends every contiguous dirty run as a single
//! burst write and reads a status window back. Dirty bits are cleared only
//! once the transaction carrying them has been confirmed, so a failed update
//! can simply be retried.

use std::collections::BTreeMap;
use std::ops::Range;

use log::{debug, warn};
use serde::Serialize;

use super::channel::Channel;
use crate::common::{Access, Error, Result};
use crate::registers::{self, Command, Register, SPACE_SIZE};

/// Cached register state of one servo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    address: u8,
    buffer: [u8; SPACE_SIZE],
    dirty: [bool; SPACE_SIZE],
    locked: bool,
}

/// Serializable view of a device's registers.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub address: u8,
    pub locked: bool,
    pub registers: BTreeMap<&'static str, u16>,
}

impl Device {
    /// Creates the cache for the servo at `address` and fills it with a full
    /// refresh.
    ///
    /// Fails without producing a device if the refresh fails.
    pub fn attach(channel: &mut dyn Channel, address: u8) -> Result<Self> {
        let mut device = Self {
            address,
            buffer: [0; SPACE_SIZE],
            dirty: [false; SPACE_SIZE],
            locked: true,
        };
        // Known from discovery, not a pending write.
        device.buffer[Register::Address.offset()] = address;
        device.refresh(channel, true)?;
        Ok(device)
    }

    /// Bus address the device was discovered at and is routed to.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The local mirror of the register space.
    pub fn registers(&self) -> &[u8; SPACE_SIZE] {
        &self.buffer
    }

    /// Cached value of `reg`, big-endian for two-byte registers.
    pub fn value(&self, reg: Register) -> u16 {
        let start = reg.offset();
        match reg.width() {
            2 => u16::from_be_bytes([self.buffer[start], self.buffer[start + 1]]),
            _ => self.buffer[start] as u16,
        }
    }

    /// Cached value of the register called `name`.
    pub fn get(&self, name: &str) -> Result<u16> {
        let reg = registers::resolve(name).ok_or_else(|| Error::UnknownRegister(name.to_string()))?;
        Ok(self.value(reg))
    }

    /// Firmware version as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        (
            self.value(Register::VersionMajor) as u8,
            self.value(Register::VersionMinor) as u8,
        )
    }

    /// Writes the low-order bytes of `value` into the cache and marks them
    /// dirty. Nothing is sent until [`update`](Self::update).
    pub fn write(&mut self, reg: Register, value: i32) -> Result<()> {
        match reg.access() {
            Access::ReadOnly => return Err(Error::ReadOnlyRegister(reg.name())),
            Access::Protected if self.locked => return Err(Error::Locked(reg.name())),
            _ => {}
        }

        let span = reg.span();
        match span.len() {
            2 => self.buffer[span.clone()].copy_from_slice(&(value as u16).to_be_bytes()),
            _ => self.buffer[span.start] = value as u8,
        }
        self.dirty[span].fill(true);
        Ok(())
    }

    /// Writes the register called `name`. See [`write`](Self::write).
    pub fn set(&mut self, name: &str, value: i32) -> Result<()> {
        let reg = registers::resolve(name).ok_or_else(|| Error::UnknownRegister(name.to_string()))?;
        self.write(reg, value)
    }

    /// Permits writes to protected registers until the next successful
    /// update, which wraps its flush in write-enable and write-disable.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Returns `true` if any byte of `reg` has an unflushed local write.
    pub fn is_dirty(&self, reg: Register) -> bool {
        self.dirty[reg.span()].iter().any(|&d| d)
    }

    pub fn has_pending(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// Contiguous dirty byte ranges, in address order. Each one becomes a
    /// single write transaction on the next update.
    pub fn pending_runs(&self) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut i = 0;
        while i < SPACE_SIZE {
            if !self.dirty[i] {
                i += 1;
                continue;
            }
            let start = i;
            while i < SPACE_SIZE && self.dirty[i] {
                i += 1;
            }
            runs.push(start..i);
        }
        runs
    }

    /// Flushes pending writes and refreshes the cache from the device.
    ///
    /// With `full` the whole defined register space is read back, otherwise
    /// only the live status window. On failure, bytes whose transaction was
    /// not confirmed stay dirty and the lock state is left as it was.
    pub fn update(&mut self, channel: &mut dyn Channel, full: bool) -> Result<()> {
        let unlocked = !self.locked;
        if unlocked {
            self.command(channel, Command::WriteEnable)?;
        }

        let runs = self.pending_runs();
        let total = runs.len();
        for (flushed, run) in runs.into_iter().enumerate() {
            let sent = channel.send(self.address, run.start as u8, &self.buffer[run.clone()]);
            if let Err(err) = sent {
                warn!(
                    "[{:#04x}] flush failed at {:#04x} ({} of {} runs sent)",
                    self.address, run.start, flushed, total
                );
                if flushed == 0 {
                    return Err(err);
                }
                return Err(Error::PartialFlushFailure {
                    address: self.address,
                    flushed,
                    total,
                    source: Box::new(err),
                });
            }
            self.dirty[run].fill(false);
        }

        if unlocked {
            self.command(channel, Command::WriteDisable)?;
            // The device is write-protected again from here on.
            self.locked = true;
        }

        self.refresh(channel, full)
    }

    /// Reads a register window into the cache and clears its dirty bits.
    fn refresh(&mut self, channel: &mut dyn Channel, full: bool) -> Result<()> {
        let window = if full {
            registers::full_window()
        } else {
            registers::status_window()
        };
        let mut data = vec![0u8; window.len()];
        channel.receive(self.address, window.start as u8, &mut data)?;

        debug!(
            "[{:#04x}] refreshed {:#04x}..{:#04x}",
            self.address, window.start, window.end
        );
        self.buffer[window.clone()].copy_from_slice(&data);
        self.dirty[window].fill(false);
        Ok(())
    }

    fn command(&self, channel: &mut dyn Channel, command: Command) -> Result<()> {
        channel.send(self.address, command.code(), &[])
    }

    pub fn reset(&self, channel: &mut dyn Channel) -> Result<()> {
        self.command(channel, Command::Reset)
    }

    /// Turns the PWM output on.
    pub fn enable(&self, channel: &mut dyn Channel) -> Result<()> {
        self.command(channel, Command::PwmEnable)
    }

    /// Turns the PWM output off.
    pub fn disable(&self, channel: &mut dyn Channel) -> Result<()> {
        self.command(channel, Command::PwmDisable)
    }

    /// Saves the device's configuration registers to its EEPROM.
    pub fn registers_commit(&self, channel: &mut dyn Channel) -> Result<()> {
        self.command(channel, Command::RegistersSave)
    }

    /// Reloads the configuration registers from EEPROM.
    pub fn registers_restore(&self, channel: &mut dyn Channel) -> Result<()> {
        self.command(channel, Command::RegistersRestore)
    }

    /// Restores factory defaults of the configuration registers.
    pub fn registers_default(&self, channel: &mut dyn Channel) -> Result<()> {
        self.command(channel, Command::RegistersDefault)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            address: self.address,
            locked: self.locked,
            registers: Register::ALL
                .iter()
                .map(|&reg| (reg.name(), self.value(reg)))
                .collect(),
        }
    }
}
