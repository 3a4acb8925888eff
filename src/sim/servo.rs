//! Virtual OpenServo.
//!
//! A register-level model of one servo as seen from the bus: a 128-byte
//! register file, the register pointer set by the first byte of every write,
//! write-enable gating for protected registers, and the save / restore /
//! default commands backed by an emulated EEPROM image.

use crate::common::Access;
use crate::registers::{Command, Register, SPACE_SIZE};

/// First byte of the protected configuration block.
const PROTECTED_START: usize = 0x20;

/// Bit in the `flags` low byte reporting an enabled PWM output.
const FLAG_PWM_ENABLED: u8 = 0x01;

/// One simulated servo attached to a [`SimTransport`](super::SimTransport).
#[derive(Clone, Debug)]
pub struct VirtualServo {
    registers: [u8; SPACE_SIZE],
    eeprom: [u8; SPACE_SIZE],
    pointer: usize,
    write_enabled: bool,
    pwm_enabled: bool,
}

impl VirtualServo {
    /// Creates a servo answering at `address` with factory defaults.
    pub fn new(address: u8) -> Self {
        let registers = Self::factory(address);
        Self {
            registers,
            eeprom: registers,
            pointer: 0,
            write_enabled: false,
            pwm_enabled: false,
        }
    }

    fn factory(address: u8) -> [u8; SPACE_SIZE] {
        let mut regs = [0u8; SPACE_SIZE];
        let mut put = |reg: Register, value: u16| {
            let span = reg.span();
            if span.len() == 2 {
                regs[span].copy_from_slice(&value.to_be_bytes());
            } else {
                regs[span.start] = value as u8;
            }
        };
        put(Register::Type, 0x01);
        put(Register::Subtype, 0x01);
        put(Register::VersionMajor, 0x00);
        put(Register::VersionMinor, 0x0A);
        put(Register::Position, 0x0200);
        put(Register::Seek, 0x0200);
        put(Register::Address, address as u16);
        put(Register::PidDeadband, 0x02);
        put(Register::PidProportional, 0x0600);
        put(Register::PidDerivative, 0x0C00);
        put(Register::PwmDivider, 0x0040);
        put(Register::SeekMin, 0x0060);
        put(Register::SeekMax, 0x03A0);
        put(Register::Cutoff, 0x03FF);
        put(Register::CutoffSoft, 0x0300);
        regs
    }

    /// Current value of a register, big-endian for two-byte registers.
    pub fn register(&self, reg: Register) -> u16 {
        let span = reg.span();
        if span.len() == 2 {
            u16::from_be_bytes([self.registers[span.start], self.registers[span.start + 1]])
        } else {
            self.registers[span.start] as u16
        }
    }

    /// Sets a register from the firmware side, bypassing access checks.
    pub fn set_register(&mut self, reg: Register, value: u16) {
        let span = reg.span();
        if span.len() == 2 {
            self.registers[span].copy_from_slice(&value.to_be_bytes());
        } else {
            self.registers[span.start] = value as u8;
        }
    }

    /// Raw register file.
    pub fn registers(&self) -> &[u8; SPACE_SIZE] {
        &self.registers
    }

    pub fn is_write_enabled(&self) -> bool {
        self.write_enabled
    }

    pub fn is_pwm_enabled(&self) -> bool {
        self.pwm_enabled
    }

    /// Handles one write transaction addressed to this servo.
    pub(crate) fn handle_write(&mut self, bytes: &[u8]) {
        let Some((&first, payload)) = bytes.split_first() else {
            return;
        };

        if first & 0x80 != 0 {
            if let Some(command) = Command::from_code(first) {
                self.execute(command);
            }
            return;
        }

        self.pointer = first as usize;
        for &byte in payload {
            let offset = self.pointer % SPACE_SIZE;
            if self.accepts_write(offset) {
                self.registers[offset] = byte;
            }
            self.pointer += 1;
        }
    }

    /// Handles one read transaction, streaming from the register pointer.
    pub(crate) fn handle_read(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.registers[self.pointer % SPACE_SIZE];
            self.pointer += 1;
        }
    }

    fn accepts_write(&self, offset: usize) -> bool {
        let class = Register::ALL
            .iter()
            .find(|reg| reg.span().contains(&offset))
            .map(|reg| reg.access());
        match class {
            Some(Access::Writable) => true,
            Some(Access::Protected) => self.write_enabled,
            Some(Access::ReadOnly) | None => false,
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Reset => {
                self.write_enabled = false;
                self.set_pwm(false);
                self.registers[PROTECTED_START..].copy_from_slice(&self.eeprom[PROTECTED_START..]);
            }
            Command::PwmEnable => self.set_pwm(true),
            Command::PwmDisable => self.set_pwm(false),
            Command::WriteEnable => self.write_enabled = true,
            Command::WriteDisable => self.write_enabled = false,
            Command::RegistersSave => {
                self.eeprom[PROTECTED_START..].copy_from_slice(&self.registers[PROTECTED_START..]);
            }
            Command::RegistersRestore => {
                self.registers[PROTECTED_START..].copy_from_slice(&self.eeprom[PROTECTED_START..]);
            }
            Command::RegistersDefault => {
                let address = self.registers[Register::Address.offset()];
                let defaults = Self::factory(address);
                self.registers[PROTECTED_START..].copy_from_slice(&defaults[PROTECTED_START..]);
            }
        }
    }

    fn set_pwm(&mut self, enabled: bool) {
        self.pwm_enabled = enabled;
        let flags_lo = Register::Flags.offset() + 1;
        if enabled {
            self.registers[flags_lo] |= FLAG_PWM_ENABLED;
        } else {
            self.registers[flags_lo] &= !FLAG_PWM_ENABLED;
        }
    }
}
