//! Servo Register Map.
//!
//! Static description of the OpenServo register space: symbolic name,
//! byte offset, width, and access class of every register, plus the
//! command codes understood by the firmware. The table is generated once by
//! `register_map!` and is immutable; devices share it by reference.
//!
//! Names are matched after normalization: ASCII letters are lower-cased and
//! `_` becomes `.`, so `"PID_DEADBAND"` and `"pid.deadband"` are the same
//! register.

use std::ops::Range;

use crate::common::Access;

/// Size of a servo's register address space in bytes.
pub const SPACE_SIZE: usize = 0x80;

/// Immutable description of one register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterDescriptor {
    /// Normalized register name.
    pub name: &'static str,
    /// Byte offset into the device address space.
    pub offset: u8,
    /// Width in bytes (1 or 2, multi-byte values are big-endian).
    pub width: u8,
    /// Access class.
    pub access: Access,
}

impl RegisterDescriptor {
    /// Byte range covered by the register.
    pub fn span(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.width as usize
    }
}

macro_rules! register_map {
    ($($variant:ident => $name:literal, $offset:literal, $width:literal, $access:ident;)+) => {
        /// Symbolic servo register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Register {
            $($variant),+
        }

        static DESCRIPTORS: &[RegisterDescriptor] = &[
            $(RegisterDescriptor {
                name: $name,
                offset: $offset,
                width: $width,
                access: Access::$access,
            }),+
        ];

        impl Register {
            /// Every register, in address order.
            pub const ALL: &'static [Register] = &[$(Register::$variant),+];
        }
    };
}

register_map! {
    Type => "type", 0x00, 1, ReadOnly;
    Subtype => "subtype", 0x01, 1, ReadOnly;
    VersionMajor => "version.major", 0x02, 1, ReadOnly;
    VersionMinor => "version.minor", 0x03, 1, ReadOnly;
    Flags => "flags", 0x04, 2, ReadOnly;
    Timer => "timer", 0x06, 2, ReadOnly;
    Position => "position", 0x08, 2, ReadOnly;
    Velocity => "velocity", 0x0A, 2, ReadOnly;
    Power => "power", 0x0C, 2, ReadOnly;
    PwmCw => "pwm.cw", 0x0E, 1, ReadOnly;
    PwmCcw => "pwm.ccw", 0x0F, 1, ReadOnly;
    Seek => "seek", 0x10, 2, Writable;
    SeekVelocity => "seek.velocity", 0x12, 2, Writable;
    Voltage => "voltage", 0x14, 2, Writable;
    Address => "address", 0x20, 1, Protected;
    PidDeadband => "pid.deadband", 0x21, 1, Protected;
    PidProportional => "pid.proportional", 0x22, 2, Protected;
    PidDerivative => "pid.derivative", 0x24, 2, Protected;
    PidIntegral => "pid.integral", 0x26, 2, Protected;
    PwmDivider => "pwm.divider", 0x28, 2, Protected;
    SeekMin => "seek.min", 0x2A, 2, Protected;
    SeekMax => "seek.max", 0x2C, 2, Protected;
    SeekReverse => "seek.reverse", 0x2E, 1, Protected;
    Servo => "servo", 0x30, 2, Protected;
    Cutoff => "cutoff", 0x32, 2, Protected;
    CutoffSoft => "cutoff.soft", 0x34, 2, Protected;
}

impl Register {
    /// Full descriptor of the register.
    pub fn descriptor(self) -> &'static RegisterDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn offset(self) -> usize {
        self.descriptor().offset as usize
    }

    pub fn width(self) -> usize {
        self.descriptor().width as usize
    }

    pub fn access(self) -> Access {
        self.descriptor().access
    }

    pub fn span(self) -> Range<usize> {
        self.descriptor().span()
    }
}

/// Device-side action invoked by a zero-payload command transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Reset = 0x80,
    PwmEnable = 0x82,
    PwmDisable = 0x83,
    WriteEnable = 0x84,
    WriteDisable = 0x85,
    RegistersSave = 0x86,
    RegistersRestore = 0x87,
    RegistersDefault = 0x88,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a command byte as seen on the wire.
    pub fn from_code(code: u8) -> Option<Command> {
        let command = match code | 0x80 {
            0x80 => Command::Reset,
            0x82 => Command::PwmEnable,
            0x83 => Command::PwmDisable,
            0x84 => Command::WriteEnable,
            0x85 => Command::WriteDisable,
            0x86 => Command::RegistersSave,
            0x87 => Command::RegistersRestore,
            0x88 => Command::RegistersDefault,
            _ => return None,
        };
        Some(command)
    }
}

/// Normalizes a register name: ASCII letters lower-cased, `_` mapped to `.`.
pub fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '_' => '.',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Looks up a register by name. A miss is `None`, not an error.
pub fn resolve(name: &str) -> Option<Register> {
    let name = normalize(name);
    Register::ALL.iter().copied().find(|reg| reg.name() == name)
}

pub fn access_of(name: &str) -> Option<Access> {
    resolve(name).map(Register::access)
}

pub fn width_of(name: &str) -> Option<usize> {
    resolve(name).map(Register::width)
}

/// Names of every register, in address order.
pub fn list_names() -> impl Iterator<Item = &'static str> {
    Register::ALL.iter().map(|reg| reg.name())
}

pub fn exists(name: &str) -> bool {
    resolve(name).is_some()
}

pub fn is_read_only(name: &str) -> bool {
    access_of(name) == Some(Access::ReadOnly)
}

pub fn is_protected(name: &str) -> bool {
    access_of(name) == Some(Access::Protected)
}

/// Byte window refreshed by a full update: offset 0 through the last byte
/// of the highest defined register.
pub fn full_window() -> Range<usize> {
    let end = Register::ALL
        .iter()
        .map(|reg| reg.span().end)
        .max()
        .unwrap_or(0);
    0..end
}

/// Volatile status window refreshed by a regular update, from `flags`
/// through `voltage`.
pub fn status_window() -> Range<usize> {
    Register::Flags.offset()..Register::Voltage.span().end
}
