//! Register Access Classes.
//!
//! Every register in a servo's address space belongs to exactly one access
//! class. The class decides whether the host may write the register at all
//! and whether a write-enable sequence has to wrap the flush.

/// Access class of a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// Maintained by the servo firmware; host writes are rejected.
    ReadOnly,

    /// Configuration register.
    ///
    /// Writable only after an explicit unlock. The flush that carries the
    /// write is wrapped in write-enable / write-disable commands.
    Protected,

    /// Freely writable control register.
    Writable,
}

impl Access {
    /// Returns `true` if the host may ever write a register of this class.
    pub fn is_writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}
