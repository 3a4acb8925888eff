//! Driver Errors.
//!
//! A single error enum covers the three failure families of the driver:
//! register-name problems reported at `get`/`set`, transport failures at the
//! collaborator boundary, and configuration problems. Transport errors never
//! discard confirmed state; callers decide whether to retry.

use std::fmt;
use std::io;

use thiserror::Error;

/// Transport operation that was in flight when a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportOp {
    Open,
    Close,
    Select,
    Write,
    Read,
    Probe,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportOp::Open => "open",
            TransportOp::Close => "close",
            TransportOp::Select => "select",
            TransportOp::Write => "write",
            TransportOp::Read => "read",
            TransportOp::Probe => "probe",
        };
        f.write_str(name)
    }
}

/// Errors returned by register, device, and bus operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport {op} failed: {source}")]
    TransportUnavailable {
        op: TransportOp,
        #[source]
        source: io::Error,
    },

    #[error("no transport is open on this bus")]
    NotOpen,

    #[error("invalid transport locator `{0}`")]
    InvalidLocator(String),

    #[error("unknown register `{0}`")]
    UnknownRegister(String),

    #[error("register `{0}` is read-only")]
    ReadOnlyRegister(&'static str),

    #[error("register `{0}` is protected and the device is locked")]
    Locked(&'static str),

    /// A data write inside `update` failed after earlier runs were confirmed.
    ///
    /// Dirty bits of the confirmed runs are cleared; the failed run and every
    /// run after it are still pending.
    #[error("flush to device {address:#04x} stopped after {flushed} of {total} runs")]
    PartialFlushFailure {
        address: u8,
        flushed: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("no device at address {0:#04x}")]
    NoDevice(u8),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn transport(op: TransportOp, source: io::Error) -> Self {
        Error::TransportUnavailable { op, source }
    }

    /// Returns `true` if the failure happened at the transport boundary.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::TransportUnavailable { .. } | Error::NotOpen => true,
            Error::PartialFlushFailure { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
