use thiserror::Error;

/// Failures surfaced by the register cache and architecture lookups.
///
/// Caller bugs (out-of-range register numbers, oversized partial transfers)
/// are not represented here; those panic.
#[derive(Error, Debug)]
pub enum Error {
    /// The target explicitly could not provide this register for the current stop.
    #[error("register {name} is unavailable")]
    Unavailable { regnum: usize, name: String },
    /// A detached cache was asked for a register it never received.
    #[error("register {name} is not cached in this detached register set")]
    NotCached { regnum: usize, name: String },
    /// The shared target is already in the middle of a register request.
    #[error("target is busy servicing another register request")]
    TargetBusy,
    #[error("architecture {0} has no program counter register")]
    NoProgramCounter(String),
    #[error("unknown register: {0}")]
    UnknownRegister(String),
    #[error("unknown architecture: {0}")]
    UnknownArchitecture(String),
    /// Whatever the target reported when a fetch or store failed.
    #[error("target I/O failed")]
    TargetIo(#[from] anyhow::Error),
}

impl Error {
    /// Whether this is the "value exists but cannot be shown" condition that
    /// printers render as `<unavailable>`.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable { .. } | Error::NotCached { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
