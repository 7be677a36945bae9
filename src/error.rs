use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MachineError>;

/// Setup-time device bus misconfiguration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("port {0:#x} is outside the 16-port bus")]
    InvalidPort(u8),
    #[error("port {0:#x} already has a device attached")]
    PortTaken(u8),
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("cannot open rom {}: {source}", .path.display())]
    RomOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no program loaded")]
    NotLoaded,
    #[error("reset vector failed")]
    ResetFailed,
    #[error(transparent)]
    Bus(#[from] BusError),
}
