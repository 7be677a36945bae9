pub mod clock;
pub mod device;
pub mod error;
pub mod file;
pub mod host;
pub mod inspect;
pub mod log;
pub mod machine;
pub mod register;
pub mod state;

pub use device::{DeviceBus, DeviceKind};
pub use error::{BusError, MachineError, Result};
pub use machine::{Interpreter, Machine, MachineConfig, Status};
pub use state::{Fault, FaultKind, HaltReason, PAGE_PROGRAM};
