//! The machine context and its execution controls.
//!
//! A [`Machine`] owns memory, both stacks, the program pointer, the device bus
//! and the host streams. Instruction execution is delegated to an
//! [`Interpreter`], which calls back into the machine for every device access
//! and every fault.

use std::io::{self, Read};
use std::path::Path;

use crate::device::{CONSOLE_PORT, CONSOLE_READ, CONSOLE_VECTOR, DeviceBus, DeviceKind, STANDARD_LAYOUT};
use crate::error::{MachineError, Result};
use crate::host::Host;
use crate::log::{self, Log};
use crate::state::{
    Fault, FaultKind, HaltReason, MEMORY_SIZE, MachineState, Memory, PAGE_PROGRAM, Stack,
};

/// Executes instructions on behalf of a [`Machine`].
///
/// Implementations must stop as soon as [`Machine::is_running`] turns false:
/// a program pointer of 0 is the halted sentinel. Device registers are reached
/// through [`Machine::device_read`] and [`Machine::device_write`], and stack or
/// arithmetic errors are reported through [`Machine::on_fault`].
pub trait Interpreter {
    /// Run from `entry` until the vector ends or the machine halts.
    ///
    /// Returns false if evaluation could not start.
    fn evaluate(&mut self, machine: &mut Machine, entry: u16) -> bool;

    /// Execute the single instruction at the current program pointer.
    ///
    /// Returns false once there is nothing left to execute.
    fn step(&mut self, machine: &mut Machine) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unloaded,
    Loaded,
    Running,
    Stepping,
    Halted,
}

/// Setup-time options for a [`Machine`].
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Echo log lines to stderr as they are recorded.
    pub echo_log: bool,
    /// Color echoed log lines when stderr is a terminal.
    pub color: bool,
    /// Log lines retained before the oldest are dropped.
    pub log_lines: usize,
    /// Port assignments; unlisted ports get an empty device.
    pub layout: Vec<(u8, &'static str, DeviceKind)>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            echo_log: false,
            color: true,
            log_lines: log::DEFAULT_CAPACITY,
            layout: STANDARD_LAYOUT.to_vec(),
        }
    }
}

pub struct Machine {
    state: MachineState,
    bus: DeviceBus,
    host: Host,
    layout: Vec<(u8, &'static str, DeviceKind)>,
    status: Status,
}

impl Machine {
    /// Build and boot a machine. A bad port layout is rejected here, before
    /// anything can execute.
    pub fn new(config: MachineConfig, host: Host) -> Result<Self> {
        let log = if config.echo_log {
            Log::echoing(config.color)
        } else {
            Log::new()
        }
        .with_capacity(config.log_lines);
        let bus = DeviceBus::from_layout(&config.layout)?;
        let mut machine = Self {
            state: MachineState::new(log),
            bus,
            host,
            layout: config.layout,
            status: Status::Unloaded,
        };
        machine.boot()?;
        Ok(machine)
    }

    /// Clear memory and stacks, rewind the program pointer and recreate
    /// every device.
    pub fn boot(&mut self) -> Result<()> {
        self.bus = DeviceBus::from_layout(&self.layout)?;
        self.state.reset();
        self.status = Status::Unloaded;
        Ok(())
    }

    /// Copy a ROM file into memory at the program page.
    ///
    /// On failure the machine keeps its previous status.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let rom = match std::fs::read(path) {
            Ok(rom) => rom,
            Err(source) => {
                self.state.log.error(format!("Load failed: {}", path.display()));
                return Err(MachineError::RomOpen {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let n = self.load_bytes(&rom);
        self.state.log.info(format!("Loaded {}", path.display()));
        Ok(n)
    }

    /// Copy a ROM image into memory at the program page. Bytes past the end
    /// of memory are dropped; memory past the image is left as it was.
    pub fn load_bytes(&mut self, rom: &[u8]) -> usize {
        let n = rom.len().min(MEMORY_SIZE - PAGE_PROGRAM as usize);
        self.state.memory.span_mut(PAGE_PROGRAM, n).copy_from_slice(&rom[..n]);
        self.state.pp = PAGE_PROGRAM;
        self.status = Status::Loaded;
        self.state.halt = None;
        n
    }

    /// Evaluate the reset vector, then feed `input` to the console vector one
    /// byte at a time.
    ///
    /// This blocks until `input` is exhausted. With stdin that means until
    /// the stream is closed; there is no other way to cancel it.
    pub fn run<I: Interpreter + ?Sized>(&mut self, interp: &mut I, mut input: impl Read) -> Result<()> {
        if self.status == Status::Unloaded {
            return Err(MachineError::NotLoaded);
        }
        self.status = Status::Running;
        self.state.halt = None;

        if !self.eval_vector(interp, PAGE_PROGRAM) {
            self.state.log.error("Reset: Failed");
            self.state.halt(HaltReason::ResetFailed);
            self.status = Status::Halted;
            return Err(MachineError::ResetFailed);
        }

        let mut byte = [0u8; 1];
        while self.state.halt.is_none() {
            let vector = self.console_vector();
            if vector == 0 {
                break;
            }
            match input.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    self.bus.device_mut(CONSOLE_PORT).window.set(CONSOLE_READ, byte[0]);
                    self.eval_vector(interp, vector);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.state.log.warn(format!("Console input failed: {e}"));
                    break;
                }
            }
        }

        self.status = Status::Halted;
        Ok(())
    }

    /// Point the program pointer at the program page and enter single-step
    /// mode.
    pub fn init_step(&mut self) -> Result<()> {
        if self.status == Status::Unloaded {
            return Err(MachineError::NotLoaded);
        }
        self.state.pp = PAGE_PROGRAM;
        self.state.halt = None;
        self.status = Status::Stepping;
        Ok(())
    }

    /// Execute one instruction. Returns whether the machine can keep stepping.
    pub fn step<I: Interpreter + ?Sized>(&mut self, interp: &mut I) -> Result<bool> {
        match self.status {
            Status::Unloaded => return Err(MachineError::NotLoaded),
            Status::Stepping => {}
            _ => self.init_step()?,
        }
        let more = interp.step(self) && self.is_running() && self.state.halt.is_none();
        if !more {
            self.status = Status::Halted;
        }
        Ok(more)
    }

    fn eval_vector<I: Interpreter + ?Sized>(&mut self, interp: &mut I, entry: u16) -> bool {
        self.state.pp = entry;
        interp.evaluate(self, entry)
    }

    /// Fault hook for the interpreter. Always halts; the return value tells
    /// the interpreter whether to continue, which is never.
    pub fn on_fault(&mut self, kind: FaultKind, op: &str, address: u16) -> bool {
        self.state
            .log
            .error(format!("Halted: {op} {kind}, at #{address:04x}"));
        self.state.halt(HaltReason::Fault(Fault {
            kind,
            op: op.to_string(),
            address,
        }));
        false
    }

    /// Register read hook: the device refreshes before the byte is returned.
    pub fn device_read(&mut self, port: u8, sub: u8) -> u8 {
        self.bus.read(&mut self.state, &mut self.host, port, sub)
    }

    /// Register write hook: the byte is committed before the device reacts.
    pub fn device_write(&mut self, port: u8, sub: u8, byte: u8) {
        self.bus.write(&mut self.state, &mut self.host, port, sub, byte);
    }

    /// Read through an 8-bit device address, port in the high nibble.
    pub fn dei(&mut self, addr: u8) -> u8 {
        self.device_read(addr >> 4, addr & 0x0f)
    }

    pub fn deo(&mut self, addr: u8, byte: u8) {
        self.device_write(addr >> 4, addr & 0x0f, byte);
    }

    pub fn is_running(&self) -> bool {
        self.state.pp != 0
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn halt_reason(&self) -> Option<&HaltReason> {
        self.state.halt.as_ref()
    }

    pub fn program_pointer(&self) -> u16 {
        self.state.pp
    }

    pub fn set_program_pointer(&mut self, pp: u16) {
        self.state.pp = pp;
    }

    pub fn console_vector(&self) -> u16 {
        self.bus.device(CONSOLE_PORT).window.get16(CONSOLE_VECTOR)
    }

    pub fn memory(&self) -> &Memory {
        &self.state.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.state.memory
    }

    pub fn wst(&self) -> &Stack {
        &self.state.wst
    }

    pub fn wst_mut(&mut self) -> &mut Stack {
        &mut self.state.wst
    }

    pub fn rst(&self) -> &Stack {
        &self.state.rst
    }

    pub fn rst_mut(&mut self) -> &mut Stack {
        &mut self.state.rst
    }

    pub fn bus(&self) -> &DeviceBus {
        &self.bus
    }

    pub fn log(&self) -> &Log {
        &self.state.log
    }

    pub fn log_mut(&mut self) -> &mut Log {
        &mut self.state.log
    }
}
