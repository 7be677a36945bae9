use std::fmt;

use crate::log::Log;

/// Size of the addressable memory space.
pub const MEMORY_SIZE: usize = 0x10000;
/// Address where a loaded program begins.
pub const PAGE_PROGRAM: u16 = 0x0100;
/// Capacity of each stack in bytes.
pub const STACK_SIZE: usize = 0x100;

/// Terminal error conditions detected by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Underflow,
    Overflow,
    DivisionByZero,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Underflow => write!(f, "underflow"),
            FaultKind::Overflow => write!(f, "overflow"),
            FaultKind::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

/// A fault as reported by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub op: String,
    pub address: u16,
}

/// Why execution was forced to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The program wrote the system halt register.
    Requested,
    Fault(Fault),
    /// The reset vector could not be evaluated.
    ResetFailed,
}

/// The 64 KiB byte-addressable memory space.
pub struct Memory {
    bytes: Box<[u8; MEMORY_SIZE]>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; MEMORY_SIZE]),
        }
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    pub fn set(&mut self, addr: u16, byte: u8) {
        self.bytes[addr as usize] = byte;
    }

    pub fn get16(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.get(addr), self.get(addr.wrapping_add(1))])
    }

    pub fn set16(&mut self, addr: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.set(addr, hi);
        self.set(addr.wrapping_add(1), lo);
    }

    /// Up to `len` bytes starting at `addr`, stopping at the end of memory.
    pub fn span(&self, addr: u16, len: usize) -> &[u8] {
        let start = addr as usize;
        let end = start.saturating_add(len).min(MEMORY_SIZE);
        &self.bytes[start..end]
    }

    pub fn span_mut(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let start = addr as usize;
        let end = start.saturating_add(len).min(MEMORY_SIZE);
        &mut self.bytes[start..end]
    }

    /// The NUL-terminated byte string at `addr`, without its terminator.
    pub fn c_str(&self, addr: u16) -> &[u8] {
        let tail = &self.bytes[addr as usize..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        &tail[..end]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..]
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// A 256-byte stack with an 8-bit pointer.
///
/// The pointer counts the valid entries and doubles as the next write index,
/// so at most 255 entries fit. Pushing onto a full stack or popping an empty
/// one is a fault, never a wrap.
#[derive(Clone)]
pub struct Stack {
    data: [u8; STACK_SIZE],
    ptr: u8,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            data: [0; STACK_SIZE],
            ptr: 0,
        }
    }

    pub fn ptr(&self) -> u8 {
        self.ptr
    }

    pub fn is_empty(&self) -> bool {
        self.ptr == 0
    }

    pub fn push(&mut self, byte: u8) -> Result<(), FaultKind> {
        let next = self.ptr.checked_add(1).ok_or(FaultKind::Overflow)?;
        self.data[self.ptr as usize] = byte;
        self.ptr = next;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u8, FaultKind> {
        self.ptr = self.ptr.checked_sub(1).ok_or(FaultKind::Underflow)?;
        Ok(self.data[self.ptr as usize])
    }

    pub fn peek(&self) -> Result<u8, FaultKind> {
        self.ptr
            .checked_sub(1)
            .map(|i| self.data[i as usize])
            .ok_or(FaultKind::Underflow)
    }

    pub fn data(&self) -> &[u8; STACK_SIZE] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data = [0; STACK_SIZE];
        self.ptr = 0;
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a device may reach besides its own registers.
pub struct MachineState {
    pub memory: Memory,
    pub wst: Stack,
    pub rst: Stack,
    /// Next instruction address; 0 means halted.
    pub pp: u16,
    /// Set when something other than the end of a vector stopped execution.
    pub halt: Option<HaltReason>,
    pub log: Log,
}

impl MachineState {
    pub fn new(log: Log) -> Self {
        Self {
            memory: Memory::new(),
            wst: Stack::new(),
            rst: Stack::new(),
            pp: PAGE_PROGRAM,
            halt: None,
            log,
        }
    }

    pub fn reset(&mut self) {
        self.memory.clear();
        self.wst.clear();
        self.rst.clear();
        self.pp = PAGE_PROGRAM;
        self.halt = None;
    }

    /// Force the program pointer to the halted sentinel.
    pub fn halt(&mut self, reason: HaltReason) {
        self.pp = 0;
        self.halt = Some(reason);
    }
}
