//! The 16-port device bus.
//!
//! Every port owns a [`RegisterWindow`] and a [`DeviceKind`] selecting its
//! talk behavior. Reads let the device refresh its registers before the byte
//! is returned; writes commit the byte before the device reacts, so a device
//! always sees the post-write window.

use std::io::Write;

use crate::clock::DateTime;
use crate::error::BusError;
use crate::file;
use crate::host::Host;
use crate::register::RegisterWindow;
use crate::state::{HaltReason, MachineState};

/// Number of ports on the bus.
pub const PORT_COUNT: usize = 16;

pub const SYSTEM_PORT: u8 = 0x0;
pub const CONSOLE_PORT: u8 = 0x1;
pub const FILE_PORT: u8 = 0xa;
pub const DATETIME_PORT: u8 = 0xb;

/// Console register holding the input vector (a short).
pub const CONSOLE_VECTOR: u8 = 0x0;
/// Console register receiving each input byte.
pub const CONSOLE_READ: u8 = 0x2;

/// The closed set of device behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Stack pointer mirrors, stack dump and halt.
    System,
    /// Byte output to stdout or stderr; holds the input vector.
    Console,
    /// Synchronous host file load and save.
    File,
    /// Host wall-clock snapshot.
    DateTime,
    /// No behavior beyond the register window.
    Empty,
}

/// Port assignment used when booting a standard machine.
pub const STANDARD_LAYOUT: [(u8, &str, DeviceKind); 4] = [
    (SYSTEM_PORT, "system", DeviceKind::System),
    (CONSOLE_PORT, "console", DeviceKind::Console),
    (FILE_PORT, "file", DeviceKind::File),
    (DATETIME_PORT, "datetime", DeviceKind::DateTime),
];

#[derive(Debug, Clone)]
pub struct Device {
    port: u8,
    name: &'static str,
    kind: DeviceKind,
    pub window: RegisterWindow,
}

impl Device {
    fn new(port: u8, name: &'static str, kind: DeviceKind) -> Self {
        Self {
            port,
            name,
            kind,
            window: RegisterWindow::new(),
        }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Talk behavior for a read of `sub`, run before the byte is returned.
    fn on_read(&mut self, state: &mut MachineState, host: &mut Host, _sub: u8) {
        match self.kind {
            DeviceKind::System => {
                self.window.set(0x2, state.wst.ptr());
                self.window.set(0x3, state.rst.ptr());
            }
            DeviceKind::DateTime => host.clock.now().write_to(&mut self.window),
            DeviceKind::Console | DeviceKind::File | DeviceKind::Empty => {}
        }
    }

    /// Talk behavior for a write to `sub`, run after the byte is committed.
    fn on_write(&mut self, state: &mut MachineState, host: &mut Host, sub: u8) {
        match self.kind {
            DeviceKind::System => match sub {
                0xe => dump_stack(state),
                0xf => {
                    state.log.info(format!("Halted by system at #{:04x}", state.pp));
                    state.halt(HaltReason::Requested);
                }
                _ => {}
            },
            DeviceKind::Console if sub > 0x7 => {
                let byte = self.window.get(sub);
                if let Some(stream) = host.stream(sub - 0x7) {
                    if let Err(e) = stream.write_all(&[byte]).and_then(|_| stream.flush()) {
                        state.log.warn(format!("Console write failed: {e}"));
                    }
                }
            }
            DeviceKind::File => file::talk(&mut self.window, state, sub),
            DeviceKind::Console | DeviceKind::DateTime | DeviceKind::Empty => {}
        }
    }
}

/// Log the working stack as an 8x8 grid, bracketing the cell at the pointer.
fn dump_stack(state: &mut MachineState) {
    let ptr = state.wst.ptr() as usize;
    let data = state.wst.data();
    let rows: Vec<String> = (0..8)
        .map(|y| {
            (0..8)
                .map(|x| {
                    let p = y * 8 + x;
                    if p == ptr {
                        format!("[{:02x}]", data[p])
                    } else {
                        format!(" {:02x} ", data[p])
                    }
                })
                .collect()
        })
        .collect();
    state.log.info("Working stack:");
    for row in rows {
        state.log.info(row);
    }
}

/// The fixed array of sixteen devices, indexed by port.
#[derive(Debug, Clone)]
pub struct DeviceBus {
    devices: [Device; PORT_COUNT],
    attached: u16,
}

impl DeviceBus {
    /// A bus with every port holding an empty device.
    pub fn new() -> Self {
        Self {
            devices: std::array::from_fn(|port| Device::new(port as u8, "empty", DeviceKind::Empty)),
            attached: 0,
        }
    }

    /// Build a bus from `(port, name, kind)` assignments; unlisted ports stay empty.
    pub fn from_layout(layout: &[(u8, &'static str, DeviceKind)]) -> Result<Self, BusError> {
        let mut bus = Self::new();
        for &(port, name, kind) in layout {
            bus.attach(port, name, kind)?;
        }
        Ok(bus)
    }

    /// System, console, file and datetime on their usual ports.
    pub fn standard() -> Result<Self, BusError> {
        Self::from_layout(&STANDARD_LAYOUT)
    }

    /// Assign a behavior to a port. Each port may be assigned once.
    pub fn attach(&mut self, port: u8, name: &'static str, kind: DeviceKind) -> Result<(), BusError> {
        if port as usize >= PORT_COUNT {
            return Err(BusError::InvalidPort(port));
        }
        let bit = 1u16 << port;
        if self.attached & bit != 0 {
            return Err(BusError::PortTaken(port));
        }
        self.attached |= bit;
        self.devices[port as usize] = Device::new(port, name, kind);
        Ok(())
    }

    pub fn device(&self, port: u8) -> &Device {
        &self.devices[(port & 0x0f) as usize]
    }

    pub fn device_mut(&mut self, port: u8) -> &mut Device {
        &mut self.devices[(port & 0x0f) as usize]
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Route one register access. `Some(byte)` writes, `None` reads; either
    /// way the returned value is the register after the device has talked.
    pub fn route(
        &mut self,
        state: &mut MachineState,
        host: &mut Host,
        port: u8,
        sub: u8,
        byte: Option<u8>,
    ) -> u8 {
        let sub = sub & 0x0f;
        let device = self.device_mut(port);
        match byte {
            None => device.on_read(state, host, sub),
            Some(b) => {
                device.window.set(sub, b);
                device.on_write(state, host, sub);
            }
        }
        device.window.get(sub)
    }

    pub fn read(&mut self, state: &mut MachineState, host: &mut Host, port: u8, sub: u8) -> u8 {
        self.route(state, host, port, sub, None)
    }

    pub fn write(&mut self, state: &mut MachineState, host: &mut Host, port: u8, sub: u8, byte: u8) {
        self.route(state, host, port, sub, Some(byte));
    }

    /// Current datetime registers decoded, without refreshing them.
    pub fn datetime_registers(&self) -> DateTime {
        DateTime::read_from(&self.device(DATETIME_PORT).window)
    }
}

impl Default for DeviceBus {
    fn default() -> Self {
        Self::new()
    }
}
