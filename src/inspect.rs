//! Text renderings of machine state for the command line.

use std::fmt::Write;

use crate::device::DeviceBus;

/// Render `rows` lines of `cols` bytes starting at `start`, with the address
/// of each row on the left. The byte at `highlight` is bracketed.
///
/// Indices wrap around the end of `bytes`.
pub fn hex_grid(bytes: &[u8], start: usize, cols: usize, rows: usize, highlight: Option<usize>) -> String {
    let mut out = String::new();
    if bytes.is_empty() {
        return out;
    }
    for y in 0..rows {
        let row = (start + y * cols) % bytes.len();
        let _ = write!(out, "#{row:04X} ");
        for x in 0..cols {
            let i = (row + x) % bytes.len();
            if Some(i) == highlight {
                let _ = write!(out, "[{:02X}]", bytes[i]);
            } else {
                let _ = write!(out, " {:02X} ", bytes[i]);
            }
        }
        out.push('\n');
    }
    out
}

/// One line per port: number, name and register contents.
pub fn port_table(bus: &DeviceBus) -> String {
    let mut out = String::new();
    for d in bus.devices() {
        let _ = write!(out, "{:#03x} {:<9}", d.port(), d.name());
        for b in d.window.as_bytes() {
            let _ = write!(out, " {b:02x}");
        }
        out.push('\n');
    }
    out
}
