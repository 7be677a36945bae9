//! Host file transfers through the file port.
//!
//! Register layout (shorts are big-endian):
//!
//! | sub   | field                                   |
//! |-------|-----------------------------------------|
//! | 0x2   | bytes transferred by the last operation |
//! | 0x4   | byte offset into the host file          |
//! | 0x8   | address of the NUL-terminated file name |
//! | 0xa   | transfer length                         |
//! | 0xc   | load address; writing 0xd loads         |
//! | 0xe   | save address; writing 0xf saves         |
//!
//! Each transfer opens and closes its own handle. Failures never fault the
//! machine: they leave 0 in the result register and a line in the log.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::register::RegisterWindow;
use crate::state::{MEMORY_SIZE, MachineState, Memory};

pub const RESULT: u8 = 0x2;
pub const OFFSET: u8 = 0x4;
pub const NAME: u8 = 0x8;
pub const LENGTH: u8 = 0xa;
pub const LOAD_ADDR: u8 = 0xc;
pub const SAVE_ADDR: u8 = 0xe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Load,
    Save,
}

/// Write-side talk behavior of the file port.
pub(crate) fn talk(window: &mut RegisterWindow, state: &mut MachineState, sub: u8) {
    let direction = match sub {
        0xd => Direction::Load,
        0xf => Direction::Save,
        _ => return,
    };
    let raw = state.memory.c_str(window.get16(NAME)).to_vec();
    let name = String::from_utf8_lossy(&raw).into_owned();
    let offset = window.get16(OFFSET);
    let length = window.get16(LENGTH);
    let addr = window.get16(sub - 1);

    let result = match transfer(&mut state.memory, direction, &raw, offset, addr, length) {
        Ok(n) => {
            let (verb, prep) = match direction {
                Direction::Load => ("Loading", "to"),
                Direction::Save => ("Saving", "from"),
            };
            state.log.info(format!("{verb} {name} {prep} #{addr:04x}, {n:04x} bytes"));
            n
        }
        Err(e) => {
            state.log.warn(format!("File {name:?} failed: {e}"));
            0
        }
    };
    window.set16(RESULT, result);
}

/// Host path for a file name taken from memory. On unix the bytes are used
/// as they are; elsewhere they must be UTF-8.
#[cfg(unix)]
fn host_path(raw: &[u8]) -> io::Result<&Path> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    Ok(Path::new(OsStr::from_bytes(raw)))
}

#[cfg(not(unix))]
fn host_path(raw: &[u8]) -> io::Result<&Path> {
    std::str::from_utf8(raw)
        .map(Path::new)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file name is not UTF-8"))
}

fn transfer(
    memory: &mut Memory,
    direction: Direction,
    raw_name: &[u8],
    offset: u16,
    addr: u16,
    length: u16,
) -> io::Result<u16> {
    if raw_name.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no file name"));
    }
    let name = host_path(raw_name)?;
    if length == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "zero length"));
    }
    let len = (length as usize).min(MEMORY_SIZE - addr as usize);
    let moved = match direction {
        Direction::Load => {
            let mut f = File::open(name)?;
            f.seek(SeekFrom::Start(offset as u64))?;
            read_up_to(&mut f, memory.span_mut(addr, len))?
        }
        Direction::Save => {
            let mut f = if offset == 0 {
                File::create(name)?
            } else {
                OpenOptions::new().write(true).create(true).truncate(false).open(name)?
            };
            f.seek(SeekFrom::Start(offset as u64))?;
            f.write_all(memory.span(addr, len))?;
            len
        }
    };
    Ok(moved as u16)
}

/// Fill `buf` until it is full or the reader is exhausted.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Log;
    use std::path::Path;

    const NAME_ADDR: u16 = 0x0200;

    fn setup(path: &Path) -> (RegisterWindow, MachineState) {
        let mut st = MachineState::new(Log::new());
        let name = path.to_str().unwrap().as_bytes();
        st.memory.span_mut(NAME_ADDR, name.len()).copy_from_slice(name);
        st.memory.set(NAME_ADDR + name.len() as u16, 0);
        let mut w = RegisterWindow::new();
        w.set16(NAME, NAME_ADDR);
        (w, st)
    }

    /// Write a short the way a program would: high byte first, then low.
    fn poke16(w: &mut RegisterWindow, st: &mut MachineState, sub: u8, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        w.set(sub, hi);
        talk(w, st, sub);
        w.set(sub + 1, lo);
        talk(w, st, sub + 1);
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (mut w, mut st) = setup(&dir.path().join("out.bin"));
        let data: Vec<u8> = (0..64).map(|i| i * 3).collect();
        st.memory.span_mut(0x1000, 64).copy_from_slice(&data);

        w.set16(LENGTH, 64);
        poke16(&mut w, &mut st, SAVE_ADDR, 0x1000);
        assert_eq!(w.get16(RESULT), 64);

        poke16(&mut w, &mut st, LOAD_ADDR, 0x3000);
        assert_eq!(w.get16(RESULT), 64);
        assert_eq!(st.memory.span(0x3000, 64), &data[..]);
        assert!(st.log.contains("Saving"));
        assert!(st.log.contains("Loading"));
    }

    #[test]
    fn load_reports_short_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"hello").unwrap();
        let (mut w, mut st) = setup(&path);
        w.set16(LENGTH, 0x100);
        w.set16(OFFSET, 1);
        poke16(&mut w, &mut st, LOAD_ADDR, 0x4000);
        assert_eq!(w.get16(RESULT), 4);
        assert_eq!(st.memory.span(0x4000, 5), b"ello\0");
    }

    #[test]
    fn missing_file_yields_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (mut w, mut st) = setup(&dir.path().join("absent.bin"));
        w.set16(RESULT, 0xffff);
        w.set16(LENGTH, 16);
        poke16(&mut w, &mut st, LOAD_ADDR, 0x4000);
        assert_eq!(w.get16(RESULT), 0);
        assert!(st.log.contains("failed"));
    }

    #[test]
    fn unreachable_path_yields_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (mut w, mut st) = setup(&dir.path().join("no/such/dir/f.bin"));
        w.set16(LENGTH, 16);
        poke16(&mut w, &mut st, SAVE_ADDR, 0x4000);
        assert_eq!(w.get16(RESULT), 0);
    }

    #[test]
    fn empty_name_yields_zero() {
        let mut st = MachineState::new(Log::new());
        let mut w = RegisterWindow::new();
        w.set16(NAME, 0x0300);
        w.set16(LENGTH, 16);
        w.set16(RESULT, 7);
        poke16(&mut w, &mut st, LOAD_ADDR, 0x4000);
        assert_eq!(w.get16(RESULT), 0);
    }

    #[test]
    fn zero_length_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z.bin");
        let (mut w, mut st) = setup(&path);
        w.set16(RESULT, 9);
        poke16(&mut w, &mut st, SAVE_ADDR, 0x1000);
        assert_eq!(w.get16(RESULT), 0);
        assert!(!path.exists());
        assert!(st.log.contains("zero length"));
    }

    #[test]
    fn save_at_offset_keeps_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.bin");
        std::fs::write(&path, b"abcdef").unwrap();
        let (mut w, mut st) = setup(&path);
        st.memory.span_mut(0x1000, 2).copy_from_slice(b"XY");
        w.set16(LENGTH, 2);
        w.set16(OFFSET, 2);
        poke16(&mut w, &mut st, SAVE_ADDR, 0x1000);
        assert_eq!(w.get16(RESULT), 2);
        assert_eq!(std::fs::read(&path).unwrap(), b"abXYef");
    }

    #[test]
    fn save_at_zero_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.bin");
        std::fs::write(&path, b"abcdef").unwrap();
        let (mut w, mut st) = setup(&path);
        st.memory.span_mut(0x1000, 2).copy_from_slice(b"XY");
        w.set16(LENGTH, 2);
        poke16(&mut w, &mut st, SAVE_ADDR, 0x1000);
        assert_eq!(std::fs::read(&path).unwrap(), b"XY");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_name_is_used_verbatim() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let mut name = dir.path().as_os_str().as_bytes().to_vec();
        name.extend_from_slice(b"/f\xe9.bin");
        let mut st = MachineState::new(Log::new());
        st.memory.span_mut(NAME_ADDR, name.len()).copy_from_slice(&name);
        st.memory.span_mut(0x1000, 4).copy_from_slice(b"data");
        let mut w = RegisterWindow::new();
        w.set16(NAME, NAME_ADDR);
        w.set16(LENGTH, 4);

        poke16(&mut w, &mut st, SAVE_ADDR, 0x1000);
        assert_eq!(w.get16(RESULT), 4);
        let names: Vec<Vec<u8>> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().as_bytes().to_vec())
            .collect();
        assert_eq!(names, vec![b"f\xe9.bin".to_vec()]);
        assert!(st.log.contains("f\u{fffd}.bin"));

        poke16(&mut w, &mut st, LOAD_ADDR, 0x2000);
        assert_eq!(w.get16(RESULT), 4);
        assert_eq!(st.memory.span(0x2000, 4), b"data");
    }

    #[test]
    fn transfer_clamps_at_memory_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.bin");
        let (mut w, mut st) = setup(&path);
        w.set16(LENGTH, 0x100);
        poke16(&mut w, &mut st, SAVE_ADDR, 0xfff0);
        assert_eq!(w.get16(RESULT), 0x10);
    }
}
