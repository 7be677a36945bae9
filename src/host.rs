//! Host-side resources the devices talk to: the two console output streams and
//! the wall clock.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::clock::{Clock, HostClock};

pub struct Host {
    pub stdout: Box<dyn Write>,
    pub stderr: Box<dyn Write>,
    pub clock: Box<dyn Clock>,
}

impl Host {
    /// The process streams and the local clock.
    pub fn system() -> Self {
        Self {
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
            clock: Box::new(HostClock),
        }
    }

    /// Capturing streams for embedding the machine in another tool.
    pub fn captured(clock: impl Clock + 'static) -> (Self, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::default();
        let err = SharedBuffer::default();
        let host = Self {
            stdout: Box::new(out.clone()),
            stderr: Box::new(err.clone()),
            clock: Box::new(clock),
        };
        (host, out, err)
    }

    /// Console stream selector: 1 is stdout, 2 is stderr.
    pub fn stream(&mut self, selector: u8) -> Option<&mut dyn Write> {
        match selector {
            1 => Some(self.stdout.as_mut()),
            2 => Some(self.stderr.as_mut()),
            _ => None,
        }
    }
}

/// A cloneable in-memory byte sink.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{DateTime, FixedClock};

    #[test]
    fn stream_selector() {
        let (mut host, out, err) = Host::captured(FixedClock(DateTime::default()));
        host.stream(1).unwrap().write_all(b"o").unwrap();
        host.stream(2).unwrap().write_all(b"e").unwrap();
        assert!(host.stream(0).is_none());
        assert!(host.stream(3).is_none());
        assert_eq!(out.text(), "o");
        assert_eq!(err.text(), "e");
    }
}
