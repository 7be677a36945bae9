/// Number of registers a device exposes.
pub const WINDOW_SIZE: usize = 16;

/// The 16-byte register window of a single port.
///
/// Sub-offsets are masked to 4 bits, so every access lands inside the window.
/// Shorts are stored big-endian across two adjacent offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterWindow {
    bytes: [u8; WINDOW_SIZE],
}

impl RegisterWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sub: u8) -> u8 {
        self.bytes[(sub & 0x0f) as usize]
    }

    pub fn set(&mut self, sub: u8, byte: u8) {
        self.bytes[(sub & 0x0f) as usize] = byte;
    }

    /// Read the short whose high byte sits at `sub`.
    pub fn get16(&self, sub: u8) -> u16 {
        u16::from_be_bytes([self.get(sub), self.get(sub.wrapping_add(1))])
    }

    pub fn set16(&mut self, sub: u8, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.set(sub, hi);
        self.set(sub.wrapping_add(1), lo);
    }

    pub fn as_bytes(&self) -> &[u8; WINDOW_SIZE] {
        &self.bytes
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn set_then_get(sub in 0u8..16, byte in any::<u8>()) {
            let mut w = RegisterWindow::new();
            w.set(sub, byte);
            prop_assert_eq!(w.get(sub), byte);
        }

        #[test]
        fn short_does_not_touch_neighbours(sub in 1u8..14, value in any::<u16>()) {
            let mut w = RegisterWindow::new();
            w.set16(sub, value);
            prop_assert_eq!(w.get(sub - 1), 0);
            prop_assert_eq!(w.get(sub + 2), 0);
            prop_assert_eq!(w.get16(sub), value);
        }
    }
}
