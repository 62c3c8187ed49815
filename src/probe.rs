//! Device size probe
//!
//! Standard size queries report zero for many device nodes. All the probe
//! needs is a positioned read that can tell "read exactly one byte" apart from
//! anything else, so it works the same on files, block devices and character
//! devices.

use std::fs::File;

use tracing::{debug, trace};

use crate::common::positioned::read_at;
use crate::error::{ImageError, Result};

/// Number of exponents tried before giving up (offsets up to 2^59)
const MAX_BITS: u32 = 60;

/// Single-byte positioned read used by the probe
pub trait ProbeRead {
    /// Reported size, if the object has a trustworthy one
    fn reported_size(&self) -> Option<u64> {
        None
    }

    /// True when exactly one byte could be read at `offset`
    fn read_one(&self, offset: u64) -> bool;
}

impl ProbeRead for File {
    fn reported_size(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len()).filter(|&len| len > 0)
    }

    fn read_one(&self, offset: u64) -> bool {
        let mut buf = [0u8; 1];
        matches!(read_at(self, &mut buf, offset), Ok(1))
    }
}

/// Size of an open file or device
pub fn get_filesize(file: &File) -> Result<u64> {
    probe_size(file)
}

/// Determine the size of `dev`, trusting its own answer when positive
pub fn probe_size<R: ProbeRead + ?Sized>(dev: &R) -> Result<u64> {
    if let Some(size) = dev.reported_size() {
        return Ok(size);
    }

    // Phase 1: how far can we read?
    let mut bits = 0;
    while bits < MAX_BITS {
        if !dev.read_one(1u64 << bits) {
            break;
        }
        bits += 1;
    }
    if bits == MAX_BITS {
        return Err(ImageError::ProbeExhausted);
    }
    trace!(bits, "first unreadable power of two");

    // Phase 2: settle each bit from the failing exponent downwards
    let mut highest = 1u64 << bits;
    for bit in (0..=bits).rev() {
        let mask = 1u64 << bit;
        if dev.read_one(highest | mask) {
            highest |= mask;
        } else {
            highest &= !mask;
        }
    }

    let size = if highest > 0 { highest + 1 } else { 0 };
    debug!(size, "probed device size");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    /// Device that reports no size but can be read up to `len`
    struct SilentDevice {
        len: u64,
        reads: Cell<u32>,
    }

    impl SilentDevice {
        fn new(len: u64) -> Self {
            Self { len, reads: Cell::new(0) }
        }
    }

    impl ProbeRead for SilentDevice {
        fn read_one(&self, offset: u64) -> bool {
            self.reads.set(self.reads.get() + 1);
            offset < self.len
        }
    }

    struct Bottomless;

    impl ProbeRead for Bottomless {
        fn read_one(&self, _offset: u64) -> bool {
            true
        }
    }

    #[test]
    fn test_regular_file_uses_reported_size() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[7u8; 12345]).unwrap();
        assert_eq!(get_filesize(&file).unwrap(), 12345);
    }

    #[test]
    fn test_probe_finds_exact_size() {
        for len in [2u64, 3, 1000, 4096, 512 * 1024 * 1024 + 17, (1 << 40) - 1] {
            let dev = SilentDevice::new(len);
            assert_eq!(probe_size(&dev).unwrap(), len, "len {len}");
            assert!(dev.reads.get() <= 2 * MAX_BITS);
        }
    }

    #[test]
    fn test_probe_tiny_devices() {
        // Nothing readable past offset 0
        assert_eq!(probe_size(&SilentDevice::new(1)).unwrap(), 0);
        assert_eq!(probe_size(&SilentDevice::new(0)).unwrap(), 0);
    }

    #[test]
    fn test_probe_exhausted() {
        assert!(matches!(probe_size(&Bottomless), Err(ImageError::ProbeExhausted)));
    }
}
