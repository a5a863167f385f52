//! Access to memory referenced by pointers inside foreign records.

use crate::{Error, Result};
use std::collections::BTreeMap;

/// Resolves pointers embedded in a foreign record.
///
/// Both methods copy; callers never hold references into foreign memory.
pub trait ForeignMemory {
    /// Copy `len` bytes starting at `addr`.
    fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>>;

    /// Copy the NUL terminated string at `addr`, without the terminator.
    fn read_c_string(&self, addr: u64) -> Result<Vec<u8>>;
}

/// Reads pointers directly from the address space of this process.
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory {
    _private: (),
}

impl ProcessMemory {
    /// Create a reader for the current process.
    ///
    /// # Safety
    /// Every non-null pointer found in records decoded with this reader must be valid for
    /// reads of the size the record layout implies, for the duration of the decode call.
    /// Pointed-to records are copied whole, so they must be fully initialized memory, as
    /// records written by the C library are.
    pub unsafe fn new() -> Self {
        ProcessMemory { _private: () }
    }
}

impl ForeignMemory for ProcessMemory {
    fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        if addr == 0 {
            return Err(Error::InvalidAddress(addr));
        }
        // Validity is the contract of `ProcessMemory::new`.
        let bytes = unsafe { std::slice::from_raw_parts(addr as usize as *const u8, len) };
        Ok(bytes.to_vec())
    }

    fn read_c_string(&self, addr: u64) -> Result<Vec<u8>> {
        if addr == 0 {
            return Err(Error::InvalidAddress(addr));
        }
        let s = unsafe { std::ffi::CStr::from_ptr(addr as usize as *const nix::libc::c_char) };
        Ok(s.to_bytes().to_vec())
    }
}

/// Foreign memory captured as a set of byte regions keyed by their start address.
///
/// Useful to decode records copied out of another process or built by hand.
#[derive(Debug, Default, Clone)]
pub struct SnapshotMemory {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl SnapshotMemory {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        SnapshotMemory::default()
    }

    /// Add a region starting at `addr`.
    pub fn insert(&mut self, addr: u64, bytes: Vec<u8>) {
        self.regions.insert(addr, bytes);
    }

    /// Builder form of `insert`.
    pub fn with_region(mut self, addr: u64, bytes: Vec<u8>) -> Self {
        self.insert(addr, bytes);
        self
    }

    /// Bytes from `addr` to the end of the region containing it.
    fn tail(&self, addr: u64) -> Result<&[u8]> {
        let (start, bytes) = self
            .regions
            .range(..=addr)
            .next_back()
            .ok_or(Error::InvalidAddress(addr))?;
        let offset = (addr - start) as usize;
        if offset >= bytes.len() {
            return Err(Error::InvalidAddress(addr));
        }
        Ok(&bytes[offset..])
    }
}

impl ForeignMemory for SnapshotMemory {
    fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let tail = self.tail(addr)?;
        if tail.len() < len {
            return Err(Error::InvalidAddress(addr + tail.len() as u64));
        }
        Ok(tail[..len].to_vec())
    }

    fn read_c_string(&self, addr: u64) -> Result<Vec<u8>> {
        let tail = self.tail(addr)?;
        match tail.iter().position(|b| *b == 0) {
            Some(end) => Ok(tail[..end].to_vec()),
            None => Err(Error::InvalidAddress(addr + tail.len() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads() {
        let mem = SnapshotMemory::new()
            .with_region(0x1000, b"hello\0world\0".to_vec())
            .with_region(0x2000, vec![1, 2, 3, 4]);
        assert_eq!(mem.read_c_string(0x1000).unwrap(), b"hello");
        assert_eq!(mem.read_c_string(0x1006).unwrap(), b"world");
        assert_eq!(mem.read_bytes(0x2001, 3).unwrap(), vec![2, 3, 4]);
        assert!(mem.read_bytes(0x2001, 4).is_err());
        assert!(mem.read_bytes(0x500, 1).is_err());
        assert!(mem.read_bytes(0x1800, 1).is_err());
        assert!(mem.read_c_string(0x2000).is_err());
    }

    #[test]
    fn test_process_reads() {
        let text = std::ffi::CString::new("PAPI_TOT_CYC").unwrap();
        let data = [7u8, 8, 9];
        let mem = unsafe { ProcessMemory::new() };
        assert_eq!(mem.read_c_string(text.as_ptr() as u64).unwrap(), b"PAPI_TOT_CYC");
        assert_eq!(mem.read_bytes(data.as_ptr() as u64, 3).unwrap(), vec![7, 8, 9]);
        assert!(mem.read_c_string(0).is_err());
    }
}
