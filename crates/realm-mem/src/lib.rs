#![forbid(unsafe_code)]

//! Guest memory image for the realm virtual CPU.
//!
//! A [`MemoryImage`] is a fixed-size, byte-addressable linear store. All
//! externally-visible addresses are `u64` so callers can form
//! `eip + offset` sums without intermediate wrapping; every access is
//! range-checked against the image size and fails with
//! [`MemoryError::OutOfRange`] instead of reading past the allocation.

use core::fmt;

/// Errors returned by [`MemoryImage`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The requested address range is outside the memory image.
    OutOfRange { addr: u64, len: usize, size: u64 },
    /// The requested size cannot be represented by the current platform's `usize`.
    SizeTooLarge { size: u64 },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfRange { addr, len, size } => write!(
                f,
                "memory access out of range: addr=0x{addr:x} len={len} size=0x{size:x}"
            ),
            MemoryError::SizeTooLarge { size } => {
                write!(f, "memory size {size} does not fit in usize")
            }
        }
    }
}

impl std::error::Error for MemoryError {}

pub type MemoryResult<T> = Result<T, MemoryError>;

/// Fixed-capacity guest memory, zero-filled at creation.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    bytes: Vec<u8>,
}

impl MemoryImage {
    /// Allocates a zero-filled image of `size` bytes.
    pub fn new(size: u64) -> MemoryResult<Self> {
        let size_usize =
            usize::try_from(size).map_err(|_| MemoryError::SizeTooLarge { size })?;
        Ok(Self {
            bytes: vec![0u8; size_usize],
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn check_range(&self, addr: u64, len: usize) -> MemoryResult<usize> {
        let size = self.size();
        let end = addr
            .checked_add(len as u64)
            .ok_or(MemoryError::OutOfRange { addr, len, size })?;
        if end > size {
            return Err(MemoryError::OutOfRange { addr, len, size });
        }
        Ok(addr as usize)
    }

    /// Reads bytes starting at `addr` into `dst`.
    pub fn read_into(&self, addr: u64, dst: &mut [u8]) -> MemoryResult<()> {
        let start = self.check_range(addr, dst.len())?;
        dst.copy_from_slice(&self.bytes[start..start + dst.len()]);
        Ok(())
    }

    /// Writes `src` into the image starting at `addr`.
    pub fn write_from(&mut self, addr: u64, src: &[u8]) -> MemoryResult<()> {
        let start = self.check_range(addr, src.len())?;
        self.bytes[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    pub fn read_u8(&self, addr: u64) -> MemoryResult<u8> {
        let mut buf = [0u8; 1];
        self.read_into(addr, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u32_le(&self, addr: u64) -> MemoryResult<u32> {
        let mut buf = [0u8; 4];
        self.read_into(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> MemoryResult<()> {
        self.write_from(addr, &[value])
    }

    pub fn write_u32_le(&mut self, addr: u64, value: u32) -> MemoryResult<()> {
        self.write_from(addr, &value.to_le_bytes())
    }

    /// Contiguous view of the whole image.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}
