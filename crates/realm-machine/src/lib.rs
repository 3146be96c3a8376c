#![forbid(unsafe_code)]

//! Boot-sector machine: the external surface of the realm virtual CPU.
//!
//! A [`Machine`] owns one [`Vcpu`] and one [`MemoryImage`] for its whole
//! lifetime; instances are never shared or aliased, and dropping the
//! machine releases everything it owns. Construction takes a validated
//! [`MachineConfig`]; a loader stages up to one disk sector of code at the
//! conventional [`BOOT_LOAD_ADDR`]; `run`/`run_slice`/`step` drive the CPU
//! core and [`Machine::registers`] exports an ordered snapshot for
//! diagnostics.

use realm_cpu_core::Vcpu;
use thiserror::Error;

// Re-exported so downstream users (the CLI, tests) need only this crate.
pub use realm_cpu_core::{FetchedOp, Gpr, HaltReason, RunExit, StepExit};
pub use realm_mem::{MemoryError, MemoryImage};

/// Conventional boot-sector load address (`0x7C00`).
pub const BOOT_LOAD_ADDR: u64 = 0x7C00;

/// At most one disk sector of the boot image is staged.
pub const BOOT_SECTOR_MAX_BYTES: usize = 512;

/// Errors returned when constructing or loading a [`Machine`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MachineError {
    #[error("guest RAM size must be non-zero")]
    ZeroRamSize,

    #[error("guest RAM size {size} bytes does not fit in the current platform's usize")]
    RamTooLarge { size: u64 },

    #[error("entry point eip=0x{eip:x} is outside guest RAM of {ram_size} bytes")]
    EntryOutOfRange { eip: u32, ram_size: u64 },

    #[error("load out of range: {0}")]
    LoadOutOfRange(MemoryError),
}

/// Construction-time machine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Guest RAM size in bytes.
    pub ram_size: u64,
    pub initial_eip: u32,
    pub initial_esp: u32,
}

impl MachineConfig {
    /// Canonical boot-sector staging defaults: 1 MiB of guest RAM with
    /// `EIP` and `ESP` both at the [`BOOT_LOAD_ADDR`].
    #[must_use]
    pub fn boot_sector_defaults() -> Self {
        Self {
            ram_size: 1024 * 1024,
            initial_eip: BOOT_LOAD_ADDR as u32,
            initial_esp: BOOT_LOAD_ADDR as u32,
        }
    }
}

/// Point-in-time register file snapshot, in selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub gpr: [u32; Gpr::COUNT],
    pub eip: u32,
}

impl CpuSnapshot {
    /// `(name, value)` pairs in the canonical dump order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        Gpr::ALL.iter().map(move |reg| (reg.name(), self.gpr[reg.index()]))
    }
}

#[derive(Debug)]
pub struct Machine {
    cpu: Vcpu,
    mem: MemoryImage,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        if config.ram_size == 0 {
            return Err(MachineError::ZeroRamSize);
        }
        if u64::from(config.initial_eip) >= config.ram_size {
            return Err(MachineError::EntryOutOfRange {
                eip: config.initial_eip,
                ram_size: config.ram_size,
            });
        }
        let mem = MemoryImage::new(config.ram_size).map_err(|_| MachineError::RamTooLarge {
            size: config.ram_size,
        })?;
        Ok(Self {
            cpu: Vcpu::new(config.initial_eip, config.initial_esp),
            mem,
        })
    }

    /// Copies raw bytes into guest RAM at `addr`.
    pub fn load_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MachineError> {
        self.mem
            .write_from(addr, bytes)
            .map_err(MachineError::LoadOutOfRange)
    }

    /// Stages a boot image at [`BOOT_LOAD_ADDR`], copying at most
    /// [`BOOT_SECTOR_MAX_BYTES`] bytes. Returns the number of bytes staged.
    pub fn load_boot_sector(&mut self, image: &[u8]) -> Result<usize, MachineError> {
        let staged = image.len().min(BOOT_SECTOR_MAX_BYTES);
        self.load_bytes(BOOT_LOAD_ADDR, &image[..staged])?;
        Ok(staged)
    }

    /// One fetch-decode-execute iteration.
    pub fn step(&mut self) -> StepExit {
        self.cpu.step(&self.mem)
    }

    /// Runs until a terminal halt. A self-jump never halts; use
    /// [`Machine::run_slice`] for bounded execution.
    pub fn run(&mut self) -> HaltReason {
        self.cpu.run(&self.mem)
    }

    /// Runs at most `max_insts` instructions.
    pub fn run_slice(&mut self, max_insts: u64) -> RunExit {
        self.cpu.run_slice(&self.mem, max_insts)
    }

    /// Ordered register snapshot plus `eip`.
    pub fn registers(&self) -> CpuSnapshot {
        CpuSnapshot {
            gpr: self.cpu.gpr,
            eip: self.cpu.eip,
        }
    }

    pub fn memory(&self) -> &MemoryImage {
        &self.mem
    }
}
