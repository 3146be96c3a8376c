#![forbid(unsafe_code)]

//! Native runner for `realm_machine::Machine` (boot-sector debugging).
//!
//! Program output — the per-iteration fetch trace and the final register
//! dump — goes to stdout; lifecycle logs go to `tracing` on stderr
//! (enable with `RUST_LOG`).

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use realm_machine::{HaltReason, Machine, MachineConfig, StepExit, BOOT_LOAD_ADDR};

#[derive(Debug, Parser)]
#[command(about = "Run a boot-sector image on the realm virtual CPU")]
struct Args {
    /// Boot image staged at 0x7C00 (at most the first 512 bytes are used).
    image: PathBuf,

    /// Guest RAM size in MiB.
    #[arg(long, default_value_t = 1)]
    ram_mib: u64,

    /// Stop after executing at most N instructions.
    ///
    /// Without a cap, a program that jumps to itself runs forever.
    #[arg(long)]
    max_insts: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let ram_size = args
        .ram_mib
        .checked_mul(1024 * 1024)
        .context("RAM size overflow")?;
    let config = MachineConfig {
        ram_size,
        ..MachineConfig::boot_sector_defaults()
    };

    let image = fs::read(&args.image)
        .with_context(|| format!("failed to read boot image: {}", args.image.display()))?;
    if image.is_empty() {
        bail!("boot image is empty: {}", args.image.display());
    }

    let mut machine = Machine::new(config)?;
    let staged = machine.load_boot_sector(&image)?;
    if staged < image.len() {
        tracing::warn!(
            total = image.len(),
            staged,
            "boot image is longer than one sector; extra bytes ignored"
        );
    }
    tracing::info!(staged, addr = BOOT_LOAD_ADDR, "boot image staged");

    let mut executed: u64 = 0;
    let halt = loop {
        if let Some(max) = args.max_insts {
            if executed >= max {
                break None;
            }
        }
        match machine.step() {
            StepExit::Executed(op) => {
                println!("EIP = {:X}, Code = {:02X}", op.eip, op.opcode);
                executed += 1;
            }
            StepExit::Halted { reason, fetched } => {
                if let Some(op) = fetched {
                    println!("EIP = {:X}, Code = {:02X}", op.eip, op.opcode);
                }
                if reason == HaltReason::ZeroEip {
                    executed += 1;
                }
                break Some(reason);
            }
        }
    };

    match halt {
        Some(reason) => tracing::info!(executed, "halted: {reason}"),
        None => tracing::info!(executed, "instruction budget exhausted"),
    }

    let snapshot = machine.registers();
    for (name, value) in snapshot.named() {
        println!("{name} = {value:08x}");
    }
    println!("EIP = {:08x}", snapshot.eip);

    Ok(())
}
