#![forbid(unsafe_code)]

//! Fetch-decode-execute core for the realm virtual CPU.
//!
//! The core models a subset of a 32-bit x86-style real-mode processor:
//! eight general-purpose registers plus `EIP` ([`Vcpu`]), `eip`-relative
//! instruction-stream decoding primitives, a 256-entry opcode dispatch
//! table ([`OPCODE_TABLE`]) and the execution loop with its halting policy
//! ([`Vcpu::step`] / [`Vcpu::run_slice`]).
//!
//! Handlers own the program-counter advance: the loop performs no implicit
//! length bookkeeping, so every handler must leave `eip` at the first byte
//! of the next instruction.

mod decode;
mod dispatch;
mod exec;
mod state;

pub use dispatch::{Handler, OPCODE_TABLE};
pub use exec::{FetchedOp, HaltReason, RunExit, StepExit};
pub use state::{Gpr, Vcpu};
