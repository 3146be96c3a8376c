//! The fetch-decode-execute loop and its halting policy.

use core::fmt;

use realm_mem::MemoryImage;

use crate::dispatch::OPCODE_TABLE;
use crate::state::Vcpu;

/// Why the execution loop stopped. Every halt is terminal; there is no
/// resume operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// A handler set `eip` to exactly zero — the real-mode convention for
    /// returning control to the loader.
    ZeroEip,
    /// The fetched opcode has no dispatch-table entry. No register or
    /// `eip` mutation from the halting iteration is observable.
    UnimplementedOpcode { opcode: u8, eip: u32 },
    /// The program counter left the memory image, either at the fetch
    /// bounds check or through an operand read running off the end.
    OutOfBounds { eip: u32 },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::ZeroEip => write!(f, "returned to address zero"),
            HaltReason::UnimplementedOpcode { opcode, eip } => {
                write!(f, "unimplemented opcode {opcode:#04x} at eip=0x{eip:x}")
            }
            HaltReason::OutOfBounds { eip } => {
                write!(f, "out-of-bounds code access at eip=0x{eip:x}")
            }
        }
    }
}

/// The program counter and opcode byte of one fetch, recorded before the
/// handler runs. This is the per-iteration diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedOp {
    pub eip: u32,
    pub opcode: u8,
}

/// Outcome of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepExit {
    /// One instruction retired and the CPU is still running.
    Executed(FetchedOp),
    /// The loop reached a terminal state. `fetched` carries the opcode
    /// record when the halt happened after the fetch (it is `None` only
    /// for the pre-fetch bounds halt).
    Halted {
        reason: HaltReason,
        fetched: Option<FetchedOp>,
    },
}

/// Outcome of a bounded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// The instruction budget was exhausted with the CPU still running.
    Completed { executed: u64 },
    /// A terminal halt was reached before the budget ran out.
    Halted { reason: HaltReason, executed: u64 },
}

impl RunExit {
    /// Number of instructions retired in this slice.
    pub fn executed(&self) -> u64 {
        match *self {
            RunExit::Completed { executed } | RunExit::Halted { executed, .. } => executed,
        }
    }
}

impl Vcpu {
    /// Runs one iteration of the fetch-decode-execute loop.
    ///
    /// Transition order: bounds check on `eip`, opcode fetch and dispatch
    /// lookup, handler execution, zero-`eip` check. The zero check runs
    /// only after a handler, so a CPU *created* with `eip == 0` executes
    /// normally from address zero.
    pub fn step(&mut self, mem: &MemoryImage) -> StepExit {
        let eip = self.eip;
        if u64::from(eip) >= mem.size() {
            return StepExit::Halted {
                reason: HaltReason::OutOfBounds { eip },
                fetched: None,
            };
        }

        // In range per the check above.
        let opcode = match self.fetch_u8(mem, 0) {
            Ok(opcode) => opcode,
            Err(_) => {
                return StepExit::Halted {
                    reason: HaltReason::OutOfBounds { eip },
                    fetched: None,
                }
            }
        };
        let fetched = FetchedOp { eip, opcode };

        let Some(handler) = OPCODE_TABLE[opcode as usize] else {
            return StepExit::Halted {
                reason: HaltReason::UnimplementedOpcode { opcode, eip },
                fetched: Some(fetched),
            };
        };

        if handler(self, mem).is_err() {
            // Handlers read operands before mutating, so the failed
            // iteration left no partial state behind.
            return StepExit::Halted {
                reason: HaltReason::OutOfBounds { eip },
                fetched: Some(fetched),
            };
        }

        if self.eip == 0 {
            return StepExit::Halted {
                reason: HaltReason::ZeroEip,
                fetched: Some(fetched),
            };
        }

        StepExit::Executed(fetched)
    }

    /// Runs at most `max_insts` instructions.
    ///
    /// This is the external iteration cap for programs that never halt on
    /// their own (a short jump to itself runs forever under [`Vcpu::run`]).
    pub fn run_slice(&mut self, mem: &MemoryImage, max_insts: u64) -> RunExit {
        let mut executed: u64 = 0;
        while executed < max_insts {
            match self.step(mem) {
                StepExit::Executed(_) => executed += 1,
                StepExit::Halted { reason, .. } => {
                    if reason == HaltReason::ZeroEip {
                        // The halting instruction itself retired.
                        executed += 1;
                    }
                    return RunExit::Halted { reason, executed };
                }
            }
        }
        RunExit::Completed { executed }
    }

    /// Runs until a terminal halt, without any bound.
    pub fn run(&mut self, mem: &MemoryImage) -> HaltReason {
        loop {
            if let StepExit::Halted { reason, .. } = self.step(mem) {
                return reason;
            }
        }
    }
}
