//! CPU emulation.
//!
//! The machine is deliberately small:
//! - a register file of 32-bit registers (16 by default)
//! - a flat word-addressed memory holding code and data (1024 words by default)
//! - a stateless ALU
//! - a program counter and a call stack of return addresses

pub mod alu;
pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trace;

pub use alu::Alu;
pub use memory::{Memory, MemoryError};
pub use registers::RegisterFile;
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuSnapshot, CpuState, StepOutcome};
pub use trace::{LogTracer, NullTracer, TraceRecord, Tracer};
