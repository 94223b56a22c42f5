//! # vcpu
//!
//! A minimal virtual CPU. Programs are 32-bit instruction words written
//! straight into memory; [`Cpu::run`] fetches, decodes and executes them
//! until the program counter leaves memory or an instruction faults.

pub mod config;
pub mod cpu;
pub mod demo;

// Re-export commonly used types
pub use config::{ConfigError, CpuConfig};
pub use cpu::{Alu, Cpu, CpuError, CpuSnapshot, CpuState, Instruction, Memory, Opcode, RegisterFile, StepOutcome};
pub use cpu::{LogTracer, NullTracer, TraceRecord, Tracer};
