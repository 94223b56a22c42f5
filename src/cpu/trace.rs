//! Instruction tracing.
//!
//! The executor reports every fetched word to a [`Tracer`] before dispatch.
//! The default [`LogTracer`] forwards records to the `log` facade at trace
//! level, so a run stays silent unless a logger is installed and enabled.

use serde::{Serialize, Deserialize};

use crate::cpu::decode::decode;

/// One fetched instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Address the word was fetched from.
    pub pc: u32,
    /// The raw instruction word.
    pub word: u32,
    /// Its top byte.
    pub raw_opcode: u8,
}

impl std::fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}: {:08X}  op=0x{:02X}", self.pc, self.word, self.raw_opcode)?;
        match decode(self.word) {
            Ok(instr) => write!(f, "  {}", instr),
            Err(_) => write!(f, "  ???"),
        }
    }
}

/// Sink for per-instruction trace records.
pub trait Tracer {
    fn record(&mut self, record: &TraceRecord);
}

/// Forwards records to `log::trace!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn record(&mut self, record: &TraceRecord) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", record);
        }
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {
    #[inline]
    fn record(&mut self, _record: &TraceRecord) {}
}

impl Tracer for Vec<TraceRecord> {
    fn record(&mut self, record: &TraceRecord) {
        self.push(*record);
    }
}

impl<T: Tracer + ?Sized> Tracer for &mut T {
    fn record(&mut self, record: &TraceRecord) {
        (**self).record(record);
    }
}

impl<T: Tracer + ?Sized> Tracer for Box<T> {
    fn record(&mut self, record: &TraceRecord) {
        (**self).record(record);
    }
}
