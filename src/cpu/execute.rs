//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and the six executable
//! instructions. The PC advances before dispatch, so CALL and RET overwrite
//! an already-incremented value.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::config::CpuConfig;
use crate::cpu::alu::Alu;
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::trace::{LogTracer, TraceRecord, Tracer};
use crate::cpu::{Memory, RegisterFile};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// PC is inside memory.
    Running,
    /// PC ran off the end of memory.
    Halted,
    /// An instruction could not be executed.
    Faulted,
}

/// Result of a single [`Cpu::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An instruction executed; the CPU is ready for the next one.
    Continue,
    /// PC is at or past the end of memory.
    Halted,
    /// Execution stopped on an unexecutable instruction.
    Fault(CpuError),
}

/// The virtual CPU.
pub struct Cpu<T: Tracer = LogTracer> {
    /// General-purpose registers.
    pub regs: RegisterFile,
    /// Main memory, holding both code and data.
    pub mem: Memory,
    alu: Alu,
    pc: u32,
    call_stack: Vec<u32>,
    state: CpuState,
    cycles: u64,
    fault: Option<CpuError>,
    tracer: T,
}

impl Cpu {
    /// Create a CPU that traces through the `log` facade.
    pub fn new(config: CpuConfig) -> Self {
        Self::with_tracer(config, LogTracer)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(CpuConfig::default())
    }
}

impl<T: Tracer> Cpu<T> {
    /// Create a CPU that reports each fetch to `tracer`.
    pub fn with_tracer(config: CpuConfig, tracer: T) -> Self {
        Self {
            regs: RegisterFile::new(config.registers),
            mem: Memory::new(config.memory_size),
            alu: Alu,
            pc: 0,
            call_stack: Vec::new(),
            state: CpuState::Running,
            cycles: 0,
            fault: None,
            tracer,
        }
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> StepOutcome {
        if let Some(fault) = self.fault {
            return StepOutcome::Fault(fault);
        }
        if self.state == CpuState::Halted {
            return StepOutcome::Halted;
        }
        if self.pc as usize >= self.mem.size() {
            self.state = CpuState::Halted;
            log::debug!("halted at pc={} after {} cycles", self.pc, self.cycles);
            return StepOutcome::Halted;
        }

        // Fetch
        let pc = self.pc;
        let word = self.mem.get(pc as u16);
        self.pc += 1;

        self.tracer.record(&TraceRecord {
            pc,
            word,
            raw_opcode: decode::raw_opcode(word),
        });

        // Decode and execute
        let result = match decode::decode(word) {
            Ok(instr) => self.execute(instr, pc),
            Err(DecodeError::InvalidOpcode(raw)) => Err(CpuError::UnknownOpcode { raw, pc }),
        };

        match result {
            Ok(()) => {
                self.cycles += 1;
                StepOutcome::Continue
            }
            Err(fault) => {
                log::warn!("{}", fault);
                self.state = CpuState::Faulted;
                self.fault = Some(fault);
                StepOutcome::Fault(fault)
            }
        }
    }

    /// Run until the PC leaves memory or an instruction faults.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        log::debug!("run: pc={} memory={} words", self.pc, self.mem.size());

        loop {
            match self.step() {
                StepOutcome::Continue => {}
                StepOutcome::Halted => return Ok(self.cycles - start_cycles),
                StepOutcome::Fault(fault) => return Err(fault),
            }
        }
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.cycles - start_cycles < max_cycles {
            match self.step() {
                StepOutcome::Continue => {}
                StepOutcome::Halted => break,
                StepOutcome::Fault(fault) => return Err(fault),
            }
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction fetched from `pc`.
    ///
    /// Operand fields are register indices except where noted per opcode.
    fn execute(&mut self, instr: Instruction, pc: u32) -> Result<(), CpuError> {
        let Instruction { opcode, r1, r2, r3 } = instr;

        match opcode {
            Opcode::Add => {
                let sum = self.alu.add(self.regs.get(r2), self.regs.get(r3));
                self.regs.set(r1, sum);
            }

            Opcode::Inc => {
                let value = self.alu.inc(self.regs.get(r1));
                self.regs.set(r1, value);
            }

            // r1 is a memory address
            Opcode::St => {
                self.mem.set(r1 as u16, self.regs.get(r2));
            }

            // r2 is a memory address
            Opcode::Ld => {
                self.regs.set(r1, self.mem.get(r2 as u16));
            }

            // r1 is the jump target
            Opcode::Call => {
                self.call_stack.push(self.pc);
                self.pc = r1 as u32;
            }

            Opcode::Ret => {
                if let Some(ret) = self.call_stack.pop() {
                    self.pc = ret;
                }
            }

            Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Dec
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Not
            | Opcode::Jmp
            | Opcode::Beq
            | Opcode::Bne
            | Opcode::Fft
            | Opcode::Enc
            | Opcode::Decrypt => {
                return Err(CpuError::Unimplemented { opcode, pc });
            }
        }

        Ok(())
    }

    /// Address of the next instruction to fetch.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Number of instructions executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The fault that stopped execution, if any.
    pub fn fault(&self) -> Option<CpuError> {
        self.fault
    }

    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn into_tracer(self) -> T {
        self.tracer
    }

    /// Capture the externally visible machine state.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            pc: self.pc,
            state: self.state,
            cycles: self.cycles,
            call_depth: self.call_stack.len(),
            registers: self.regs.iter().map(|(_, value)| value).collect(),
            memory: self.mem.non_zero(),
            fault: self.fault,
        }
    }
}

impl<T: Tracer> std::fmt::Debug for Cpu<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("call_depth", &self.call_stack.len())
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Serializable view of a CPU after (or during) a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub pc: u32,
    pub state: CpuState,
    pub cycles: u64,
    pub call_depth: usize,
    pub registers: Vec<u32>,
    /// Non-zero memory cells as `(address, word)`.
    pub memory: Vec<(usize, u32)>,
    pub fault: Option<CpuError>,
}

/// Conditions that stop execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CpuError {
    #[error("fault at pc={pc}: unknown opcode 0x{raw:02X}")]
    UnknownOpcode { raw: u8, pc: u32 },

    #[error("fault at pc={pc}: unimplemented opcode 0x{:02X} ({opcode})", .opcode.code())]
    Unimplemented { opcode: Opcode, pc: u32 },
}

impl CpuError {
    /// The opcode byte of the offending instruction.
    pub fn raw_opcode(&self) -> u8 {
        match self {
            CpuError::UnknownOpcode { raw, .. } => *raw,
            CpuError::Unimplemented { opcode, .. } => opcode.code(),
        }
    }

    /// Address of the offending instruction.
    pub fn pc(&self) -> u32 {
        match self {
            CpuError::UnknownOpcode { pc, .. } | CpuError::Unimplemented { pc, .. } => *pc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::trace::NullTracer;

    fn make_cpu(memory_size: usize, program: &[u32]) -> Cpu<NullTracer> {
        let config = CpuConfig { memory_size, ..CpuConfig::default() };
        let mut cpu = Cpu::with_tracer(config, NullTracer);
        cpu.mem.load_program(0, program).unwrap();
        cpu
    }

    fn encode_all(instructions: &[Instruction]) -> Vec<u32> {
        instructions.iter().map(Instruction::encode).collect()
    }

    #[test]
    fn test_empty_memory_halts() {
        let mut cpu = make_cpu(0, &[]);
        assert_eq!(cpu.step(), StepOutcome::Halted);
        assert!(cpu.is_halted());
        assert_eq!(cpu.run(), Ok(0));
    }

    #[test]
    fn test_runs_off_end_of_memory() {
        let program = encode_all(&[Instruction::inc(1), Instruction::inc(1), Instruction::inc(1)]);
        let mut cpu = make_cpu(3, &program);

        assert_eq!(cpu.run(), Ok(3));
        assert!(cpu.is_halted());
        assert_eq!(cpu.pc(), 3);
        assert_eq!(cpu.regs.get(1), 3);
    }

    #[test]
    fn test_load_add_store() {
        let program = encode_all(&[
            Instruction::ld(1, 6),
            Instruction::ld(2, 7),
            Instruction::add(3, 1, 2),
            Instruction::st(5, 3),
        ]);
        let mut cpu = make_cpu(8, &program);
        cpu.mem.set(4, Instruction::ret().encode());
        cpu.mem.set(6, 40);
        cpu.mem.set(7, 2);
        // Word 5 onward is data; stop before reaching it.
        let executed = cpu.run_limited(5).unwrap();

        assert_eq!(executed, 5);
        assert_eq!(cpu.regs.get(3), 42);
        assert_eq!(cpu.mem.get(5), 42);
    }

    #[test]
    fn test_add_wraps() {
        let program = encode_all(&[Instruction::add(2, 1, 1)]);
        let mut cpu = make_cpu(1, &program);
        cpu.regs.set(1, 0x8000_0001);

        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(2), 2);
    }

    #[test]
    fn test_inc_reads_and_writes_same_register() {
        let program = encode_all(&[Instruction::inc(4), Instruction::inc(4)]);
        let mut cpu = make_cpu(2, &program);
        cpu.regs.set(4, u32::MAX);

        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(4), 1);
    }

    #[test]
    fn test_out_of_range_operands_are_ignored() {
        let program = encode_all(&[
            Instruction::inc(200),
            Instruction::st(250, 1),
            Instruction::ld(2, 250),
        ]);
        let mut cpu = make_cpu(3, &program);
        cpu.regs.set(2, 9);

        assert_eq!(cpu.run(), Ok(3));
        assert_eq!(cpu.regs.get(200), 0);
        assert_eq!(cpu.mem.get(250), 0);
        assert_eq!(cpu.regs.get(2), 0);
    }

    #[test]
    fn test_ret_on_empty_stack_is_noop() {
        let program = encode_all(&[Instruction::ret(), Instruction::inc(1)]);
        let mut cpu = make_cpu(2, &program);

        assert_eq!(cpu.step(), StepOutcome::Continue);
        assert_eq!(cpu.pc(), 1);
        assert!(cpu.fault().is_none());

        assert_eq!(cpu.run(), Ok(1));
        assert_eq!(cpu.regs.get(1), 1);
    }

    #[test]
    fn test_call_returns_to_next_instruction() {
        // 0: CALL 3, 1: INC r1, 2: RET, 3: INC r2, 4: RET
        let program = encode_all(&[
            Instruction::call(3),
            Instruction::inc(1),
            Instruction::ret(),
            Instruction::inc(2),
            Instruction::ret(),
        ]);
        let mut cpu = make_cpu(5, &program);

        cpu.step();
        assert_eq!(cpu.pc(), 3);
        assert_eq!(cpu.call_stack, vec![1]);

        cpu.step();
        cpu.step();
        assert_eq!(cpu.pc(), 1);
        assert!(cpu.call_stack.is_empty());

        // INC r1, RET (empty), INC r2, RET (empty), then off the end
        assert_eq!(cpu.run(), Ok(4));
        assert_eq!(cpu.regs.get(1), 1);
        assert_eq!(cpu.regs.get(2), 2);
        assert_eq!(cpu.cycles(), 7);
    }

    #[test]
    fn test_nested_calls() {
        // 0: CALL 2, 1: INC r3, 2: CALL 4, 3: RET, 4: INC r1, 5: RET
        let program = encode_all(&[
            Instruction::call(2),
            Instruction::inc(3),
            Instruction::call(4),
            Instruction::ret(),
            Instruction::inc(1),
            Instruction::ret(),
        ]);
        let mut cpu = make_cpu(6, &program);

        let mut max_depth = 0;
        while cpu.step() == StepOutcome::Continue {
            max_depth = max_depth.max(cpu.call_stack.len());
        }

        assert_eq!(max_depth, 2);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.get(3), 1);
    }

    #[test]
    fn test_unknown_opcode_stops_immediately() {
        let program = [
            Instruction::inc(1).encode(),
            0xFF00_0000,
            Instruction::inc(1).encode(),
        ];
        let mut cpu = make_cpu(3, &program);

        let err = cpu.run().unwrap_err();
        assert_eq!(err, CpuError::UnknownOpcode { raw: 0xFF, pc: 1 });
        assert_eq!(err.raw_opcode(), 0xFF);
        assert_eq!(cpu.state(), CpuState::Faulted);
        assert_eq!(cpu.regs.get(1), 1);
        assert_eq!(cpu.cycles(), 1);

        // Faults are sticky
        assert_eq!(cpu.step(), StepOutcome::Fault(err));
        assert_eq!(cpu.pc(), 2);
        assert_eq!(cpu.regs.get(1), 1);
    }

    #[test]
    fn test_zero_word_faults() {
        let mut cpu = make_cpu(4, &[]);
        assert_eq!(cpu.step(), StepOutcome::Fault(CpuError::UnknownOpcode { raw: 0, pc: 0 }));
    }

    #[test]
    fn test_undispatched_opcodes_fault() {
        let executable = [
            Opcode::Add, Opcode::Inc, Opcode::St, Opcode::Call, Opcode::Ret, Opcode::Ld,
        ];

        for opcode in Opcode::ALL.into_iter().filter(|op| !executable.contains(op)) {
            let mut cpu = make_cpu(2, &[Instruction::new(opcode, 1, 2, 3).encode()]);
            let err = cpu.run().unwrap_err();

            assert_eq!(err, CpuError::Unimplemented { opcode, pc: 0 });
            assert_eq!(err.raw_opcode(), opcode.code());
            assert_eq!(err.pc(), 0);
        }
    }

    #[test]
    fn test_fault_message_names_opcode() {
        let err = CpuError::UnknownOpcode { raw: 0xAB, pc: 7 };
        assert_eq!(err.to_string(), "fault at pc=7: unknown opcode 0xAB");

        let err = CpuError::Unimplemented { opcode: Opcode::Jmp, pc: 2 };
        assert_eq!(err.to_string(), "fault at pc=2: unimplemented opcode 0x0B (JMP)");
    }

    #[test]
    fn test_run_limited_stops_infinite_loop() {
        let mut cpu = make_cpu(1, &[Instruction::call(0).encode()]);

        assert_eq!(cpu.run_limited(100), Ok(100));
        assert!(cpu.is_running());
        assert_eq!(cpu.call_stack.len(), 100);
    }

    #[test]
    fn test_tracer_sees_every_fetch() {
        let program = encode_all(&[Instruction::inc(1), Instruction::call(3)]);
        let config = CpuConfig { memory_size: 4, ..CpuConfig::default() };
        let mut cpu = Cpu::with_tracer(config, Vec::<TraceRecord>::new());
        cpu.mem.load_program(0, &program).unwrap();
        cpu.mem.set(3, Instruction::ret().encode());

        // INC, CALL, RET (returns to 2), then the zero word at 2 faults
        let err = cpu.run().unwrap_err();
        assert_eq!(err.pc(), 2);

        let pcs: Vec<u32> = cpu.tracer().iter().map(|rec| rec.pc).collect();
        assert_eq!(pcs, vec![0, 1, 3, 2]);
        let last = cpu.into_tracer().pop().unwrap();
        assert_eq!(last.raw_opcode, 0);
    }

    #[test]
    fn test_snapshot() {
        let mut cpu = make_cpu(2, &encode_all(&[Instruction::inc(0)]));
        cpu.mem.set(1, Instruction::inc(0).encode());
        cpu.run().unwrap();

        let snap = cpu.snapshot();
        assert_eq!(snap.pc, 2);
        assert_eq!(snap.state, CpuState::Halted);
        assert_eq!(snap.registers[0], 2);
        assert_eq!(snap.registers.len(), 16);
        assert_eq!(snap.memory.len(), 2);
        assert_eq!(snap.fault, None);
    }
}
