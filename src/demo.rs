//! Built-in demonstration program.
//!
//! ```text
//!  0: LD   r1, [100]
//!  1: INC  r1
//!  2: ST   [101], r1
//!  3: ADD  r2, r1, r1
//!  4: CALL 10
//! 10: RET
//! ```
//!
//! Cells 5-9 are left zero. After the subroutine returns to 5 the CPU meets
//! opcode 0x00 and faults; by then r1 = 1, r2 = 2 and `[101]` = 1.

use crate::cpu::{Instruction, Memory, MemoryError};

/// Address the program reads its input from.
pub const INPUT_ADDR: u16 = 100;

/// Address the program stores its result to.
pub const OUTPUT_ADDR: u16 = 101;

/// The program as `(address, instruction)` pairs.
pub const PROGRAM: [(u16, Instruction); 6] = [
    (0, Instruction::ld(1, INPUT_ADDR as u8)),
    (1, Instruction::inc(1)),
    (2, Instruction::st(OUTPUT_ADDR as u8, 1)),
    (3, Instruction::add(2, 1, 1)),
    (4, Instruction::call(10)),
    (10, Instruction::ret()),
];

/// Write the program and its input into `mem`.
pub fn load(mem: &mut Memory) -> Result<(), MemoryError> {
    let end = PROGRAM
        .iter()
        .map(|&(addr, _)| addr as usize + 1)
        .chain([INPUT_ADDR, OUTPUT_ADDR].map(|addr| addr as usize + 1))
        .max()
        .unwrap_or(0);
    if end > mem.size() {
        return Err(MemoryError::ProgramTooLarge {
            size: end,
            available: mem.size(),
        });
    }

    for (addr, instr) in PROGRAM {
        mem.set(addr, instr.encode());
    }
    mem.set(INPUT_ADDR, 0);

    Ok(())
}
