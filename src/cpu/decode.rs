//! Instruction decoder.
//!
//! Every instruction is one 32-bit word split into four bytes:
//!
//! ```text
//!  31      24 23      16 15       8 7        0
//! +----------+----------+----------+----------+
//! |  opcode  |    r1    |    r2    |    r3    |
//! +----------+----------+----------+----------+
//! ```
//!
//! The operand bytes carry no type information. Whether a field names a
//! register, a memory address or a jump target depends on the opcode, so
//! each handler in the executor reads the fields its own way.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Operation codes.
///
/// The set is closed. Only ADD, INC, ST, CALL, RET and LD execute; the rest
/// decode successfully and fault at dispatch.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Add = 0x01,
    Sub = 0x02,
    Mul = 0x03,
    Div = 0x04,
    Inc = 0x05,
    Dec = 0x06,
    And = 0x07,
    Or = 0x08,
    Xor = 0x09,
    Not = 0x0A,
    Jmp = 0x0B,
    Beq = 0x0C,
    Bne = 0x0D,
    Call = 0x0E,
    Ret = 0x0F,
    Ld = 0x10,
    St = 0x11,
    Fft = 0x12,
    Enc = 0x13,
    Decrypt = 0x15,
}

impl Opcode {
    /// Every opcode, in code order.
    pub const ALL: [Opcode; 20] = [
        Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::Div,
        Opcode::Inc, Opcode::Dec, Opcode::And, Opcode::Or,
        Opcode::Xor, Opcode::Not, Opcode::Jmp, Opcode::Beq,
        Opcode::Bne, Opcode::Call, Opcode::Ret, Opcode::Ld,
        Opcode::St, Opcode::Fft, Opcode::Enc, Opcode::Decrypt,
    ];

    /// The one-byte code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Jmp => "JMP",
            Opcode::Beq => "BEQ",
            Opcode::Bne => "BNE",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Ld => "LD",
            Opcode::St => "ST",
            Opcode::Fft => "FFT",
            Opcode::Enc => "ENC",
            Opcode::Decrypt => "DECRYPT",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.code() == raw)
            .ok_or(DecodeError::InvalidOpcode(raw))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub r1: u8,
    pub r2: u8,
    pub r3: u8,
}

impl Instruction {
    pub const fn new(opcode: Opcode, r1: u8, r2: u8, r3: u8) -> Self {
        Self { opcode, r1, r2, r3 }
    }

    /// `ADD rd, ra, rb`: rd := ra + rb
    pub const fn add(rd: u8, ra: u8, rb: u8) -> Self {
        Self::new(Opcode::Add, rd, ra, rb)
    }

    /// `INC r`: r := r + 1
    pub const fn inc(reg: u8) -> Self {
        Self::new(Opcode::Inc, reg, 0, 0)
    }

    /// `LD r, [addr]`: r := mem[addr]
    pub const fn ld(reg: u8, addr: u8) -> Self {
        Self::new(Opcode::Ld, reg, addr, 0)
    }

    /// `ST [addr], r`: mem[addr] := r
    pub const fn st(addr: u8, reg: u8) -> Self {
        Self::new(Opcode::St, addr, reg, 0)
    }

    /// `CALL target`
    pub const fn call(target: u8) -> Self {
        Self::new(Opcode::Call, target, 0, 0)
    }

    /// `RET`
    pub const fn ret() -> Self {
        Self::new(Opcode::Ret, 0, 0, 0)
    }

    /// Pack into an instruction word.
    #[inline]
    pub const fn encode(&self) -> u32 {
        (self.opcode.code() as u32) << 24
            | (self.r1 as u32) << 16
            | (self.r2 as u32) << 8
            | self.r3 as u32
    }
}

/// The raw opcode byte of an instruction word.
#[inline]
pub const fn raw_opcode(word: u32) -> u8 {
    (word >> 24) as u8
}

/// Split a word into its opcode and operand fields.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let opcode = Opcode::try_from(raw_opcode(word))?;
    Ok(Instruction {
        opcode,
        r1: (word >> 16) as u8,
        r2: (word >> 8) as u8,
        r3: word as u8,
    })
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Instruction { opcode, r1, r2, r3 } = *self;
        match opcode {
            Opcode::Add => write!(f, "ADD r{}, r{}, r{}", r1, r2, r3),
            Opcode::Inc => write!(f, "INC r{}", r1),
            Opcode::Ld => write!(f, "LD r{}, [{}]", r1, r2),
            Opcode::St => write!(f, "ST [{}], r{}", r1, r2),
            Opcode::Call => write!(f, "CALL {}", r1),
            Opcode::Ret => write!(f, "RET"),
            other => write!(f, "{} {}, {}, {}", other, r1, r2, r3),
        }
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_codes() {
        assert_eq!(Opcode::Add.code(), 0x01);
        assert_eq!(Opcode::St.code(), 0x11);
        assert_eq!(Opcode::Decrypt.code(), 0x15);
        for op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op.code()), Ok(op));
        }
    }

    #[test]
    fn test_unassigned_bytes_rejected() {
        for raw in [0x00, 0x14, 0x16, 0xFF] {
            assert_eq!(Opcode::try_from(raw), Err(DecodeError::InvalidOpcode(raw)));
        }
    }

    #[test]
    fn test_decode_fields() {
        let instr = decode(0x0102_0304).unwrap();
        assert_eq!(instr, Instruction::new(Opcode::Add, 2, 3, 4));
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(Instruction::ld(1, 100).encode(), 0x1001_6400);
        assert_eq!(Instruction::st(101, 1).encode(), 0x1165_0100);
        assert_eq!(Instruction::call(10).encode(), 0x0E0A_0000);
        assert_eq!(Instruction::ret().encode(), 0x0F00_0000);
        assert_eq!(raw_opcode(Instruction::inc(1).encode()), 0x05);
    }

    #[test]
    fn test_decode_invalid() {
        assert_eq!(decode(0), Err(DecodeError::InvalidOpcode(0)));
        assert_eq!(decode(0xFF00_0000), Err(DecodeError::InvalidOpcode(0xFF)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::add(2, 1, 1).to_string(), "ADD r2, r1, r1");
        assert_eq!(Instruction::ld(1, 100).to_string(), "LD r1, [100]");
        assert_eq!(Instruction::st(101, 1).to_string(), "ST [101], r1");
        assert_eq!(Instruction::new(Opcode::Jmp, 4, 0, 0).to_string(), "JMP 4, 0, 0");
    }
}
