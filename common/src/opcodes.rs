
use std::fmt;

use derive_more::IsVariant;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Operand shape following the opcode byte in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Addressing {
    /// Opcode byte only.
    Implied,
    /// One literal byte.
    Immediate,
    /// Two-byte address, low byte first.
    Absolute,
    /// One signed offset byte.
    Relative,
}

/// The recognized instruction subset. Discriminants are the opcode bytes as
/// they appear in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Opcode {
    Brk = 0x00,
    AdcAbs = 0x6D,
    StaAbs = 0x8D,
    LdyImm = 0xA0,
    LdxImm = 0xA2,
    LdaImm = 0xA9,
    LdaAbs = 0xAD,
    Bne = 0xD0,
    Nop = 0xEA,
    CpxAbs = 0xEC,
    IncAbs = 0xEE,
    Sys = 0xFF,
}

impl Opcode {
    pub fn decode(byte: u8) -> Option<Opcode> {
        Opcode::from_u8(byte)
    }

    /// Static operand shape. `Sys` reports `Implied` here; its print-string
    /// mode borrows an absolute operand, which only the pipeline can see
    /// (the mode lives in the x register).
    pub fn addressing(self) -> Addressing {
        use Opcode::*;
        match self {
            Brk | Nop | Sys => Addressing::Implied,
            LdaImm | LdxImm | LdyImm => Addressing::Immediate,
            AdcAbs | StaAbs | LdaAbs | CpxAbs | IncAbs => Addressing::Absolute,
            Bne => Addressing::Relative,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Brk => "brk",
            AdcAbs => "adc",
            StaAbs => "sta",
            LdyImm => "ldy",
            LdxImm => "ldx",
            LdaImm | LdaAbs => "lda",
            Bne => "bne",
            Nop => "nop",
            CpxAbs => "cpx",
            IncAbs => "inc",
            Sys => "sys",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
