//! Decoding of MIPS R3000 instructions.
//!
//! All instructions are encoded in 32 bits, using one of three layouts:
//!
//! - Immediate
//!     - 6-bit op.
//!     - 5-bit source register.
//!     - 5-bit target register.
//!     - 16-bit immediate value.
//!
//! - Jump
//!     - 6-bit op.
//!     - 26-bit target address.
//!
//! - Register
//!     - 6-bit op.
//!     - 5-bit source register.
//!     - 5-bit target register.
//!     - 5-bit destination register.
//!     - 5-bit shift value.
//!     - 6-bit function field.

use crate::bits::{self, Bit};

use serde::{Deserialize, Serialize};

use std::fmt;

/// Index of a general purpose register.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegIdx(pub u8);

impl RegIdx {
    pub const ZERO: Self = Self(0);
    pub const AT: Self = Self(1);
    pub const V0: Self = Self(2);
    pub const V1: Self = Self(3);
    pub const A0: Self = Self(4);
    pub const A1: Self = Self(5);
    pub const A2: Self = Self(6);
    pub const A3: Self = Self(7);
    pub const T0: Self = Self(8);
    pub const T1: Self = Self(9);
    pub const T2: Self = Self(10);
    pub const S0: Self = Self(16);
    pub const S1: Self = Self(17);
    pub const K0: Self = Self(26);
    pub const K1: Self = Self(27);
    pub const GP: Self = Self(28);
    pub const SP: Self = Self(29);
    pub const FP: Self = Self(30);
    pub const RA: Self = Self(31);

    #[inline]
    pub fn new(idx: u32) -> Self {
        debug_assert!(idx < 32);
        Self(idx as u8)
    }

    pub fn name(self) -> &'static str {
        REGISTER_NAMES[self.0 as usize]
    }
}

impl fmt::Display for RegIdx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}", self.name())
    }
}

/// A single encoded instruction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    pub fn new(ins: u32) -> Self {
        Self(ins)
    }

    /// Primary opcode.
    #[inline]
    pub fn op(self) -> u32 {
        self.0.bit_range(26, 31)
    }

    /// Secondary opcode, used if [`Self::op`] is 0.
    #[inline]
    pub fn funct(self) -> u32 {
        self.0.bit_range(0, 5)
    }

    /// Coprocessor operation.
    #[inline]
    pub fn cop_op(self) -> u32 {
        self.0.bit_range(21, 25)
    }

    /// Sign extended immediate value.
    #[inline]
    pub fn imm(self) -> u32 {
        bits::sign_extend_16(self.0)
    }

    /// Zero extended immediate value.
    #[inline]
    pub fn imm_zero(self) -> u32 {
        self.0.bit_range(0, 15)
    }

    /// Jump target.
    #[inline]
    pub fn target(self) -> u32 {
        self.0.bit_range(0, 25)
    }

    /// Branch offset in bytes.
    #[inline]
    pub fn offset(self) -> u32 {
        self.imm() << 2
    }

    #[inline]
    pub fn shamt(self) -> u32 {
        self.0.bit_range(6, 10)
    }

    /// Destination register.
    #[inline]
    pub fn rd(self) -> RegIdx {
        RegIdx::new(self.0.bit_range(11, 15))
    }

    /// Target register.
    #[inline]
    pub fn rt(self) -> RegIdx {
        RegIdx::new(self.0.bit_range(16, 20))
    }

    /// Source register.
    #[inline]
    pub fn rs(self) -> RegIdx {
        RegIdx::new(self.0.bit_range(21, 25))
    }

    /// BCONDZ: branch if greater than or equal to zero rather than less than zero.
    #[inline]
    pub fn bgez(self) -> bool {
        self.0.bit(16)
    }

    /// BCONDZ: link the return address.
    #[inline]
    pub fn link(self) -> bool {
        self.0.bit_range(17, 20) == 0x8
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x} ({})", self.0, self)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (rs, rt, rd) = (self.rs(), self.rt(), self.rd());
        let imm = self.imm() as i32;
        match self.op() {
            0x0 => match self.funct() {
                0x00 if self.0 == 0 => write!(f, "nop"),
                0x00 => write!(f, "sll {rd} {rt} {}", self.shamt()),
                0x02 => write!(f, "srl {rd} {rt} {}", self.shamt()),
                0x03 => write!(f, "sra {rd} {rt} {}", self.shamt()),
                0x04 => write!(f, "sllv {rd} {rt} {rs}"),
                0x06 => write!(f, "srlv {rd} {rt} {rs}"),
                0x07 => write!(f, "srav {rd} {rt} {rs}"),
                0x08 => write!(f, "jr {rs}"),
                0x09 => write!(f, "jalr {rd} {rs}"),
                0x0c => write!(f, "syscall"),
                0x0d => write!(f, "break"),
                0x10 => write!(f, "mfhi {rd}"),
                0x11 => write!(f, "mthi {rs}"),
                0x12 => write!(f, "mflo {rd}"),
                0x13 => write!(f, "mtlo {rs}"),
                0x18 => write!(f, "mult {rs} {rt}"),
                0x19 => write!(f, "multu {rs} {rt}"),
                0x1a => write!(f, "div {rs} {rt}"),
                0x1b => write!(f, "divu {rs} {rt}"),
                0x20 => write!(f, "add {rd} {rs} {rt}"),
                0x21 => write!(f, "addu {rd} {rs} {rt}"),
                0x22 => write!(f, "sub {rd} {rs} {rt}"),
                0x23 => write!(f, "subu {rd} {rs} {rt}"),
                0x24 => write!(f, "and {rd} {rs} {rt}"),
                0x25 => write!(f, "or {rd} {rs} {rt}"),
                0x26 => write!(f, "xor {rd} {rs} {rt}"),
                0x27 => write!(f, "nor {rd} {rs} {rt}"),
                0x2a => write!(f, "slt {rd} {rs} {rt}"),
                0x2b => write!(f, "sltu {rd} {rs} {rt}"),
                _ => write!(f, "illegal"),
            },
            0x1 => {
                let op = match (self.link(), self.bgez()) {
                    (true, true) => "bgezal",
                    (true, false) => "bltzal",
                    (false, true) => "bgez",
                    (false, false) => "bltz",
                };
                write!(f, "{op} {rs} {imm}")
            }
            0x2 => write!(f, "j {:08x}", self.target() << 2),
            0x3 => write!(f, "jal {:08x}", self.target() << 2),
            0x4 => write!(f, "beq {rs} {rt} {imm}"),
            0x5 => write!(f, "bne {rs} {rt} {imm}"),
            0x6 => write!(f, "blez {rs} {imm}"),
            0x7 => write!(f, "bgtz {rs} {imm}"),
            0x8 => write!(f, "addi {rt} {rs} {imm}"),
            0x9 => write!(f, "addiu {rt} {rs} {imm}"),
            0xa => write!(f, "slti {rt} {rs} {imm}"),
            0xb => write!(f, "sltiu {rt} {rs} {imm}"),
            0xc => write!(f, "andi {rt} {rs} {:#x}", self.imm_zero()),
            0xd => write!(f, "ori {rt} {rs} {:#x}", self.imm_zero()),
            0xe => write!(f, "xori {rt} {rs} {:#x}", self.imm_zero()),
            0xf => write!(f, "lui {rt} {:#x}", self.imm_zero()),
            0x10..=0x13 => match self.cop_op() {
                0x0 => write!(f, "mfc{} {rt} {}", self.op() & 3, rd.0),
                0x2 => write!(f, "cfc{} {rt} {}", self.op() & 3, rd.0),
                0x4 => write!(f, "mtc{} {rt} {}", self.op() & 3, rd.0),
                0x6 => write!(f, "ctc{} {rt} {}", self.op() & 3, rd.0),
                0x10 if self.op() == 0x10 && self.funct() == 0x10 => write!(f, "rfe"),
                _ => write!(f, "cop{} {:07x}", self.op() & 3, self.0.bit_range(0, 24)),
            },
            0x20 => write!(f, "lb {rt} {imm}({rs})"),
            0x21 => write!(f, "lh {rt} {imm}({rs})"),
            0x22 => write!(f, "lwl {rt} {imm}({rs})"),
            0x23 => write!(f, "lw {rt} {imm}({rs})"),
            0x24 => write!(f, "lbu {rt} {imm}({rs})"),
            0x25 => write!(f, "lhu {rt} {imm}({rs})"),
            0x26 => write!(f, "lwr {rt} {imm}({rs})"),
            0x28 => write!(f, "sb {rt} {imm}({rs})"),
            0x29 => write!(f, "sh {rt} {imm}({rs})"),
            0x2a => write!(f, "swl {rt} {imm}({rs})"),
            0x2b => write!(f, "sw {rt} {imm}({rs})"),
            0x2e => write!(f, "swr {rt} {imm}({rs})"),
            0x30..=0x33 => write!(f, "lwc{} {} {imm}({rs})", self.op() & 3, rt.0),
            0x38..=0x3b => write!(f, "swc{} {} {imm}({rs})", self.op() & 3, rt.0),
            _ => write!(f, "illegal"),
        }
    }
}

pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp", "fp",
    "ra",
];
