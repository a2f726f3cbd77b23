//! Encoding of the instructions used by the tests.

use crate::cpu::RegIdx;

fn imm(op: u32, rs: RegIdx, rt: RegIdx, imm: u16) -> u32 {
    op << 26 | u32::from(rs.0) << 21 | u32::from(rt.0) << 16 | u32::from(imm)
}

fn special(funct: u32, rs: RegIdx, rt: RegIdx, rd: RegIdx, shamt: u32) -> u32 {
    u32::from(rs.0) << 21 | u32::from(rt.0) << 16 | u32::from(rd.0) << 11 | shamt << 6 | funct
}

/// Encode a branch from `at` to `to`.
fn branch(op: u32, rs: RegIdx, rt: RegIdx, at: u32, to: u32) -> u32 {
    let offset = (to.wrapping_sub(at.wrapping_add(4)) as i32) >> 2;
    imm(op, rs, rt, offset as u16)
}

pub fn nop() -> u32 {
    0
}

pub fn brk() -> u32 {
    0xd
}

pub fn syscall() -> u32 {
    0xc
}

pub fn sll(rd: RegIdx, rt: RegIdx, shamt: u32) -> u32 {
    special(0x00, RegIdx::ZERO, rt, rd, shamt)
}

pub fn sra(rd: RegIdx, rt: RegIdx, shamt: u32) -> u32 {
    special(0x03, RegIdx::ZERO, rt, rd, shamt)
}

pub fn jr(rs: RegIdx) -> u32 {
    special(0x08, rs, RegIdx::ZERO, RegIdx::ZERO, 0)
}

pub fn mfhi(rd: RegIdx) -> u32 {
    special(0x10, RegIdx::ZERO, RegIdx::ZERO, rd, 0)
}

pub fn mflo(rd: RegIdx) -> u32 {
    special(0x12, RegIdx::ZERO, RegIdx::ZERO, rd, 0)
}

pub fn mult(rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x18, rs, rt, RegIdx::ZERO, 0)
}

pub fn div(rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x1a, rs, rt, RegIdx::ZERO, 0)
}

pub fn divu(rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x1b, rs, rt, RegIdx::ZERO, 0)
}

pub fn add(rd: RegIdx, rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x20, rs, rt, rd, 0)
}

pub fn addu(rd: RegIdx, rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x21, rs, rt, rd, 0)
}

pub fn sub(rd: RegIdx, rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x22, rs, rt, rd, 0)
}

pub fn slt(rd: RegIdx, rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x2a, rs, rt, rd, 0)
}

pub fn sltu(rd: RegIdx, rs: RegIdx, rt: RegIdx) -> u32 {
    special(0x2b, rs, rt, rd, 0)
}

pub fn bltzal(rs: RegIdx, at: u32, to: u32) -> u32 {
    branch(0x01, rs, RegIdx(0x10), at, to)
}

/// Jump to `to`, which must be in the same 256 megabyte region as the jump.
pub fn j(to: u32) -> u32 {
    0x02 << 26 | (to & 0x0fff_ffff) >> 2
}

pub fn jal(to: u32) -> u32 {
    0x03 << 26 | (to & 0x0fff_ffff) >> 2
}

pub fn beq(rs: RegIdx, rt: RegIdx, at: u32, to: u32) -> u32 {
    branch(0x04, rs, rt, at, to)
}

pub fn bne(rs: RegIdx, rt: RegIdx, at: u32, to: u32) -> u32 {
    branch(0x05, rs, rt, at, to)
}

pub fn addi(rt: RegIdx, rs: RegIdx, val: i16) -> u32 {
    imm(0x08, rs, rt, val as u16)
}

pub fn addiu(rt: RegIdx, rs: RegIdx, val: i16) -> u32 {
    imm(0x09, rs, rt, val as u16)
}

pub fn ori(rt: RegIdx, rs: RegIdx, val: u16) -> u32 {
    imm(0x0d, rs, rt, val)
}

pub fn lui(rt: RegIdx, val: u16) -> u32 {
    imm(0x0f, RegIdx::ZERO, rt, val)
}

/// Load a full 32-bit value with `lui` and `ori`.
pub fn li(rt: RegIdx, val: u32) -> [u32; 2] {
    [lui(rt, (val >> 16) as u16), ori(rt, rt, val as u16)]
}

pub fn mfc0(rt: RegIdx, rd: u8) -> u32 {
    0x10 << 26 | u32::from(rt.0) << 16 | u32::from(rd) << 11
}

pub fn mtc0(rt: RegIdx, rd: u8) -> u32 {
    0x10 << 26 | 0x4 << 21 | u32::from(rt.0) << 16 | u32::from(rd) << 11
}

pub fn rfe() -> u32 {
    0x10 << 26 | 0x10 << 21 | 0x10
}

pub fn lb(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x20, rs, rt, offset as u16)
}

pub fn lwl(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x22, rs, rt, offset as u16)
}

pub fn lw(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x23, rs, rt, offset as u16)
}

pub fn lbu(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x24, rs, rt, offset as u16)
}

pub fn lwr(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x26, rs, rt, offset as u16)
}

pub fn sb(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x28, rs, rt, offset as u16)
}

pub fn sh(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x29, rs, rt, offset as u16)
}

pub fn swl(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x2a, rs, rt, offset as u16)
}

pub fn sw(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x2b, rs, rt, offset as u16)
}

pub fn swr(rt: RegIdx, offset: i16, rs: RegIdx) -> u32 {
    imm(0x2e, rs, rt, offset as u16)
}

/// A GTE command, which isn't emulated.
pub fn cop2(cmd: u32) -> u32 {
    0x12 << 26 | 1 << 25 | (cmd & 0x1ff_ffff)
}

/// Turn instruction words into little endian bytes.
pub fn assemble(code: &[u32]) -> Vec<u8> {
    code.iter().flat_map(|ins| ins.to_le_bytes()).collect()
}

/// Something which can be placed in a program, either a single instruction or a pseudo
/// instruction expanding to several.
pub trait Emit {
    fn emit(self, code: &mut Vec<u32>);
}

impl Emit for u32 {
    fn emit(self, code: &mut Vec<u32>) {
        code.push(self);
    }
}

impl<const N: usize> Emit for [u32; N] {
    fn emit(self, code: &mut Vec<u32>) {
        code.extend(self);
    }
}

/// Build a program from instructions and pseudo instructions.
macro_rules! program {
    ($($ins:expr),* $(,)?) => {{
        let mut code = Vec::<u32>::new();
        $( $crate::test::asm::Emit::emit($ins, &mut code); )*
        code
    }};
}

pub(crate) use program;
