//! Emulation of the MIPS R3000 used by the Playstation.
//!
//! # Pipeline
//!
//! The R3000 fetches the next instruction while executing the current one. This is emulated by
//! always keeping the instruction at [`Cpu::pc`] fetched ahead of time. It has two observable
//! effects. The instruction after a branch or jump, the branch delay slot, is always executed,
//! and a store to the instruction right after the store isn't seen when it's executed.
//!
//! Loads are delayed by an instruction as well, see [`RegisterFile`].

pub mod cop0;
pub mod irq;
pub mod opcode;
pub mod regs;

use crate::bus::{AddrUnit, Bus};
use crate::bus::bios::Bios;
use crate::Cycle;

use cop0::{Cop0, Exception};
use regs::{MulDiv, RegisterFile};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::mem;

pub use irq::{Irq, IrqState};
pub use opcode::{Instruction, RegIdx};

/// The base cost of an instruction.
pub const CYCLES_PER_INSTRUCTION: Cycle = 2;

/// Something the CPU can't do, which makes it stop before retiring the instruction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("unimplemented instruction {ins:?} at {addr:08x}")]
    UnimplementedInstruction { addr: u32, ins: Instruction },
}

/// The state of the CPU, for debugging and save states. Loads in flight aren't included.
#[derive(Clone, Serialize, Deserialize)]
pub struct CpuState {
    pub pc: u32,
    pub next_pc: u32,
    pub regs: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    pub cop0: Cop0,
}

type Handler = fn(&mut Cpu, Instruction);

pub struct Cpu {
    /// The address of the instruction being executed.
    current_pc: u32,
    /// The address of the next instruction to be executed, which has already been fetched.
    pc: u32,
    /// The address of the instruction after that. Branches change this, which is why the
    /// instruction at `pc` is always executed.
    next_pc: u32,
    /// The instruction at `pc`, or the exception raised when fetching it.
    fetched: Result<Instruction, Exception>,
    /// Set by branches and jumps.
    branched: bool,
    /// The current instruction is in a branch delay slot.
    in_delay: bool,
    regs: RegisterFile,
    muldiv: MulDiv,
    cop0: Cop0,
    /// Extra cycles taken by the current instruction.
    stall: Cycle,
    fault: Option<Fault>,
    /// Set when a break instruction is executed.
    hit_break: bool,
    pub(crate) bus: Bus,
}

impl Cpu {
    pub fn new(bios: Bios) -> Box<Self> {
        let mut cpu = Box::new(Self {
            current_pc: Bios::RESET_VECTOR,
            pc: Bios::RESET_VECTOR,
            next_pc: Bios::RESET_VECTOR.wrapping_add(4),
            fetched: Ok(Instruction(0)),
            branched: false,
            in_delay: false,
            regs: RegisterFile::default(),
            muldiv: MulDiv::default(),
            cop0: Cop0::default(),
            stall: 0,
            fault: None,
            hit_break: false,
            bus: Bus::new(bios),
        });
        cpu.reset();
        cpu
    }

    /// Zero the registers and start over from the reset vector. The bus isn't reset.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.muldiv.reset();
        self.cop0.reset();
        self.stall = 0;
        self.fault = None;
        self.hit_break = false;
        self.branched = false;
        self.in_delay = false;
        self.jump_to(Bios::RESET_VECTOR);
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn read_reg(&self, idx: RegIdx) -> u32 {
        self.regs.read(idx)
    }

    /// Write to a register outside of execution. A pending load to the register is dropped.
    pub fn write_reg(&mut self, idx: RegIdx, val: u32) {
        self.regs.write(idx, val);
    }

    pub fn hi(&self) -> u32 {
        self.muldiv.hi
    }

    pub fn lo(&self) -> u32 {
        self.muldiv.lo
    }

    pub fn cop0(&self) -> &Cop0 {
        &self.cop0
    }

    pub fn cop0_mut(&mut self) -> &mut Cop0 {
        &mut self.cop0
    }

    /// The instruction about to be executed, if it could be fetched.
    pub fn next_instruction(&self) -> Option<Instruction> {
        self.fetched.ok()
    }

    pub fn snapshot(&self) -> CpuState {
        CpuState {
            pc: self.pc,
            next_pc: self.next_pc,
            regs: *self.regs.regs(),
            hi: self.muldiv.hi,
            lo: self.muldiv.lo,
            cop0: self.cop0.clone(),
        }
    }

    pub fn restore(&mut self, state: &CpuState) {
        self.regs.restore(state.regs);
        self.muldiv.reset();
        self.muldiv.hi = state.hi;
        self.muldiv.lo = state.lo;
        self.cop0 = state.cop0.clone();
        self.branched = false;
        self.in_delay = false;
        self.jump_to(state.pc);
        self.next_pc = state.next_pc;
    }

    /// Move execution to `addr` and fetch the instruction there.
    pub fn jump_to(&mut self, addr: u32) {
        self.pc = addr;
        self.next_pc = addr.wrapping_add(4);
        self.fetched = self.fetch(addr);
    }

    /// Take a break instruction executed since the last call.
    pub fn take_break(&mut self) -> bool {
        mem::take(&mut self.hit_break)
    }

    /// Execute a single instruction, or start handling an interrupt, and report the cycles
    /// taken to the scheduler. An instruction which faults takes no cycles.
    pub fn tick(&mut self) -> Result<(), Fault> {
        if self.cop0.irq_pending(self.bus.irq_active()) {
            self.current_pc = self.pc;
            self.in_delay = self.branched;
            self.branched = false;
            self.regs.commit_loads();
            self.exception(Exception::Interrupt);
        } else {
            let fetched = self.fetched;

            self.current_pc = self.pc;
            self.in_delay = mem::take(&mut self.branched);
            self.pc = self.next_pc;
            self.next_pc = self.next_pc.wrapping_add(4);
            self.fetched = self.fetch(self.pc);

            match fetched {
                Ok(ins) => {
                    trace!("{:08x}: {}", self.current_pc, ins);
                    PRIMARY[ins.op() as usize](self, ins);
                }
                Err(ex) => self.exception(ex),
            }

            self.regs.commit_loads();
        }

        // The faulting instruction isn't retired, so it takes no time.
        if let Some(fault) = self.fault.take() {
            self.stall = 0;
            return Err(fault);
        }

        let cycles = CYCLES_PER_INSTRUCTION + mem::take(&mut self.stall) + self.bus.take_stall();

        self.muldiv.elapse(cycles);
        self.bus.add_cycles(cycles);

        Ok(())
    }

    fn fetch(&mut self, addr: u32) -> Result<Instruction, Exception> {
        if !u32::is_aligned(addr) {
            self.cop0.set_bad_vaddr(addr);
            return Err(Exception::AddressLoadError);
        }
        self.bus
            .read::<u32>(addr)
            .map(Instruction)
            .ok_or(Exception::BusInstructionError)
    }

    fn read<T: AddrUnit>(&mut self, addr: u32) -> Result<T, Exception> {
        if !T::is_aligned(addr) {
            self.cop0.set_bad_vaddr(addr);
            return Err(Exception::AddressLoadError);
        }
        self.bus.read(addr).ok_or(Exception::BusDataError)
    }

    fn write<T: AddrUnit>(&mut self, addr: u32, val: T) -> Result<(), Exception> {
        if !T::is_aligned(addr) {
            self.cop0.set_bad_vaddr(addr);
            return Err(Exception::AddressStoreError);
        }
        if self.cop0.cache_isolated() {
            trace!("store to {addr:08x} with cache isolated");
            return Ok(());
        }
        self.bus.write(addr, val).ok_or(Exception::BusDataError)
    }

    /// Enter the exception handler. The current instruction is aborted, so a load it issued is
    /// dropped.
    fn exception(&mut self, ex: Exception) {
        trace!("{ex:?} exception at {:08x}", self.current_pc);

        let vector = self.cop0.set_exception(ex, self.current_pc, self.in_delay);

        self.regs.cancel_issued();
        self.branched = false;
        self.jump_to(vector);
    }

    /// The address of the branch delay slot of the current instruction. Branch targets are
    /// relative to it.
    fn delay_slot(&self) -> u32 {
        self.current_pc.wrapping_add(4)
    }

    /// The return address stored by linking jumps and branches, after the delay slot.
    fn return_addr(&self) -> u32 {
        self.current_pc.wrapping_add(8)
    }

    fn branch(&mut self, offset: u32) {
        self.next_pc = self.delay_slot().wrapping_add(offset);
        self.branched = true;
    }

    fn jump(&mut self, addr: u32) {
        self.next_pc = addr;
        self.branched = true;
    }

    /// Address of the load or store instruction `ins`.
    fn addr(&self, ins: Instruction) -> u32 {
        self.regs.read(ins.rs()).wrapping_add(ins.imm())
    }

    fn load<T: AddrUnit>(&mut self, ins: Instruction, extend: fn(T) -> u32) {
        let addr = self.addr(ins);
        match self.read::<T>(addr) {
            Ok(val) => self.regs.issue_load(ins.rt(), extend(val)),
            Err(ex) => self.exception(ex),
        }
    }

    fn store<T: AddrUnit>(&mut self, ins: Instruction) {
        let addr = self.addr(ins);
        let val = T::from_u32(self.regs.read(ins.rt()));
        if let Err(ex) = self.write(addr, val) {
            self.exception(ex);
        }
    }

    fn unimplemented(&mut self, ins: Instruction) {
        warn!("unimplemented instruction {ins:?} at {:08x}", self.current_pc);
        self.fault = Some(Fault::UnimplementedInstruction { addr: self.current_pc, ins });
    }
}

const PRIMARY: [Handler; 64] = {
    let mut table = [Cpu::unimplemented as Handler; 64];
    table[0x00] = Cpu::op_special;
    table[0x01] = Cpu::op_bcondz;
    table[0x02] = Cpu::op_j;
    table[0x03] = Cpu::op_jal;
    table[0x04] = Cpu::op_beq;
    table[0x05] = Cpu::op_bne;
    table[0x06] = Cpu::op_blez;
    table[0x07] = Cpu::op_bgtz;
    table[0x08] = Cpu::op_addi;
    table[0x09] = Cpu::op_addiu;
    table[0x0a] = Cpu::op_slti;
    table[0x0b] = Cpu::op_sltiu;
    table[0x0c] = Cpu::op_andi;
    table[0x0d] = Cpu::op_ori;
    table[0x0e] = Cpu::op_xori;
    table[0x0f] = Cpu::op_lui;
    table[0x10] = Cpu::op_cop0;
    table[0x11] = Cpu::op_cop_unusable;
    table[0x13] = Cpu::op_cop_unusable;
    table[0x20] = Cpu::op_lb;
    table[0x21] = Cpu::op_lh;
    table[0x22] = Cpu::op_lwl;
    table[0x23] = Cpu::op_lw;
    table[0x24] = Cpu::op_lbu;
    table[0x25] = Cpu::op_lhu;
    table[0x26] = Cpu::op_lwr;
    table[0x28] = Cpu::op_sb;
    table[0x29] = Cpu::op_sh;
    table[0x2a] = Cpu::op_swl;
    table[0x2b] = Cpu::op_sw;
    table[0x2e] = Cpu::op_swr;
    table[0x30] = Cpu::op_cop_unusable;
    table[0x31] = Cpu::op_cop_unusable;
    table[0x33] = Cpu::op_cop_unusable;
    table[0x38] = Cpu::op_cop_unusable;
    table[0x39] = Cpu::op_cop_unusable;
    table[0x3b] = Cpu::op_cop_unusable;
    table
};

const SPECIAL: [Handler; 64] = {
    let mut table = [Cpu::unimplemented as Handler; 64];
    table[0x00] = Cpu::op_sll;
    table[0x02] = Cpu::op_srl;
    table[0x03] = Cpu::op_sra;
    table[0x04] = Cpu::op_sllv;
    table[0x06] = Cpu::op_srlv;
    table[0x07] = Cpu::op_srav;
    table[0x08] = Cpu::op_jr;
    table[0x09] = Cpu::op_jalr;
    table[0x0c] = Cpu::op_syscall;
    table[0x0d] = Cpu::op_break;
    table[0x10] = Cpu::op_mfhi;
    table[0x11] = Cpu::op_mthi;
    table[0x12] = Cpu::op_mflo;
    table[0x13] = Cpu::op_mtlo;
    table[0x18] = Cpu::op_mult;
    table[0x19] = Cpu::op_multu;
    table[0x1a] = Cpu::op_div;
    table[0x1b] = Cpu::op_divu;
    table[0x20] = Cpu::op_add;
    table[0x21] = Cpu::op_addu;
    table[0x22] = Cpu::op_sub;
    table[0x23] = Cpu::op_subu;
    table[0x24] = Cpu::op_and;
    table[0x25] = Cpu::op_or;
    table[0x26] = Cpu::op_xor;
    table[0x27] = Cpu::op_nor;
    table[0x2a] = Cpu::op_slt;
    table[0x2b] = Cpu::op_sltu;
    table
};

/// Instruction implementations.
impl Cpu {
    fn op_special(&mut self, ins: Instruction) {
        SPECIAL[ins.funct() as usize](self, ins);
    }

    /// SLL - Shift left logical.
    fn op_sll(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rt()) << ins.shamt();
        self.regs.write(ins.rd(), val);
    }

    /// SRL - Shift right logical.
    fn op_srl(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rt()) >> ins.shamt();
        self.regs.write(ins.rd(), val);
    }

    /// SRA - Shift right arithmetic.
    fn op_sra(&mut self, ins: Instruction) {
        let val = (self.regs.read(ins.rt()) as i32) >> ins.shamt();
        self.regs.write(ins.rd(), val as u32);
    }

    /// SLLV - Shift left logical variable.
    fn op_sllv(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rt()) << (self.regs.read(ins.rs()) & 0x1f);
        self.regs.write(ins.rd(), val);
    }

    /// SRLV - Shift right logical variable.
    fn op_srlv(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rt()) >> (self.regs.read(ins.rs()) & 0x1f);
        self.regs.write(ins.rd(), val);
    }

    /// SRAV - Shift right arithmetic variable.
    fn op_srav(&mut self, ins: Instruction) {
        let val = (self.regs.read(ins.rt()) as i32) >> (self.regs.read(ins.rs()) & 0x1f);
        self.regs.write(ins.rd(), val as u32);
    }

    /// JR - Jump register.
    fn op_jr(&mut self, ins: Instruction) {
        self.jump(self.regs.read(ins.rs()));
    }

    /// JALR - Jump and link register.
    fn op_jalr(&mut self, ins: Instruction) {
        self.jump(self.regs.read(ins.rs()));
        self.regs.write(ins.rd(), self.return_addr());
    }

    /// SYSCALL - System call exception.
    fn op_syscall(&mut self, _: Instruction) {
        trace!("syscall {:x}", self.regs.read(RegIdx::A0));
        self.exception(Exception::Syscall);
    }

    /// BREAK - Breakpoint exception.
    fn op_break(&mut self, _: Instruction) {
        self.hit_break = true;
        self.exception(Exception::Breakpoint);
    }

    /// MFHI - Move from hi. Waits for a multiply or divide to finish.
    fn op_mfhi(&mut self, ins: Instruction) {
        self.stall += self.muldiv.stall();
        self.regs.write(ins.rd(), self.muldiv.hi);
    }

    /// MTHI - Move to hi.
    fn op_mthi(&mut self, ins: Instruction) {
        self.muldiv.hi = self.regs.read(ins.rs());
    }

    /// MFLO - Move from lo. Waits for a multiply or divide to finish.
    fn op_mflo(&mut self, ins: Instruction) {
        self.stall += self.muldiv.stall();
        self.regs.write(ins.rd(), self.muldiv.lo);
    }

    /// MTLO - Move to lo.
    fn op_mtlo(&mut self, ins: Instruction) {
        self.muldiv.lo = self.regs.read(ins.rs());
    }

    /// MULT - Signed multiplication.
    fn op_mult(&mut self, ins: Instruction) {
        let (time, hi, lo) = regs::mult(self.regs.read(ins.rs()), self.regs.read(ins.rt()));
        self.muldiv.set(time, hi, lo);
    }

    /// MULTU - Unsigned multiplication.
    fn op_multu(&mut self, ins: Instruction) {
        let (time, hi, lo) = regs::multu(self.regs.read(ins.rs()), self.regs.read(ins.rt()));
        self.muldiv.set(time, hi, lo);
    }

    /// DIV - Signed division.
    fn op_div(&mut self, ins: Instruction) {
        let (hi, lo) = regs::div(self.regs.read(ins.rs()), self.regs.read(ins.rt()));
        self.muldiv.set(regs::DIV_TIME, hi, lo);
    }

    /// DIVU - Unsigned division.
    fn op_divu(&mut self, ins: Instruction) {
        let (hi, lo) = regs::divu(self.regs.read(ins.rs()), self.regs.read(ins.rt()));
        self.muldiv.set(regs::DIV_TIME, hi, lo);
    }

    /// ADD - Add with overflow exception.
    fn op_add(&mut self, ins: Instruction) {
        let (lhs, rhs) = (self.regs.read(ins.rs()), self.regs.read(ins.rt()));
        let val = lhs.wrapping_add(rhs);

        // Overflow if both operands have the same sign, and the result has a different one.
        if (!(lhs ^ rhs) & (lhs ^ val)) & 0x8000_0000 != 0 {
            self.exception(Exception::ArithmeticOverflow);
        } else {
            self.regs.write(ins.rd(), val);
        }
    }

    /// ADDU - Add without overflow exception.
    fn op_addu(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()).wrapping_add(self.regs.read(ins.rt()));
        self.regs.write(ins.rd(), val);
    }

    /// SUB - Subtract with overflow exception.
    fn op_sub(&mut self, ins: Instruction) {
        let (lhs, rhs) = (self.regs.read(ins.rs()), self.regs.read(ins.rt()));
        let val = lhs.wrapping_sub(rhs);

        // Overflow if the operands have different signs, and the result has the sign of `rhs`.
        if ((lhs ^ rhs) & (lhs ^ val)) & 0x8000_0000 != 0 {
            self.exception(Exception::ArithmeticOverflow);
        } else {
            self.regs.write(ins.rd(), val);
        }
    }

    /// SUBU - Subtract without overflow exception.
    fn op_subu(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()).wrapping_sub(self.regs.read(ins.rt()));
        self.regs.write(ins.rd(), val);
    }

    /// AND - Bitwise and.
    fn op_and(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) & self.regs.read(ins.rt());
        self.regs.write(ins.rd(), val);
    }

    /// OR - Bitwise or.
    fn op_or(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) | self.regs.read(ins.rt());
        self.regs.write(ins.rd(), val);
    }

    /// XOR - Bitwise exclusive or.
    fn op_xor(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) ^ self.regs.read(ins.rt());
        self.regs.write(ins.rd(), val);
    }

    /// NOR - Bitwise not or.
    fn op_nor(&mut self, ins: Instruction) {
        let val = !(self.regs.read(ins.rs()) | self.regs.read(ins.rt()));
        self.regs.write(ins.rd(), val);
    }

    /// SLT - Set if less than.
    fn op_slt(&mut self, ins: Instruction) {
        let val = (self.regs.read(ins.rs()) as i32) < (self.regs.read(ins.rt()) as i32);
        self.regs.write(ins.rd(), val.into());
    }

    /// SLTU - Set if less than unsigned.
    fn op_sltu(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) < self.regs.read(ins.rt());
        self.regs.write(ins.rd(), val.into());
    }

    /// # BCONDZ - Conditional branching
    ///
    /// BLTZ, BGEZ, BLTZAL and BGEZAL share an opcode. The linking variants set the return
    /// address whether or not the branch is taken.
    fn op_bcondz(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) as i32;
        let taken = (val < 0) ^ ins.bgez();

        if ins.link() {
            self.regs.write(RegIdx::RA, self.return_addr());
        }

        if taken {
            self.branch(ins.offset());
        }
    }

    /// J - Jump.
    fn op_j(&mut self, ins: Instruction) {
        self.jump((self.delay_slot() & 0xf000_0000) | (ins.target() << 2));
    }

    /// JAL - Jump and link.
    fn op_jal(&mut self, ins: Instruction) {
        self.regs.write(RegIdx::RA, self.return_addr());
        self.op_j(ins);
    }

    /// BEQ - Branch if equal.
    fn op_beq(&mut self, ins: Instruction) {
        if self.regs.read(ins.rs()) == self.regs.read(ins.rt()) {
            self.branch(ins.offset());
        }
    }

    /// BNE - Branch if not equal.
    fn op_bne(&mut self, ins: Instruction) {
        if self.regs.read(ins.rs()) != self.regs.read(ins.rt()) {
            self.branch(ins.offset());
        }
    }

    /// BLEZ - Branch if less than or equal to zero.
    fn op_blez(&mut self, ins: Instruction) {
        if self.regs.read(ins.rs()) as i32 <= 0 {
            self.branch(ins.offset());
        }
    }

    /// BGTZ - Branch if greater than zero.
    fn op_bgtz(&mut self, ins: Instruction) {
        if self.regs.read(ins.rs()) as i32 > 0 {
            self.branch(ins.offset());
        }
    }

    /// ADDI - Add immediate with overflow exception.
    fn op_addi(&mut self, ins: Instruction) {
        let (lhs, rhs) = (self.regs.read(ins.rs()), ins.imm());
        let val = lhs.wrapping_add(rhs);

        if (!(lhs ^ rhs) & (lhs ^ val)) & 0x8000_0000 != 0 {
            self.exception(Exception::ArithmeticOverflow);
        } else {
            self.regs.write(ins.rt(), val);
        }
    }

    /// ADDIU - Add immediate without overflow exception. The immediate is still sign extended.
    fn op_addiu(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()).wrapping_add(ins.imm());
        self.regs.write(ins.rt(), val);
    }

    /// SLTI - Set if less than immediate.
    fn op_slti(&mut self, ins: Instruction) {
        let val = (self.regs.read(ins.rs()) as i32) < (ins.imm() as i32);
        self.regs.write(ins.rt(), val.into());
    }

    /// SLTIU - Set if less than immediate unsigned. The immediate is sign extended before the
    /// unsigned compare.
    fn op_sltiu(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) < ins.imm();
        self.regs.write(ins.rt(), val.into());
    }

    /// ANDI - Bitwise and immediate.
    fn op_andi(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) & ins.imm_zero();
        self.regs.write(ins.rt(), val);
    }

    /// ORI - Bitwise or immediate.
    fn op_ori(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) | ins.imm_zero();
        self.regs.write(ins.rt(), val);
    }

    /// XORI - Bitwise exclusive or immediate.
    fn op_xori(&mut self, ins: Instruction) {
        let val = self.regs.read(ins.rs()) ^ ins.imm_zero();
        self.regs.write(ins.rt(), val);
    }

    /// LUI - Load upper immediate.
    fn op_lui(&mut self, ins: Instruction) {
        self.regs.write(ins.rt(), ins.imm_zero() << 16);
    }

    /// COP0 - Coprocessor 0 instruction.
    fn op_cop0(&mut self, ins: Instruction) {
        match ins.cop_op() {
            // MFC0 - Move from coprocessor 0. Delayed like a load.
            0x0 => match self.cop0.read_reg(ins.rd().0.into()) {
                Some(val) => self.regs.issue_load(ins.rt(), val),
                None => self.exception(Exception::ReservedInstruction),
            },
            // MTC0 - Move to coprocessor 0.
            0x4 => self.cop0.write_reg(ins.rd().0.into(), self.regs.read(ins.rt())),
            // RFE - Return from exception.
            0x10 if ins.funct() == 0x10 => self.cop0.return_from_exception(),
            _ => self.unimplemented(ins),
        }
    }

    /// Coprocessor 1 and 3 don't exist, and coprocessor 0 has no loads or stores.
    fn op_cop_unusable(&mut self, _: Instruction) {
        self.exception(Exception::CopUnusable);
    }

    /// LB - Load byte.
    fn op_lb(&mut self, ins: Instruction) {
        self.load::<u8>(ins, |val| val as i8 as u32);
    }

    /// LH - Load halfword.
    fn op_lh(&mut self, ins: Instruction) {
        self.load::<u16>(ins, |val| val as i16 as u32);
    }

    /// LW - Load word.
    fn op_lw(&mut self, ins: Instruction) {
        self.load::<u32>(ins, |val| val);
    }

    /// LBU - Load byte unsigned.
    fn op_lbu(&mut self, ins: Instruction) {
        self.load::<u8>(ins, u32::from);
    }

    /// LHU - Load halfword unsigned.
    fn op_lhu(&mut self, ins: Instruction) {
        self.load::<u16>(ins, u32::from);
    }

    /// # LWL - Load word left
    ///
    /// Loads the bytes from the address to the start of the word containing it into the upper
    /// bytes of the register. Together with LWR it loads unaligned words. It merges with a load
    /// still in the delay slot, so LWL and LWR can follow each other directly.
    fn op_lwl(&mut self, ins: Instruction) {
        let addr = self.addr(ins);
        let cur = self.regs.read_through_delay(ins.rt());

        match self.read::<u32>(addr & !3) {
            Ok(word) => {
                let val = match addr & 3 {
                    0 => (cur & 0x00ff_ffff) | (word << 24),
                    1 => (cur & 0x0000_ffff) | (word << 16),
                    2 => (cur & 0x0000_00ff) | (word << 8),
                    _ => word,
                };
                self.regs.issue_load(ins.rt(), val);
            }
            Err(ex) => self.exception(ex),
        }
    }

    /// LWR - Load word right. The counterpart of LWL, loading the lower bytes.
    fn op_lwr(&mut self, ins: Instruction) {
        let addr = self.addr(ins);
        let cur = self.regs.read_through_delay(ins.rt());

        match self.read::<u32>(addr & !3) {
            Ok(word) => {
                let val = match addr & 3 {
                    0 => word,
                    1 => (cur & 0xff00_0000) | (word >> 8),
                    2 => (cur & 0xffff_0000) | (word >> 16),
                    _ => (cur & 0xffff_ff00) | (word >> 24),
                };
                self.regs.issue_load(ins.rt(), val);
            }
            Err(ex) => self.exception(ex),
        }
    }

    /// SB - Store byte.
    fn op_sb(&mut self, ins: Instruction) {
        self.store::<u8>(ins);
    }

    /// SH - Store halfword.
    fn op_sh(&mut self, ins: Instruction) {
        self.store::<u16>(ins);
    }

    /// SW - Store word.
    fn op_sw(&mut self, ins: Instruction) {
        self.store::<u32>(ins);
    }

    /// SWL - Store word left. Stores the upper bytes of the register, see LWL.
    fn op_swl(&mut self, ins: Instruction) {
        let addr = self.addr(ins);
        let val = self.regs.read(ins.rt());
        let aligned = addr & !3;

        let merged = self.read::<u32>(aligned).map(|word| match addr & 3 {
            0 => (word & 0xffff_ff00) | (val >> 24),
            1 => (word & 0xffff_0000) | (val >> 16),
            2 => (word & 0xff00_0000) | (val >> 8),
            _ => val,
        });

        if let Err(ex) = merged.and_then(|val| self.write(aligned, val)) {
            self.exception(ex);
        }
    }

    /// SWR - Store word right. Stores the lower bytes of the register, see LWR.
    fn op_swr(&mut self, ins: Instruction) {
        let addr = self.addr(ins);
        let val = self.regs.read(ins.rt());
        let aligned = addr & !3;

        let merged = self.read::<u32>(aligned).map(|word| match addr & 3 {
            0 => val,
            1 => (word & 0x0000_00ff) | (val << 8),
            2 => (word & 0x0000_ffff) | (val << 16),
            _ => (word & 0x00ff_ffff) | (val << 24),
        });

        if let Err(ex) = merged.and_then(|val| self.write(aligned, val)) {
            self.exception(ex);
        }
    }
}
