use super::opcode::RegIdx;
use crate::Cycle;

/// A value loaded from memory or a coprocessor on its way to a register.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
struct PendingLoad {
    reg: RegIdx,
    val: u32,
}

/// # Registers
///
/// All registers of the MIPS R3000 are general purpose besides $r0, which always reads as 0.
/// They are however used for specific purposes by convention.
///
/// | Number  | Name    | Usage                 |
/// |---------|---------|-----------------------|
/// | r0      | $zero   | Always 0              |
/// | r1      | $at     | Reserved by assembler |
/// | r2-r3   | $v0-$v1 | Results               |
/// | r4-r7   | $a0-$a3 | Arguments             |
/// | r8-r15  | $t0-$t7 | Temporaries           |
/// | r16-r23 | $s0-$s7 | Storing               |
/// | r24-r25 | $t8-$t9 | Temporaries           |
/// | r26-r27 | $k0-$k1 | Reserved by kernel    |
/// | r28     | $gp     | Global pointer        |
/// | r29     | $sp     | Stack pointer         |
/// | r30     | $fp     | Frame pointer         |
/// | r31     | $ra     | Return address        |
///
/// # Load delay slot
///
/// A value loaded into a register isn't visible to the instruction right after the load, only
/// to the one after that. Loads are first issued with [`RegisterFile::issue_load`], moved to the
/// delay slot when the instruction that issued it is done, and written to the register at the
/// end of the next instruction. Loads to $r0 are used to represent no load, since writing to it
/// does nothing.
#[derive(Clone)]
pub struct RegisterFile {
    regs: [u32; 32],
    /// The load issued by the previous instruction.
    delayed: PendingLoad,
    /// The load issued by the current instruction.
    issued: PendingLoad,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            regs: [0; 32],
            delayed: PendingLoad::default(),
            issued: PendingLoad::default(),
        }
    }
}

impl RegisterFile {
    #[inline]
    pub fn read(&self, idx: RegIdx) -> u32 {
        self.regs[idx.0 as usize]
    }

    /// Write directly to a register. A delayed load to the same register is dropped, since the
    /// write by the instruction in the delay slot wins.
    #[inline]
    pub fn write(&mut self, idx: RegIdx, val: u32) {
        self.regs[idx.0 as usize] = val;
        self.regs[0] = 0;

        if self.delayed.reg == idx {
            self.delayed = PendingLoad::default();
        }
    }

    /// Issue a load to `idx`. If the previous instruction loaded to the same register, that load
    /// is thrown away.
    #[inline]
    pub fn issue_load(&mut self, idx: RegIdx, val: u32) {
        debug_assert_eq!(self.issued.reg, RegIdx::ZERO, "two loads issued by one instruction");

        if self.delayed.reg == idx {
            self.delayed = PendingLoad::default();
        }

        self.issued = PendingLoad { reg: idx, val };
    }

    /// The value of `idx` including a load still in the delay slot. LWL and LWR merge with this
    /// instead of the register value.
    #[inline]
    pub fn read_through_delay(&self, idx: RegIdx) -> u32 {
        if self.delayed.reg == idx && idx != RegIdx::ZERO {
            self.delayed.val
        } else {
            self.read(idx)
        }
    }

    /// Write the load in the delay slot to its register and move the load issued by the current
    /// instruction into the delay slot. Called at the end of every instruction.
    #[inline]
    pub fn commit_loads(&mut self) {
        let PendingLoad { reg, val } = self.delayed;

        self.regs[reg.0 as usize] = val;
        self.regs[0] = 0;

        self.delayed = std::mem::take(&mut self.issued);
    }

    /// Drop the load issued by the current instruction. Used when it raises an exception.
    pub fn cancel_issued(&mut self) {
        self.issued = PendingLoad::default();
    }

    pub fn regs(&self) -> &[u32; 32] {
        &self.regs
    }

    /// Overwrite every register and drop any load in flight.
    pub fn restore(&mut self, regs: [u32; 32]) {
        self.regs = regs;
        self.regs[0] = 0;
        self.delayed = PendingLoad::default();
        self.issued = PendingLoad::default();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The hi and lo registers used for the result of multiply and divide instructions, which run in
/// the background while the CPU keeps executing.
#[derive(Default, Clone)]
pub struct MulDiv {
    pub hi: u32,
    pub lo: u32,
    /// Cycles until the result of the last multiply or divide is ready.
    busy: Cycle,
}

impl MulDiv {
    /// Start an operation which takes `time` cycles to complete.
    pub fn set(&mut self, time: Cycle, hi: u32, lo: u32) {
        self.hi = hi;
        self.lo = lo;
        self.busy = time;
    }

    /// The amount of cycles the CPU has to wait before reading the result.
    pub fn stall(&mut self) -> Cycle {
        std::mem::take(&mut self.busy)
    }

    /// Let `cycles` pass.
    pub fn elapse(&mut self, cycles: Cycle) {
        self.busy = self.busy.saturating_sub(cycles);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Signed multiplication. The time depends on the magnitude of `lhs`.
pub fn mult(lhs: u32, rhs: u32) -> (Cycle, u32, u32) {
    let (lhs, rhs) = (lhs as i32, rhs as i32);

    let time = match if lhs < 0 { !lhs } else { lhs }.leading_zeros() {
        0..=11 => 13,
        12..=20 => 9,
        _ => 7,
    };

    let val = (i64::from(lhs) * i64::from(rhs)) as u64;
    (time, (val >> 32) as u32, val as u32)
}

/// Unsigned multiplication.
pub fn multu(lhs: u32, rhs: u32) -> (Cycle, u32, u32) {
    let time = match lhs {
        0x0000_0000..=0x0000_07ff => 7,
        0x0000_0800..=0x000f_ffff => 9,
        _ => 13,
    };

    let val = u64::from(lhs) * u64::from(rhs);
    (time, (val >> 32) as u32, val as u32)
}

pub const DIV_TIME: Cycle = 36;

/// Signed division. Doesn't fail when dividing by zero, but returns `(hi, lo)` of
/// `(lhs, 1)` for negative `lhs` and `(lhs, 0xffffffff)` otherwise.
pub fn div(lhs: u32, rhs: u32) -> (u32, u32) {
    let (lhs, rhs) = (lhs as i32, rhs as i32);

    if rhs == 0 {
        let lo = if lhs < 0 { 1 } else { 0xffff_ffff };
        (lhs as u32, lo)
    } else if rhs == -1 && lhs == i32::MIN {
        (0, 0x8000_0000)
    } else {
        ((lhs % rhs) as u32, (lhs / rhs) as u32)
    }
}

/// Unsigned division. Dividing by zero returns `(lhs, 0xffffffff)`.
pub fn divu(lhs: u32, rhs: u32) -> (u32, u32) {
    if rhs == 0 {
        (lhs, 0xffff_ffff)
    } else {
        (lhs % rhs, lhs / rhs)
    }
}
