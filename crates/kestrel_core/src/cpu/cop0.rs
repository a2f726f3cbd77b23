//! # Coprocessor 0
//!
//! Handles exceptions and interrupt masking. It can also handle virtual memory, but that isn't
//! used by the Playstation.

use crate::bits::{Bit, BitSet};

use serde::{Deserialize, Serialize};

/// Exception cause codes, as stored in bits 2..6 of the CAUSE register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Interrupt = 0x0,
    /// Loading data or fetching an instruction at an unaligned address.
    AddressLoadError = 0x4,
    /// Storing data at an unaligned address.
    AddressStoreError = 0x5,
    /// Fetching an instruction from an unmapped address.
    BusInstructionError = 0x6,
    /// Loading or storing data at an unmapped address.
    BusDataError = 0x7,
    Syscall = 0x8,
    Breakpoint = 0x9,
    ReservedInstruction = 0xa,
    /// Using a coprocessor which isn't there.
    CopUnusable = 0xb,
    /// Signed addition or subtraction overflowed.
    ArithmeticOverflow = 0xc,
}

pub const BPC: usize = 3;
pub const BDA: usize = 5;
pub const JUMPDEST: usize = 6;
pub const DCIC: usize = 7;
pub const BAD_VADDR: usize = 8;
pub const BDAM: usize = 9;
pub const BPCM: usize = 11;
pub const SR: usize = 12;
pub const CAUSE: usize = 13;
pub const EPC: usize = 14;
pub const PRID: usize = 15;

/// | Number | Name     | Usage                       |
/// |--------|----------|-----------------------------|
/// | 3      | bpc      | Breakpoint on execution     |
/// | 5      | bda      | Breakpoint on data access   |
/// | 6      | jumpdest | Memorized jump address      |
/// | 7      | dcic     | Breakpoint control          |
/// | 8      | badvaddr | Bad virtual address         |
/// | 9      | bdam     | Data access breakpoint mask |
/// | 11     | bpcm     | Execute breakpoint mask     |
/// | 12     | sr       | Status register             |
/// | 13     | cause    | Exception type              |
/// | 14     | epc      | Return address from trap    |
/// | 15     | prid     | Processor ID                |
///
/// The rest read as zero and ignore writes.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cop0 {
    regs: [u32; 16],
}

/// Bits writable with MTC0.
const WRITE_MASK: [u32; 16] = [
    0, 0, 0,
    0xffff_ffff, // BPC
    0,
    0xffff_ffff, // BDA
    0,
    0xff80_f03f, // DCIC
    0,
    0xffff_ffff, // BDAM
    0,
    0xffff_ffff, // BPCM
    0xf04f_ff3f, // SR
    0x0000_0300, // CAUSE, only the software interrupt bits
    0,
    0,
];

const RESET_VALUES: [u32; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0000_0002];

impl Default for Cop0 {
    fn default() -> Self {
        Self { regs: RESET_VALUES }
    }
}

impl Cop0 {
    /// If stores go to the cache instead of memory.
    #[inline]
    pub fn cache_isolated(&self) -> bool {
        self.regs[SR].bit(16)
    }

    /// Boot exception vectors, meaning exceptions are handled by the BIOS.
    #[inline]
    fn bev(&self) -> bool {
        self.regs[SR].bit(22)
    }

    /// Current interrupt enable flag.
    #[inline]
    pub fn irq_enabled(&self) -> bool {
        self.regs[SR].bit(0)
    }

    /// If an interrupt should be taken, given if the interrupt controller has any active
    /// interrupts.
    pub fn irq_pending(&self, hw_irq: bool) -> bool {
        let cause = self.regs[CAUSE].set_bit(10, hw_irq);
        let active = self.regs[SR] & cause & 0xff00;

        self.irq_enabled() && active != 0
    }

    /// Read a register. Returns `None` for registers above 15, which don't exist.
    pub fn read_reg(&self, reg: u32) -> Option<u32> {
        if reg == BAD_VADDR as u32 {
            trace!("bad virtual address register read");
        }
        self.regs.get(reg as usize).copied()
    }

    /// Write to a register through the write mask.
    pub fn write_reg(&mut self, reg: u32, val: u32) {
        let Some(mask) = WRITE_MASK.get(reg as usize) else {
            warn!("write to cop0 register {reg}");
            return;
        };
        let reg = reg as usize;
        self.regs[reg] = (self.regs[reg] & !mask) | (val & mask);
    }

    /// Write to a register without the write mask. Used by debugging and save states.
    pub fn set_reg_unmasked(&mut self, reg: usize, val: u32) {
        self.regs[reg] = val;
    }

    pub fn regs(&self) -> &[u32; 16] {
        &self.regs
    }

    pub fn set_bad_vaddr(&mut self, addr: u32) {
        self.regs[BAD_VADDR] = addr;
    }

    /// Start handling an exception. Interrupts are disabled and the CPU is put in kernel mode by
    /// shifting the mode stack in bits 0..5 of the status register two to the left. The exception
    /// code is stored in CAUSE and the return address in EPC.
    ///
    /// `pc` is the address of the instruction which caused the exception. If it's in a branch
    /// delay slot, EPC instead points to the branch and bit 31 of CAUSE is set.
    ///
    /// # Returns
    ///
    /// The address of the exception handler.
    pub fn set_exception(&mut self, ex: Exception, pc: u32, in_delay: bool) -> u32 {
        let mode = self.regs[SR].bit_range(0, 5);
        self.regs[SR] = self.regs[SR].set_bit_range(0, 5, mode << 2);

        self.regs[CAUSE] = self.regs[CAUSE]
            .set_bit_range(2, 6, ex as u32)
            .set_bit(31, in_delay);

        self.regs[EPC] = if in_delay { pc.wrapping_sub(4) } else { pc };

        if self.bev() {
            0xbfc0_0180
        } else {
            0x8000_0080
        }
    }

    /// Undo the mode stack shift made by [`Self::set_exception`]. Bits 4..5 are left as is.
    pub fn return_from_exception(&mut self) {
        let mode = self.regs[SR].bit_range(0, 5);
        self.regs[SR] = self.regs[SR].set_bit_range(0, 3, mode >> 2);
    }

    pub fn reset(&mut self) {
        self.regs = RESET_VALUES;
    }
}
