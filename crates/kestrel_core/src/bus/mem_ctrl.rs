//! Memory control registers. They configure delays and sizes of the expansion regions, which
//! only matter for real hardware, so they are just stored.

use crate::schedule::Schedule;

use super::{BusMap, Device, IoCtx};

const EXP1_BASE: u32 = 0x1f00_0000;
const EXP2_BASE: u32 = 0x1f80_2000;

#[derive(Default)]
pub struct MemCtrl {
    regs: [u32; 9],
}

impl Device for MemCtrl {
    type Unit = u32;

    fn reset(&mut self, _: &mut Schedule) {
        self.regs = [0x0; 9];
        self.regs[0] = EXP1_BASE;
        self.regs[1] = EXP2_BASE;
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u32 {
        self.regs[(offset >> 2) as usize]
    }

    fn write(&mut self, _: &mut IoCtx, offset: u32, val: u32) {
        match offset {
            0 if val != EXP1_BASE => {
                warn!("expansion 1 base address moved to {val:08x}, which isn't supported");
            }
            4 if val != EXP2_BASE => {
                warn!("expansion 2 base address moved to {val:08x}, which isn't supported");
            }
            _ => (),
        }
        self.regs[(offset >> 2) as usize] = val;
    }
}

impl BusMap for MemCtrl {
    const BUS_BEGIN: u32 = 0x1f80_1000;
    const BUS_END: u32 = Self::BUS_BEGIN + 36 - 1;
}

/// Configures the size of RAM. Stored but otherwise ignored.
#[derive(Default)]
pub struct RamSize(pub u32);

impl BusMap for RamSize {
    const BUS_BEGIN: u32 = 0x1f80_1060;
    const BUS_END: u32 = Self::BUS_BEGIN + 4 - 1;
}

/// The cache control register in KSEG2.
#[derive(Default)]
pub struct CacheCtrl(pub u32);

impl BusMap for CacheCtrl {
    const BUS_BEGIN: u32 = 0xfffe_0130;
    const BUS_END: u32 = Self::BUS_BEGIN + 4 - 1;
}
