use super::ram::RawMem;
use super::{AddrUnit, BusMap};

const SCRATCHPAD_SIZE: usize = 1024;

/// 1 kilobyte of fast memory, which on real hardware is the data cache used as RAM.
pub struct ScratchPad(RawMem<SCRATCHPAD_SIZE>);

impl ScratchPad {
    const SIZE: usize = SCRATCHPAD_SIZE;

    pub fn new() -> Self {
        Self(RawMem::new())
    }

    #[inline]
    pub fn read<T: AddrUnit>(&self, offset: u32) -> T {
        self.0.read(offset)
    }

    #[inline]
    pub fn write<T: AddrUnit>(&mut self, offset: u32, val: T) {
        self.0.write(offset, val)
    }

    pub fn reset(&mut self) {
        self.0.reset();
    }
}

impl BusMap for ScratchPad {
    const BUS_BEGIN: u32 = 0x1f80_0000;
    const BUS_END: u32 = Self::BUS_BEGIN + Self::SIZE as u32 - 1;
}
