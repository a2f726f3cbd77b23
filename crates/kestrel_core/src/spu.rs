//! The register front of the sound processing unit.
//!
//! No voices are synthesized. The registers are stored, sound RAM can be written and read back
//! through the transfer FIFO and DMA, and a silent frame is produced for every sample period so
//! the host audio queue keeps running at the right pace.

use crate::bits::{Bit, BitSet};
use crate::bus::dma::DmaPort;
use crate::bus::{BusMap, Device, IoCtx};
use crate::cpu::{Irq, IrqState};
use crate::schedule::{Event, EventId, Schedule};
use crate::Cycle;

use std::collections::VecDeque;

/// CPU cycles per sample at 44.1 kHz.
pub const CYCLES_PER_SAMPLE: Cycle = 768;

/// The most stereo frames kept for the host. The oldest are dropped first.
const SAMPLE_QUEUE_LIMIT: usize = 0x1_0000;

const SOUND_RAM_SIZE: usize = 512 * 1024;

/// Register indices, in halfwords from the start of the SPU.
const REG_IRQ_ADDR: usize = 0x1a4 / 2;
const REG_TRANSFER_ADDR: usize = 0x1a6 / 2;
const REG_TRANSFER_FIFO: usize = 0x1a8 / 2;
const REG_SPUCNT: usize = 0x1aa / 2;
const REG_SPUSTAT: usize = 0x1ae / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferMode {
    Stop,
    ManualWrite,
    DmaWrite,
    DmaRead,
}

pub struct Spu {
    regs: Box<[u16; 512]>,
    ram: Box<[u8]>,
    /// Current address of the sound RAM transfer in bytes.
    transfer_addr: u32,
    /// Cycles not yet making up a whole sample.
    remainder: Cycle,
    samples: VecDeque<[i16; 2]>,
    event: EventId,
}

impl Spu {
    pub fn new(schedule: &mut Schedule) -> Self {
        Self {
            regs: Box::new([0; 512]),
            ram: vec![0; SOUND_RAM_SIZE].into_boxed_slice(),
            transfer_addr: 0,
            remainder: 0,
            samples: VecDeque::new(),
            event: schedule.create_event("SPU sample", Event::SpuSample),
        }
    }

    /// Take the stereo frames produced since the last call.
    pub fn drain_samples(&mut self) -> impl Iterator<Item = [i16; 2]> + '_ {
        self.samples.drain(..)
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    fn spucnt(&self) -> u16 {
        self.regs[REG_SPUCNT]
    }

    fn transfer_mode(&self) -> TransferMode {
        match self.spucnt().bit_range(4, 5) {
            0 => TransferMode::Stop,
            1 => TransferMode::ManualWrite,
            2 => TransferMode::DmaWrite,
            _ => TransferMode::DmaRead,
        }
    }

    /// Check for the IRQ address being hit by a transfer.
    fn check_irq(&mut self, irq: &mut IrqState, addr: u32) {
        let irq_addr = u32::from(self.regs[REG_IRQ_ADDR]) * 8;
        if self.spucnt().bit(6) && addr & !1 == irq_addr {
            let stat = self.regs[REG_SPUSTAT];
            if !stat.bit(6) {
                self.regs[REG_SPUSTAT] = stat.set_bit(6, true);
                irq.trigger(Irq::Spu);
            }
        }
    }

    fn write_ram(&mut self, irq: &mut IrqState, val: u16) {
        let addr = self.transfer_addr as usize;
        self.ram[addr..addr + 2].copy_from_slice(&val.to_le_bytes());
        self.check_irq(irq, self.transfer_addr);
        self.transfer_addr = (self.transfer_addr + 2) & (SOUND_RAM_SIZE as u32 - 1);
    }

    fn read_ram(&mut self, irq: &mut IrqState) -> u16 {
        let addr = self.transfer_addr as usize;
        let val = u16::from_le_bytes([self.ram[addr], self.ram[addr + 1]]);
        self.check_irq(irq, self.transfer_addr);
        self.transfer_addr = (self.transfer_addr + 2) & (SOUND_RAM_SIZE as u32 - 1);
        val
    }

    /// SPUSTAT mirrors the low bits of SPUCNT and reports the transfer state.
    fn update_stat(&mut self) {
        let cnt = self.spucnt();
        let mode = self.transfer_mode();
        let stat = self.regs[REG_SPUSTAT]
            .set_bit_range(0, 5, cnt.bit_range(0, 5))
            .set_bit(7, matches!(mode, TransferMode::DmaWrite | TransferMode::DmaRead))
            .set_bit(8, mode == TransferMode::DmaWrite)
            .set_bit(9, mode == TransferMode::DmaRead);
        self.regs[REG_SPUSTAT] = if cnt.bit(6) { stat } else { stat.set_bit(6, false) };
    }

    /// Deliver `cycles` to the sample clock.
    pub fn run(&mut self, ctx: &mut IoCtx, cycles: Cycle) {
        self.remainder += cycles;

        let frames = self.remainder / CYCLES_PER_SAMPLE;
        self.remainder %= CYCLES_PER_SAMPLE;

        for _ in 0..frames {
            if self.samples.len() >= SAMPLE_QUEUE_LIMIT {
                self.samples.pop_front();
            }
            self.samples.push_back([0, 0]);
        }

        if !ctx.schedule.is_active(self.event) {
            ctx.schedule.schedule(self.event, CYCLES_PER_SAMPLE - self.remainder);
        }
    }
}

impl Device for Spu {
    type Unit = u16;

    fn reset(&mut self, schedule: &mut Schedule) {
        self.regs.fill(0);
        self.ram.fill(0);
        self.transfer_addr = 0;
        self.remainder = 0;
        self.samples.clear();
        schedule.schedule(self.event, CYCLES_PER_SAMPLE);
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u16 {
        match (offset >> 1) as usize {
            REG_TRANSFER_FIFO => {
                warn!("SPU transfer FIFO read");
                0xffff
            }
            reg => self.regs[reg],
        }
    }

    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: u16) {
        let reg = (offset >> 1) as usize;
        match reg {
            REG_TRANSFER_ADDR => {
                self.regs[reg] = val;
                self.transfer_addr = u32::from(val) * 8;
            }
            REG_TRANSFER_FIFO => self.write_ram(ctx.irq, val),
            REG_SPUCNT => {
                self.regs[reg] = val;
                self.update_stat();
            }
            REG_SPUSTAT => trace!("SPUSTAT is read only"),
            _ => self.regs[reg] = val,
        }
    }
}

impl DmaPort for Spu {
    fn dma_write(&mut self, ctx: &mut IoCtx, val: u32) {
        if self.transfer_mode() != TransferMode::DmaWrite {
            trace!("SPU DMA write in transfer mode {:?}", self.transfer_mode());
        }
        self.write_ram(ctx.irq, val as u16);
        self.write_ram(ctx.irq, (val >> 16) as u16);
    }

    fn dma_read(&mut self, ctx: &mut IoCtx) -> Option<u32> {
        let lo = self.read_ram(ctx.irq);
        let hi = self.read_ram(ctx.irq);
        Some(u32::from(lo) | u32::from(hi) << 16)
    }
}

impl BusMap for Spu {
    const BUS_BEGIN: u32 = 0x1f80_1c00;
    const BUS_END: u32 = Self::BUS_BEGIN + 0x400 - 1;
}
