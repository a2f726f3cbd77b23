//! The memory map of the Playstation.
//!
//! Virtual addresses are first collapsed onto physical addresses by masking away the region bits,
//! which makes the cached (KSEG0) and uncached (KSEG1) mirrors of KUSEG point to the same memory.
//! The physical address is then looked up in a static table of segments.

pub mod bios;
pub mod dma;
pub mod mem_ctrl;
pub mod ram;
pub mod scratchpad;

mod device;

use crate::cpu::IrqState;
use crate::schedule::Schedule;
use crate::timer::Timers;
use crate::gpu::Gpu;
use crate::cdrom::CdRom;
use crate::spu::Spu;
use crate::io_port::IoPort;
use crate::Cycle;

use bios::Bios;
use dma::Dma;
use mem_ctrl::{MemCtrl, RamSize, CacheCtrl};
use ram::Ram;
use scratchpad::ScratchPad;

pub use device::{Device, IoCtx, Peripherals, compose_read, compose_write};

use std::fmt;

/// A unit of memory which can be loaded from and stored to the bus.
pub trait AddrUnit: Copy + Default + fmt::LowerHex + 'static {
    /// Width in bytes.
    const WIDTH: u32;

    /// Truncate `val` to the width of the unit.
    fn from_u32(val: u32) -> Self;

    fn as_u32(self) -> u32;

    #[inline]
    fn is_aligned(addr: u32) -> bool {
        addr % Self::WIDTH == 0
    }
}

impl AddrUnit for u8 {
    const WIDTH: u32 = 1;

    #[inline]
    fn from_u32(val: u32) -> Self {
        val as u8
    }

    #[inline]
    fn as_u32(self) -> u32 {
        self.into()
    }
}

impl AddrUnit for u16 {
    const WIDTH: u32 = 2;

    #[inline]
    fn from_u32(val: u32) -> Self {
        val as u16
    }

    #[inline]
    fn as_u32(self) -> u32 {
        self.into()
    }
}

impl AddrUnit for u32 {
    const WIDTH: u32 = 4;

    #[inline]
    fn from_u32(val: u32) -> Self {
        val
    }

    #[inline]
    fn as_u32(self) -> u32 {
        self
    }
}

/// Something with a fixed range in the physical address space.
pub trait BusMap {
    /// The first address in the range.
    const BUS_BEGIN: u32;
    /// The last address included in the range.
    const BUS_END: u32;

    fn contains(addr: u32) -> bool {
        (Self::BUS_BEGIN..=Self::BUS_END).contains(&addr)
    }

    /// The offset into the range if `addr` is contained in it.
    fn offset(addr: u32) -> Option<u32> {
        Self::contains(addr).then(|| addr - Self::BUS_BEGIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Ram,
    Exp1,
    ScratchPad,
    MemCtrl,
    IoPort,
    RamSize,
    Irq,
    Dma,
    Timers,
    CdRom,
    Gpu,
    Spu,
    Exp2,
    Exp3,
    Bios,
    CacheCtrl,
    Invalid,
}

/// A range of physical addresses owned by a single memory or device.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub start: u32,
    pub length: u32,
    pub kind: SegmentKind,
}

impl Segment {
    const fn new(start: u32, length: u32, kind: SegmentKind) -> Self {
        Self { start, length, kind }
    }

    const fn of<T: BusMap>(kind: SegmentKind) -> Self {
        Self::new(T::BUS_BEGIN, T::BUS_END - T::BUS_BEGIN + 1, kind)
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr.wrapping_sub(self.start) < self.length
    }
}

const EXP1_BEGIN: u32 = 0x1f00_0000;
const EXP2_BEGIN: u32 = 0x1f80_2000;
const EXP3_BEGIN: u32 = 0x1fa0_0000;

/// The physical memory map. No segments overlap.
pub const SEGMENTS: [Segment; 16] = [
    Segment::of::<Ram>(SegmentKind::Ram),
    Segment::new(EXP1_BEGIN, 8 * 1024 * 1024, SegmentKind::Exp1),
    Segment::of::<ScratchPad>(SegmentKind::ScratchPad),
    Segment::of::<MemCtrl>(SegmentKind::MemCtrl),
    Segment::of::<IoPort>(SegmentKind::IoPort),
    Segment::of::<RamSize>(SegmentKind::RamSize),
    Segment::of::<IrqState>(SegmentKind::Irq),
    Segment::of::<Dma>(SegmentKind::Dma),
    Segment::of::<Timers>(SegmentKind::Timers),
    Segment::of::<CdRom>(SegmentKind::CdRom),
    Segment::of::<Gpu>(SegmentKind::Gpu),
    Segment::of::<Spu>(SegmentKind::Spu),
    Segment::new(EXP2_BEGIN, 8 * 1024, SegmentKind::Exp2),
    Segment::new(EXP3_BEGIN, 2 * 1024 * 1024, SegmentKind::Exp3),
    Segment::of::<Bios>(SegmentKind::Bios),
    Segment::of::<CacheCtrl>(SegmentKind::CacheCtrl),
];

/// Mask away the region bits of a virtual address. KSEG2 isn't masked since only the cache control
/// register lives there.
#[inline]
pub fn regioned_addr(addr: u32) -> u32 {
    const REGION_MAP: [u32; 8] = [
        0xffff_ffff, 0xffff_ffff, 0xffff_ffff, 0xffff_ffff, 0x7fff_ffff, 0x1fff_ffff, 0xffff_ffff,
        0xffff_ffff,
    ];
    addr & REGION_MAP[(addr >> 29) as usize]
}

/// Translate a virtual address to the segment it's in and the offset into that segment.
/// Addresses which aren't mapped give [`SegmentKind::Invalid`] and the physical address.
pub fn translate_address(addr: u32) -> (SegmentKind, u32) {
    let addr = regioned_addr(addr);
    SEGMENTS
        .iter()
        .find(|seg| seg.contains(addr))
        .map(|seg| (seg.kind, addr - seg.start))
        .unwrap_or((SegmentKind::Invalid, addr))
}

pub struct Bus {
    pub schedule: Schedule,
    pub io: Peripherals,
    mem_ctrl: MemCtrl,
    ram_size: RamSize,
    pub cache_ctrl: CacheCtrl,
    dma: Dma,
    ram: Ram,
    scratchpad: ScratchPad,
    bios: Bios,
    /// Cycles the CPU has been stalled by DMA transfers.
    stall: Cycle,
}

impl Bus {
    pub fn new(bios: Bios) -> Self {
        let mut schedule = Schedule::new();
        let io = Peripherals::new(&mut schedule);
        let mut bus = Self {
            schedule,
            io,
            bios,
            mem_ctrl: MemCtrl::default(),
            ram_size: RamSize::default(),
            cache_ctrl: CacheCtrl::default(),
            dma: Dma::new(),
            ram: Ram::new(),
            scratchpad: ScratchPad::new(),
            stall: 0,
        };
        bus.reset();
        bus
    }

    /// Reset the scheduler, fill memory with the power on pattern and reset every device. The
    /// devices are reset in the order memory control, DMA, timers, CDROM, GPU and then the rest.
    pub fn reset(&mut self) {
        self.schedule.reset();
        self.ram.reset();
        self.scratchpad.reset();
        self.ram_size = RamSize::default();
        self.cache_ctrl = CacheCtrl::default();
        self.stall = 0;

        self.mem_ctrl.reset(&mut self.schedule);
        self.dma.reset(&mut self.schedule);
        self.io.reset(&mut self.schedule);
    }

    /// Load a value. Returns `None` if the address isn't mapped. `addr` must be aligned to `T`.
    pub fn read<T: AddrUnit>(&mut self, addr: u32) -> Option<T> {
        debug_assert!(T::is_aligned(addr));

        let (kind, offset) = translate_address(addr);
        let mut ctx = IoCtx { schedule: &mut self.schedule, irq: &mut self.io.irq };

        let val = match kind {
            SegmentKind::Ram => self.ram.read(offset),
            SegmentKind::ScratchPad => self.scratchpad.read(offset),
            SegmentKind::Bios => self.bios.read(offset),
            SegmentKind::Exp1 | SegmentKind::Exp2 | SegmentKind::Exp3 => T::from_u32(0xffff_ffff),
            SegmentKind::MemCtrl => {
                compose_read(offset, |off| self.mem_ctrl.read(&mut ctx, off))
            }
            SegmentKind::RamSize => compose_read(offset, |_| self.ram_size.0),
            SegmentKind::CacheCtrl => compose_read(offset, |_| self.cache_ctrl.0),
            SegmentKind::Irq => compose_read(offset, |off| self.io.irq.read(off)),
            SegmentKind::Dma => {
                compose_read(offset, |off| self.dma.read(&mut ctx, off))
            }
            SegmentKind::Timers
            | SegmentKind::CdRom
            | SegmentKind::Gpu
            | SegmentKind::Spu
            | SegmentKind::IoPort => self.io.read(&mut self.schedule, kind, offset),
            SegmentKind::Invalid => {
                warn!("load from unmapped address {addr:08x}");
                return None;
            }
        };

        Some(val)
    }

    /// Store a value. Returns `None` if the address isn't mapped. `addr` must be aligned to `T`.
    pub fn write<T: AddrUnit>(&mut self, addr: u32, val: T) -> Option<()> {
        debug_assert!(T::is_aligned(addr));

        let (kind, offset) = translate_address(addr);
        let mut ctx = IoCtx { schedule: &mut self.schedule, irq: &mut self.io.irq };

        match kind {
            SegmentKind::Ram => self.ram.write(offset, val),
            SegmentKind::ScratchPad => self.scratchpad.write(offset, val),
            SegmentKind::Bios => {
                warn!("store to BIOS at {addr:08x}");
            }
            SegmentKind::Exp1 | SegmentKind::Exp3 => {}
            SegmentKind::Exp2 => {
                // The BIOS writes boot progress to the POST register.
                if offset == 0x41 {
                    trace!("POST {:x}", val);
                }
            }
            SegmentKind::MemCtrl => {
                compose_write(offset, val, |off, v| self.mem_ctrl.write(&mut ctx, off, v));
            }
            SegmentKind::RamSize => compose_write(offset, val, |_, v| self.ram_size.0 = v),
            SegmentKind::CacheCtrl => compose_write(offset, val, |_, v| self.cache_ctrl.0 = v),
            SegmentKind::Irq => compose_write(offset, val, |off, v| self.io.irq.write(off, v)),
            SegmentKind::Dma => {
                compose_write(offset, val, |off, v| self.dma.write(&mut ctx, off, v));
                if let Some(port) = self.dma.take_request() {
                    self.run_dma(port);
                }
            }
            SegmentKind::Timers
            | SegmentKind::CdRom
            | SegmentKind::Gpu
            | SegmentKind::Spu
            | SegmentKind::IoPort => self.io.write(&mut self.schedule, kind, offset, val),
            SegmentKind::Invalid => {
                warn!("store to unmapped address {addr:08x}");
                return None;
            }
        }

        Some(())
    }

    /// Load from memory without side effects. Only RAM, scratchpad and BIOS can be peeked.
    pub fn peek<T: AddrUnit>(&self, addr: u32) -> Option<T> {
        if !T::is_aligned(addr) {
            return None;
        }
        match translate_address(addr) {
            (SegmentKind::Ram, offset) => Some(self.ram.read(offset)),
            (SegmentKind::ScratchPad, offset) => Some(self.scratchpad.read(offset)),
            (SegmentKind::Bios, offset) => Some(self.bios.read(offset)),
            _ => None,
        }
    }

    /// Copy `data` into RAM at `addr`. The address is wrapped around the RAM mirror.
    pub fn copy_to_ram(&mut self, addr: u32, data: &[u8]) {
        let base = regioned_addr(addr);
        for (i, byte) in data.iter().enumerate() {
            self.ram.write::<u8>(base.wrapping_add(i as u32), *byte);
        }
    }

    /// Run the events due after `cycles` more cycles.
    pub fn add_cycles(&mut self, cycles: Cycle) {
        self.schedule.add_cycles(cycles, &mut self.io);
    }

    /// Take the cycles the CPU has been stalled by DMA since the last call.
    pub fn take_stall(&mut self) -> Cycle {
        std::mem::take(&mut self.stall)
    }

    /// If the interrupt controller has any enabled interrupt active.
    pub fn irq_active(&self) -> bool {
        self.io.irq.active()
    }

    pub fn bios(&self) -> &Bios {
        &self.bios
    }

    pub fn dma(&self) -> &Dma {
        &self.dma
    }
}
