//! The DMA controller, used to move words between RAM and devices without the CPU.
//!
//! Transfers run to completion as soon as a channel is started, and the CPU is stalled one
//! cycle per word transferred.

use crate::bits::{Bit, BitSet};
use crate::cpu::{Irq, IrqState};
use crate::schedule::Schedule;
use crate::Cycle;

use super::ram::Ram;
use super::{Bus, BusMap, Device, IoCtx, Peripherals};

use std::ops::{Index, IndexMut};

/// A device which can be the other end of a DMA transfer.
pub trait DmaPort {
    /// Receive a word from RAM.
    fn dma_write(&mut self, ctx: &mut IoCtx, val: u32);

    /// Send a word to RAM. `None` if the device can't do that.
    fn dma_read(&mut self, ctx: &mut IoCtx) -> Option<u32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    MdecIn = 0,
    MdecOut = 1,
    Gpu = 2,
    CdRom = 3,
    Spu = 4,
    Pio = 5,
    /// Ordering table clear. Writes an empty linked list of GPU commands to RAM.
    Otc = 6,
}

const PORTS: [Port; 7] = [
    Port::MdecIn,
    Port::MdecOut,
    Port::Gpu,
    Port::CdRom,
    Port::Spu,
    Port::Pio,
    Port::Otc,
];

/// Marks the end of a linked list.
const LINKED_LIST_END: u32 = 0x00ff_ffff;

/// Guard against linked lists which loop forever.
const MAX_LINKED_NODES: u32 = 0x10_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToRam,
    ToPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Transfer a single block right away.
    Manual,
    /// Transfer a number of blocks.
    Request,
    /// Follow a linked list of packets in RAM. Only used to send commands to the GPU.
    LinkedList,
}

/// Block size and count for manual and request transfers.
#[derive(Default, Clone, Copy)]
struct BlockCtrl {
    size: u16,
    count: u16,
}

impl BlockCtrl {
    fn from_u32(val: u32) -> Self {
        Self {
            size: val.bit_range(0, 15) as u16,
            count: val.bit_range(16, 31) as u16,
        }
    }

    fn as_u32(self) -> u32 {
        u32::from(self.size) | u32::from(self.count) << 16
    }

    /// The amount of words in a block. A size of zero means the max size.
    fn block_words(self) -> u32 {
        match self.size {
            0 => 0x1_0000,
            size => size.into(),
        }
    }
}

#[derive(Default, Clone, Copy)]
struct ChanCtrl(u32);

impl ChanCtrl {
    fn direction(self) -> Direction {
        if self.0.bit(0) {
            Direction::ToPort
        } else {
            Direction::ToRam
        }
    }

    /// The amount added to the address each word.
    fn step(self) -> u32 {
        if self.0.bit(1) {
            (-4_i32) as u32
        } else {
            4
        }
    }

    fn chopping(self) -> bool {
        self.0.bit(8)
    }

    fn sync_mode(self) -> Option<SyncMode> {
        match self.0.bit_range(9, 10) {
            0 => Some(SyncMode::Manual),
            1 => Some(SyncMode::Request),
            2 => Some(SyncMode::LinkedList),
            _ => None,
        }
    }

    fn enabled(self) -> bool {
        self.0.bit(24)
    }

    /// Manual transfers must also have this set to start.
    fn start(self) -> bool {
        self.0.bit(28)
    }

    fn finish(&mut self) {
        self.0 = self.0.set_bit(24, false).set_bit(28, false);
    }
}

#[derive(Clone, Copy)]
pub struct Channel {
    port: Port,
    base: u32,
    block: BlockCtrl,
    ctrl: ChanCtrl,
}

impl Channel {
    fn new(port: Port) -> Self {
        Self {
            port,
            base: 0,
            block: BlockCtrl::default(),
            ctrl: ChanCtrl::default(),
        }
    }

    fn read(&self, reg: u32) -> u32 {
        match reg {
            0 => self.base,
            4 => self.block.as_u32(),
            8 => self.ctrl.0,
            _ => {
                warn!("DMA {:?} read at register {reg}", self.port);
                0
            }
        }
    }

    fn write(&mut self, reg: u32, val: u32) {
        match reg {
            0 => self.base = val.bit_range(0, 23),
            4 => self.block = BlockCtrl::from_u32(val),
            8 => {
                // The ordering table is always cleared backwards.
                self.ctrl = if self.port == Port::Otc {
                    ChanCtrl(val & 0x5100_0000 | 2)
                } else {
                    ChanCtrl(val)
                };
                if self.ctrl.chopping() {
                    trace!("chopping enabled for DMA {:?}, transfer runs all at once", self.port);
                }
            }
            _ => warn!("DMA {:?} write at register {reg}", self.port),
        }
    }

    /// If the channel should start transferring.
    fn ready(&self) -> bool {
        self.ctrl.enabled() && (self.ctrl.start() || self.ctrl.sync_mode() != Some(SyncMode::Manual))
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn ctrl(&self) -> u32 {
        self.ctrl.0
    }

    pub fn block_ctrl(&self) -> u32 {
        self.block.as_u32()
    }
}

/// The DMA interrupt register.
#[derive(Default, Clone, Copy)]
struct IrqReg(u32);

impl IrqReg {
    /// Always set the master flag.
    fn force(self) -> bool {
        self.0.bit(15)
    }

    fn channel_enabled(self, port: Port) -> bool {
        self.0.bit(16 + port as usize)
    }

    fn master_enabled(self) -> bool {
        self.0.bit(23)
    }

    fn master_flag(self) -> bool {
        self.0.bit(31)
    }

    /// Update the master flag and trigger an interrupt when it goes from low to high.
    fn update_master_flag(&mut self, irq: &mut IrqState) {
        let flag = self.force() || self.master_enabled() && self.0.bit_range(24, 30) != 0;

        if flag && !self.master_flag() {
            irq.trigger(Irq::Dma);
        }

        self.0 = self.0.set_bit(31, flag);
    }

    fn write(&mut self, irq: &mut IrqState, val: u32) {
        const MASK: u32 = 0x00ff_803f;

        // Writing a one to a channel flag acknowledges it.
        self.0 = (self.0 & !MASK) | (val & MASK);
        self.0 &= !(val & 0x7f00_0000);

        self.update_master_flag(irq);
    }
}

pub struct Dma {
    /// Channel priorities and enable bits. Stored but not used, since transfers never overlap.
    ctrl: u32,
    irq: IrqReg,
    channels: [Channel; 7],
    /// A channel started by the last write.
    request: Option<Port>,
}

impl Dma {
    pub fn new() -> Self {
        Self {
            ctrl: 0x0765_4321,
            irq: IrqReg::default(),
            channels: PORTS.map(Channel::new),
            request: None,
        }
    }

    /// Take the channel started by the last register write.
    pub fn take_request(&mut self) -> Option<Port> {
        self.request.take()
    }

    pub fn channel(&self, port: Port) -> &Channel {
        &self[port]
    }

    pub fn irq_reg(&self) -> u32 {
        self.irq.0
    }

    fn channel_done(&mut self, port: Port, irq: &mut IrqState) {
        self[port].ctrl.finish();

        if self.irq.channel_enabled(port) {
            self.irq.0 = self.irq.0.set_bit(24 + port as usize, true);
        }

        self.irq.update_master_flag(irq);
    }
}

impl Device for Dma {
    type Unit = u32;

    fn reset(&mut self, _: &mut Schedule) {
        *self = Self::new();
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u32 {
        let (chan, reg) = (offset.bit_range(4, 6), offset.bit_range(0, 3));
        match (chan, reg) {
            (0..=6, _) => self.channels[chan as usize].read(reg),
            (7, 0) => self.ctrl,
            (7, 4) => self.irq.0,
            _ => {
                warn!("DMA read at offset {offset:x}");
                0
            }
        }
    }

    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: u32) {
        let (chan, reg) = (offset.bit_range(4, 6), offset.bit_range(0, 3));
        match (chan, reg) {
            (0..=6, _) => {
                let chan = &mut self.channels[chan as usize];
                chan.write(reg, val);
                if reg == 8 && chan.ready() {
                    self.request = Some(chan.port);
                }
            }
            (7, 0) => self.ctrl = val,
            (7, 4) => self.irq.write(ctx.irq, val),
            _ => warn!("DMA write at offset {offset:x}"),
        }
    }
}

impl Index<Port> for Dma {
    type Output = Channel;

    fn index(&self, port: Port) -> &Self::Output {
        &self.channels[port as usize]
    }
}

impl IndexMut<Port> for Dma {
    fn index_mut(&mut self, port: Port) -> &mut Self::Output {
        &mut self.channels[port as usize]
    }
}

impl BusMap for Dma {
    const BUS_BEGIN: u32 = 0x1f80_1080;
    const BUS_END: u32 = Self::BUS_BEGIN + 0x80 - 1;
}

/// Stand in for the devices not emulated.
struct NullPort(Port);

impl DmaPort for NullPort {
    fn dma_write(&mut self, _: &mut IoCtx, _: u32) {
        trace!("DMA {:?} word dropped", self.0);
    }

    fn dma_read(&mut self, _: &mut IoCtx) -> Option<u32> {
        None
    }
}

impl Bus {
    /// Run a transfer on `port` to completion.
    pub(super) fn run_dma(&mut self, port: Port) {
        let Peripherals { irq, gpu, cdrom, spu, .. } = &mut self.io;
        let mut null = NullPort(port);

        let dev: &mut dyn DmaPort = match port {
            Port::Gpu => gpu,
            Port::CdRom => cdrom,
            Port::Spu => spu,
            _ => &mut null,
        };

        let mut ctx = IoCtx { schedule: &mut self.schedule, irq };
        let chan = &mut self.dma[port];

        let words = match chan.ctrl.sync_mode() {
            Some(SyncMode::Manual | SyncMode::Request) => {
                block_transfer(&mut self.ram, dev, &mut ctx, chan)
            }
            Some(SyncMode::LinkedList) => {
                linked_list_transfer(&mut self.ram, dev, &mut ctx, chan)
            }
            None => {
                warn!("DMA {port:?} started with reserved sync mode");
                0
            }
        };

        trace!("DMA {port:?} transferred {words} words");

        self.stall += Cycle::from(words);
        self.dma.channel_done(port, ctx.irq);
    }
}

/// Run a manual or request transfer. Returns the amount of words transferred.
fn block_transfer(ram: &mut Ram, dev: &mut dyn DmaPort, ctx: &mut IoCtx, chan: &mut Channel) -> u32 {
    let sync_mode = chan.ctrl.sync_mode();

    let words = if sync_mode == Some(SyncMode::Request) {
        u32::from(chan.block.size) * u32::from(chan.block.count)
    } else {
        chan.block.block_words()
    };

    let step = chan.ctrl.step();
    let mut addr = chan.base;

    match chan.ctrl.direction() {
        Direction::ToPort => {
            for _ in 0..words {
                dev.dma_write(ctx, ram.read(addr & 0x1f_fffc));
                addr = addr.wrapping_add(step) & 0xff_ffff;
            }
        }
        Direction::ToRam if chan.port == Port::Otc => {
            // Each entry points to the one before it, and the last one ends the list.
            for word in 0..words {
                let val = if word == words - 1 {
                    LINKED_LIST_END
                } else {
                    addr.wrapping_sub(4) & 0x1f_ffff
                };
                ram.write(addr & 0x1f_fffc, val);
                addr = addr.wrapping_add(step) & 0xff_ffff;
            }
        }
        Direction::ToRam => {
            let mut unsupported = false;
            for _ in 0..words {
                let val = dev.dma_read(ctx).unwrap_or_else(|| {
                    unsupported = true;
                    0
                });
                ram.write(addr & 0x1f_fffc, val);
                addr = addr.wrapping_add(step) & 0xff_ffff;
            }
            if unsupported {
                warn!("DMA {:?} can't transfer to RAM, filled {words} words with zero", chan.port);
            }
        }
    }

    if sync_mode == Some(SyncMode::Request) {
        chan.base = addr;
        chan.block.count = 0;
    }

    words
}

/// Send every packet of a linked list to the device. Returns the amount of words read from RAM,
/// including headers.
fn linked_list_transfer(
    ram: &mut Ram,
    dev: &mut dyn DmaPort,
    ctx: &mut IoCtx,
    chan: &mut Channel,
) -> u32 {
    if chan.ctrl.direction() == Direction::ToRam {
        warn!("DMA {:?} linked list transfer to RAM isn't supported", chan.port);
        return 0;
    }

    let mut addr = chan.base & 0x1f_fffc;
    let mut words = 0;

    for _ in 0..MAX_LINKED_NODES {
        let header: u32 = ram.read(addr);
        let size = header.bit_range(24, 31);

        for i in 1..=size {
            dev.dma_write(ctx, ram.read((addr + i * 4) & 0x1f_fffc));
        }

        words += size + 1;

        let next = header.bit_range(0, 23);
        chan.base = next;

        if next == LINKED_LIST_END {
            return words;
        }

        addr = next & 0x1f_fffc;
    }

    warn!("DMA {:?} linked list didn't end after {MAX_LINKED_NODES} packets", chan.port);

    words
}
