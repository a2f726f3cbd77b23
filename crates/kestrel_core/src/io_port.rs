//! The controller and memory card serial port, and the unused SIO port next to it.
//!
//! Nothing is ever connected. A byte sent still takes the time given by the baud rate to transfer,
//! and the byte received is always 0xff with no acknowledge, which is what the BIOS sees when the
//! slots are empty.

use crate::bits::{Bit, BitSet};
use crate::bus::{BusMap, Device, IoCtx};
use crate::schedule::{Event, EventId, Schedule};
use crate::Cycle;

/// Offsets of the registers.
const JOY_DATA: u32 = 0x0;
const JOY_STAT: u32 = 0x4;
const JOY_MODE: u32 = 0x8;
const JOY_CTRL: u32 = 0xa;
const JOY_BAUD: u32 = 0xe;

pub struct IoPort {
    mode: u16,
    ctrl: u16,
    baud: u16,
    /// The byte last received, if it hasn't been read.
    rx: Option<u8>,
    tx_busy: bool,
    /// Set when the device acknowledged and IRQs are enabled. Cleared by writing bit 4 of
    /// JOY_CTRL.
    irq: bool,
    /// The SIO registers.
    sio: [u16; 8],
    event: EventId,
}

impl IoPort {
    pub fn new(schedule: &mut Schedule) -> Self {
        Self {
            mode: 0,
            ctrl: 0,
            baud: 0,
            rx: None,
            tx_busy: false,
            irq: false,
            sio: [0; 8],
            event: schedule.create_event("IO port transfer", Event::IoPortTransfer),
        }
    }

    fn tx_enabled(&self) -> bool {
        self.ctrl.bit(0)
    }

    fn transfer_time(&self) -> Cycle {
        Cycle::from(self.baud.max(1)) * 8
    }

    fn stat(&self) -> u16 {
        0u16
            .set_bit(0, !self.tx_busy)
            .set_bit(1, self.rx.is_some())
            .set_bit(2, !self.tx_busy)
            .set_bit(9, self.irq)
    }

    fn send(&mut self, schedule: &mut Schedule, val: u8) {
        if !self.tx_enabled() {
            trace!("IO port byte {val:02x} written with TX disabled");
            return;
        }
        if self.tx_busy {
            warn!("IO port byte {val:02x} written during transfer");
        }
        trace!("IO port sending {val:02x}");
        self.tx_busy = true;
        schedule.schedule(self.event, self.transfer_time());
    }

    /// Called when the transfer event is due.
    pub fn transfer_done(&mut self, ctx: &mut IoCtx) {
        if ctx.schedule.is_active(self.event) {
            return;
        }
        self.tx_busy = false;
        // Nothing answers, so the line stays high and there's no acknowledge.
        self.rx = Some(0xff);
    }
}

impl Device for IoPort {
    type Unit = u16;

    fn reset(&mut self, schedule: &mut Schedule) {
        self.mode = 0;
        self.ctrl = 0;
        self.baud = 0;
        self.rx = None;
        self.tx_busy = false;
        self.irq = false;
        self.sio = [0; 8];
        schedule.cancel(self.event);
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u16 {
        match offset {
            JOY_DATA => self.rx.take().map_or(0xff, u16::from),
            JOY_STAT => self.stat(),
            // The upper half of JOY_STAT is the baud timer, which isn't emulated.
            0x6 => 0,
            JOY_MODE => self.mode,
            JOY_CTRL => self.ctrl,
            JOY_BAUD => self.baud,
            0x10..=0x1f => self.sio[((offset - 0x10) >> 1) as usize],
            _ => {
                warn!("IO port read at offset {offset:x}");
                0xffff
            }
        }
    }

    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: u16) {
        match offset {
            JOY_DATA => self.send(ctx.schedule, val as u8),
            JOY_MODE => self.mode = val,
            JOY_CTRL => {
                if val.bit(6) {
                    self.reset(ctx.schedule);
                    return;
                }
                if val.bit(4) {
                    self.irq = false;
                }
                self.ctrl = val & !0x50;
            }
            JOY_BAUD => self.baud = val,
            0x10..=0x1f => {
                trace!("SIO register {offset:x} write");
                self.sio[((offset - 0x10) >> 1) as usize] = val;
            }
            _ => warn!("IO port write at offset {offset:x}"),
        }
    }

    /// JOY_STAT shows if the transfer is done.
    fn live_event(&self, offset: u32) -> Option<EventId> {
        (offset == JOY_STAT).then_some(self.event)
    }
}

impl BusMap for IoPort {
    const BUS_BEGIN: u32 = 0x1f80_1040;
    const BUS_END: u32 = Self::BUS_BEGIN + 0x20 - 1;
}
