//! Memory mapped devices and the plumbing between them, the bus and the scheduler.

use crate::cdrom::CdRom;
use crate::cpu::IrqState;
use crate::gpu::Gpu;
use crate::io_port::IoPort;
use crate::schedule::{Event, EventHandler, EventId, Schedule};
use crate::spu::Spu;
use crate::timer::Timers;
use crate::Cycle;

use super::{AddrUnit, SegmentKind};

/// What a device gets access to when accessed or updated.
pub struct IoCtx<'a> {
    pub schedule: &'a mut Schedule,
    pub irq: &'a mut IrqState,
}

/// A memory mapped device with registers of a single native width.
///
/// The bus calls [`Device::live_event`] before every access, and if it returns an event, that
/// event is brought up to date first. This way the device can lazily advance its state, only
/// catching up when it's observed.
pub trait Device {
    /// Width of the registers.
    type Unit: AddrUnit;

    fn reset(&mut self, schedule: &mut Schedule);

    /// Read the register at `offset`, which is aligned to [`Device::Unit`].
    fn read(&mut self, ctx: &mut IoCtx, offset: u32) -> Self::Unit;

    /// Write the register at `offset`, which is aligned to [`Device::Unit`].
    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: Self::Unit);

    /// The event which must be updated before the register at `offset` is accessed.
    fn live_event(&self, _offset: u32) -> Option<EventId> {
        None
    }
}

/// Compose a load of `T` from a device with registers of type `U`. A narrower load reads the
/// whole register it's in and shifts out the part requested. A wider load reads the consecutive
/// registers and joins them.
#[inline]
pub fn compose_read<T, U>(offset: u32, mut read: impl FnMut(u32) -> U) -> T
where
    T: AddrUnit,
    U: AddrUnit,
{
    if T::WIDTH <= U::WIDTH {
        let aligned = offset & !(U::WIDTH - 1);
        let shift = (offset - aligned) * 8;
        T::from_u32(read(aligned).as_u32() >> shift)
    } else {
        let val = (0..T::WIDTH).step_by(U::WIDTH as usize).fold(0, |val, byte| {
            val | read(offset + byte).as_u32() << (byte * 8)
        });
        T::from_u32(val)
    }
}

/// Compose a store of `T` to a device with registers of type `U`. A narrower store is shifted
/// into place and written to the whole register. A wider store is split over consecutive
/// registers.
#[inline]
pub fn compose_write<T, U>(offset: u32, val: T, mut write: impl FnMut(u32, U))
where
    T: AddrUnit,
    U: AddrUnit,
{
    if T::WIDTH <= U::WIDTH {
        let aligned = offset & !(U::WIDTH - 1);
        let shift = (offset - aligned) * 8;
        write(aligned, U::from_u32(val.as_u32() << shift));
    } else {
        for byte in (0..T::WIDTH).step_by(U::WIDTH as usize) {
            write(offset + byte, U::from_u32(val.as_u32() >> (byte * 8)));
        }
    }
}

fn read_device<T: AddrUnit, D: Device>(dev: &mut D, ctx: &mut IoCtx, offset: u32) -> T {
    compose_read(offset, |off| dev.read(ctx, off))
}

fn write_device<T: AddrUnit, D: Device>(dev: &mut D, ctx: &mut IoCtx, offset: u32, val: T) {
    compose_write(offset, val, |off, v| dev.write(ctx, off, v));
}

/// The devices with time dependent behavior, together with the interrupt controller they
/// signal.
pub struct Peripherals {
    pub irq: IrqState,
    pub timers: Timers,
    pub cdrom: CdRom,
    pub gpu: Gpu,
    pub spu: Spu,
    pub io_port: IoPort,
}

impl Peripherals {
    pub fn new(schedule: &mut Schedule) -> Self {
        Self {
            irq: IrqState::default(),
            timers: Timers::new(schedule),
            cdrom: CdRom::new(schedule),
            gpu: Gpu::new(schedule),
            spu: Spu::new(schedule),
            io_port: IoPort::new(schedule),
        }
    }

    pub fn reset(&mut self, schedule: &mut Schedule) {
        self.timers.reset(schedule);
        self.cdrom.reset(schedule);
        self.gpu.reset(schedule);
        self.spu.reset(schedule);
        self.io_port.reset(schedule);
        self.irq.reset();

        self.timers.set_dot_divider(schedule, self.gpu.dot_divider());
    }

    fn live_event(&self, kind: SegmentKind, offset: u32) -> Option<EventId> {
        match kind {
            SegmentKind::Timers => self.timers.live_event(offset),
            SegmentKind::CdRom => self.cdrom.live_event(offset),
            SegmentKind::Gpu => self.gpu.live_event(offset),
            SegmentKind::Spu => self.spu.live_event(offset),
            SegmentKind::IoPort => self.io_port.live_event(offset),
            _ => None,
        }
    }

    pub(super) fn read<T: AddrUnit>(
        &mut self,
        schedule: &mut Schedule,
        kind: SegmentKind,
        offset: u32,
    ) -> T {
        if let Some(id) = self.live_event(kind, offset) {
            schedule.update_early(id, self);
        }

        let mut ctx = IoCtx { schedule, irq: &mut self.irq };

        match kind {
            SegmentKind::Timers => read_device(&mut self.timers, &mut ctx, offset),
            SegmentKind::CdRom => read_device(&mut self.cdrom, &mut ctx, offset),
            SegmentKind::Gpu => read_device(&mut self.gpu, &mut ctx, offset),
            SegmentKind::Spu => read_device(&mut self.spu, &mut ctx, offset),
            SegmentKind::IoPort => read_device(&mut self.io_port, &mut ctx, offset),
            _ => unreachable!("{kind:?} isn't a peripheral"),
        }
    }

    pub(super) fn write<T: AddrUnit>(
        &mut self,
        schedule: &mut Schedule,
        kind: SegmentKind,
        offset: u32,
        val: T,
    ) {
        if let Some(id) = self.live_event(kind, offset) {
            schedule.update_early(id, self);
        }

        // A GP1 write may change the dot clock.
        if kind == SegmentKind::Gpu {
            schedule.update_early(self.timers.dot_clock_event(), self);
        }

        let mut ctx = IoCtx { schedule, irq: &mut self.irq };

        match kind {
            SegmentKind::Timers => write_device(&mut self.timers, &mut ctx, offset, val),
            SegmentKind::CdRom => write_device(&mut self.cdrom, &mut ctx, offset, val),
            SegmentKind::Gpu => {
                write_device(&mut self.gpu, &mut ctx, offset, val);
                self.timers.set_dot_divider(ctx.schedule, self.gpu.dot_divider());
            }
            SegmentKind::Spu => write_device(&mut self.spu, &mut ctx, offset, val),
            SegmentKind::IoPort => write_device(&mut self.io_port, &mut ctx, offset, val),
            _ => unreachable!("{kind:?} isn't a peripheral"),
        }
    }
}

impl EventHandler for Peripherals {
    fn on_event(&mut self, schedule: &mut Schedule, event: Event, cycles: Cycle) {
        let mut ctx = IoCtx { schedule, irq: &mut self.irq };

        match event {
            Event::Timer(id) => self.timers.run(&mut ctx, id, cycles),
            Event::GpuScanline => {
                let hblanks = self.gpu.run(&mut ctx, cycles);
                if hblanks > 0 {
                    self.timers.hblank(&mut ctx, hblanks);
                }
            }
            Event::CdRomResponse => self.cdrom.respond(&mut ctx),
            Event::SpuSample => self.spu.run(&mut ctx, cycles),
            Event::IoPortTransfer => self.io_port.transfer_done(&mut ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_read() {
        let regs = [0x1122_3344_u32, 0x5566_7788];
        let read = |off: u32| regs[(off >> 2) as usize];

        assert_eq!(compose_read::<u8, u32>(0, read), 0x44);
        assert_eq!(compose_read::<u8, u32>(3, read), 0x11);
        assert_eq!(compose_read::<u16, u32>(6, read), 0x5566);
    }

    #[test]
    fn wide_read() {
        let regs = [0x3344_u16, 0x1122];
        let val: u32 = compose_read(0, |off: u32| regs[(off >> 1) as usize]);
        assert_eq!(val, 0x1122_3344);
    }

    #[test]
    fn split_write() {
        let mut regs = [0_u16; 2];
        compose_write(0, 0xdead_beef_u32, |off, v: u16| regs[(off >> 1) as usize] = v);
        assert_eq!(regs, [0xbeef, 0xdead]);

        let mut reg = 0_u32;
        compose_write(2, 0xabcd_u16, |_, v: u32| reg = v);
        assert_eq!(reg, 0xabcd_0000);
    }
}
