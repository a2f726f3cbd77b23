//! The three root counters.
//!
//! The counters aren't ticked every cycle. Each timer has an event armed at the next point where
//! something observable happens, which is either reaching the target or overflowing. Reads of
//! the counter bring the event up to date first, so the counter is always exact when observed.

use crate::bits::{Bit, BitSet};
use crate::bus::{BusMap, Device, IoCtx};
use crate::cpu::{Irq, IrqState};
use crate::schedule::{Event, EventId, Schedule};
use crate::Cycle;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    Tmr0,
    Tmr1,
    Tmr2,
}

impl TimerId {
    fn irq(self) -> Irq {
        match self {
            TimerId::Tmr0 => Irq::Tmr0,
            TimerId::Tmr1 => Irq::Tmr1,
            TimerId::Tmr2 => Irq::Tmr2,
        }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            TimerId::Tmr0 => "timer 0",
            TimerId::Tmr1 => "timer 1",
            TimerId::Tmr2 => "timer 2",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    SystemClock,
    /// Timer 0 only. Runs at the video clock divided by the horizontal resolution divider.
    DotClock,
    /// Timer 1 only. Ticks once each scanline.
    Hblank,
    /// Timer 2 only.
    SystemClockDiv8,
}

/// The mode register.
///
/// | Bits  | Usage                                      |
/// |-------|--------------------------------------------|
/// | 0     | Sync enable                                |
/// | 1-2   | Sync mode                                  |
/// | 3     | Reset counter after reaching target        |
/// | 4     | IRQ when target is reached                 |
/// | 5     | IRQ on overflow                            |
/// | 6     | Repeat IRQ rather than one-shot            |
/// | 7     | Toggle bit 10 rather than pulse            |
/// | 8-9   | Clock source                               |
/// | 10    | IRQ not requested (read only)              |
/// | 11    | Target reached, reset on read (read only)  |
/// | 12    | Overflow reached, reset on read (read only)|
#[derive(Default, Clone, Copy)]
pub struct Mode(u16);

impl Mode {
    fn sync_enabled(self) -> bool {
        self.0.bit(0)
    }

    fn sync_mode(self) -> u16 {
        self.0.bit_range(1, 2)
    }

    fn reset_on_target(self) -> bool {
        self.0.bit(3)
    }

    fn irq_on_target(self) -> bool {
        self.0.bit(4)
    }

    fn irq_on_overflow(self) -> bool {
        self.0.bit(5)
    }

    fn irq_repeat(self) -> bool {
        self.0.bit(6)
    }

    fn irq_toggle(self) -> bool {
        self.0.bit(7)
    }

    fn clock_source(self, id: TimerId) -> ClockSource {
        match (id, self.0.bit_range(8, 9)) {
            (TimerId::Tmr0, 1 | 3) => ClockSource::DotClock,
            (TimerId::Tmr1, 1 | 3) => ClockSource::Hblank,
            (TimerId::Tmr2, 2 | 3) => ClockSource::SystemClockDiv8,
            _ => ClockSource::SystemClock,
        }
    }

    fn irq_flag(self) -> bool {
        self.0.bit(10)
    }

    fn set_irq_flag(&mut self, val: bool) {
        self.0 = self.0.set_bit(10, val);
    }
}

pub struct Timer {
    id: TimerId,
    mode: Mode,
    counter: u16,
    target: u16,
    /// Triggered an IRQ since the mode was written. One-shot timers only trigger once.
    has_triggered: bool,
    /// Cycles not yet making up a whole tick.
    remainder: Cycle,
    event: EventId,
}

impl Timer {
    fn new(id: TimerId, schedule: &mut Schedule) -> Self {
        let name = match id {
            TimerId::Tmr0 => "timer 0",
            TimerId::Tmr1 => "timer 1",
            TimerId::Tmr2 => "timer 2",
        };
        Self {
            id,
            mode: Mode::default(),
            counter: 0,
            target: 0,
            has_triggered: false,
            remainder: 0,
            event: schedule.create_event(name, Event::Timer(id)),
        }
    }

    fn clock_source(&self) -> ClockSource {
        self.mode.clock_source(self.id)
    }

    /// Timer 2 is stopped in sync modes 0 and 3.
    fn stopped(&self) -> bool {
        self.id == TimerId::Tmr2 && self.mode.sync_enabled() && matches!(self.mode.sync_mode(), 0 | 3)
    }

    /// Convert cycles to ticks, keeping what's left over for next time.
    fn cycles_to_ticks(&mut self, cycles: Cycle, dot_divider: Cycle) -> u64 {
        // The dot clock runs at 11/7 of the CPU clock divided by the dot divider.
        let (scaled, per_tick) = match self.clock_source() {
            ClockSource::SystemClock => return cycles,
            ClockSource::Hblank => return 0,
            ClockSource::SystemClockDiv8 => (cycles, 8),
            ClockSource::DotClock => (cycles * 11, 7 * dot_divider),
        };
        self.remainder += scaled;
        let ticks = self.remainder / per_tick;
        self.remainder %= per_tick;
        ticks
    }

    /// The amount of cycles until `ticks` ticks have passed.
    fn ticks_to_cycles(&self, ticks: u64, dot_divider: Cycle) -> Option<Cycle> {
        match self.clock_source() {
            ClockSource::SystemClock => Some(ticks),
            ClockSource::Hblank => None,
            ClockSource::SystemClockDiv8 => Some(ticks * 8 - self.remainder),
            ClockSource::DotClock => {
                let scaled = ticks * 7 * dot_divider - self.remainder;
                Some((scaled + 10) / 11)
            }
        }
    }

    /// Ticks until the next time the counter reaches the target or overflows.
    fn ticks_until_next(&self) -> u64 {
        let counter = u64::from(self.counter);
        let target = u64::from(self.target);
        let to_overflow = 0x1_0000 - counter;
        if target > counter {
            (target - counter).min(to_overflow)
        } else {
            to_overflow
        }
    }

    fn trigger_irq(&mut self, irq: &mut IrqState) {
        if !self.mode.irq_repeat() && self.has_triggered {
            return;
        }

        self.has_triggered = true;

        // An IRQ is requested when bit 10 goes low. In pulse mode it goes back high right away.
        if self.mode.irq_toggle() {
            let flag = !self.mode.irq_flag();
            self.mode.set_irq_flag(flag);
            if !flag {
                irq.trigger(self.id.irq());
            }
        } else {
            irq.trigger(self.id.irq());
        }
    }

    fn target_reached(&mut self, irq: &mut IrqState) {
        self.mode.0 = self.mode.0.set_bit(11, true);

        if self.mode.reset_on_target() {
            self.counter = 0;
        }

        if self.mode.irq_on_target() {
            self.trigger_irq(irq);
        }
    }

    fn overflowed(&mut self, irq: &mut IrqState) {
        self.mode.0 = self.mode.0.set_bit(12, true);

        if self.mode.irq_on_overflow() {
            self.trigger_irq(irq);
        }
    }

    /// Advance the counter by `ticks`.
    fn tick(&mut self, irq: &mut IrqState, mut ticks: u64) {
        while ticks > 0 {
            let counter = u64::from(self.counter);
            let target = u64::from(self.target);
            let to_overflow = 0x1_0000 - counter;
            let to_target = if target > counter { target - counter } else { u64::MAX };

            let step = ticks.min(to_target).min(to_overflow);
            ticks -= step;

            if step == to_overflow {
                self.counter = 0;
                self.overflowed(irq);
            } else {
                self.counter = (counter + step) as u16;
                if step == to_target {
                    self.target_reached(irq);
                }
            }
        }
    }

    /// Arm the event at the next target or overflow, if the timer is driven by a clock.
    fn arm(&mut self, schedule: &mut Schedule, dot_divider: Cycle) {
        if self.stopped() {
            schedule.cancel(self.event);
            return;
        }
        match self.ticks_to_cycles(self.ticks_until_next(), dot_divider) {
            Some(cycles) => schedule.schedule(self.event, cycles.max(1)),
            None => schedule.cancel(self.event),
        }
    }

    fn read(&mut self, reg: u32) -> u16 {
        match reg {
            0 => self.counter,
            4 => {
                let val = self.mode.0;
                self.mode.0 &= !0x1800;
                val
            }
            8 => self.target,
            _ => {
                warn!("{} read at register {reg}", self.id);
                0xffff
            }
        }
    }

    fn write(&mut self, reg: u32, val: u16) {
        match reg {
            0 => self.counter = val,
            4 => {
                self.mode.0 = (self.mode.0 & 0x1800) | (val & 0x3ff);
                self.mode.set_irq_flag(true);
                self.counter = 0;
                self.remainder = 0;
                self.has_triggered = false;

                if self.mode.sync_enabled() && self.id != TimerId::Tmr2 {
                    warn!("{} synchronization mode {} isn't supported", self.id, self.mode.sync_mode());
                }

                debug!("{} clocked by {:?}", self.id, self.clock_source());
            }
            8 => self.target = val,
            _ => warn!("{} write at register {reg}", self.id),
        }
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn target(&self) -> u16 {
        self.target
    }

    pub fn mode(&self) -> u16 {
        self.mode.0
    }
}

pub struct Timers {
    timers: [Timer; 3],
    /// Current dot clock divider of the GPU.
    dot_divider: Cycle,
}

impl Timers {
    pub fn new(schedule: &mut Schedule) -> Self {
        Self {
            timers: [
                Timer::new(TimerId::Tmr0, schedule),
                Timer::new(TimerId::Tmr1, schedule),
                Timer::new(TimerId::Tmr2, schedule),
            ],
            dot_divider: 10,
        }
    }

    pub fn timer(&self, id: TimerId) -> &Timer {
        &self.timers[id as usize]
    }

    /// The event of timer 0, which must be brought up to date before the dot clock changes.
    pub fn dot_clock_event(&self) -> EventId {
        self.timers[TimerId::Tmr0 as usize].event
    }

    /// Change the dot clock divider. Timer 0 must be up to date, since the cycles it hasn't
    /// been given yet will be converted with the new divider.
    pub fn set_dot_divider(&mut self, schedule: &mut Schedule, divider: Cycle) {
        if divider == self.dot_divider {
            return;
        }

        self.dot_divider = divider;

        let timer = &mut self.timers[TimerId::Tmr0 as usize];
        if timer.clock_source() == ClockSource::DotClock {
            timer.remainder = timer.remainder.min(7 * divider - 1);
            timer.arm(schedule, divider);
        }
    }

    /// Deliver `cycles` to a timer. Called by the scheduler both when the event is due and when
    /// it's brought up to date early.
    pub fn run(&mut self, ctx: &mut IoCtx, id: TimerId, cycles: Cycle) {
        let timer = &mut self.timers[id as usize];
        let ticks = timer.cycles_to_ticks(cycles, self.dot_divider);

        timer.tick(ctx.irq, ticks);

        if !ctx.schedule.is_active(timer.event) {
            timer.arm(ctx.schedule, self.dot_divider);
        }
    }

    /// Called by the GPU for each scanline passing. Ticks timer 1 if it's clocked by hblank.
    pub fn hblank(&mut self, ctx: &mut IoCtx, count: u64) {
        let timer = &mut self.timers[TimerId::Tmr1 as usize];
        if timer.clock_source() == ClockSource::Hblank {
            timer.tick(ctx.irq, count);
        }
    }
}

impl Device for Timers {
    type Unit = u16;

    fn reset(&mut self, schedule: &mut Schedule) {
        self.dot_divider = 10;
        for timer in self.timers.iter_mut() {
            timer.mode = Mode::default();
            timer.mode.set_irq_flag(true);
            timer.counter = 0;
            timer.target = 0;
            timer.remainder = 0;
            timer.has_triggered = false;
            timer.arm(schedule, self.dot_divider);
        }
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u16 {
        match self.timers.get_mut(offset.bit_range(4, 5) as usize) {
            Some(timer) => timer.read(offset.bit_range(0, 3)),
            None => {
                warn!("timer read at offset {offset:x}");
                0xffff
            }
        }
    }

    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: u16) {
        let Some(timer) = self.timers.get_mut(offset.bit_range(4, 5) as usize) else {
            warn!("timer write at offset {offset:x}");
            return;
        };
        timer.write(offset.bit_range(0, 3), val);
        timer.arm(ctx.schedule, self.dot_divider);
    }

    fn live_event(&self, offset: u32) -> Option<EventId> {
        self.timers.get(offset.bit_range(4, 5) as usize).map(|timer| timer.event)
    }
}

impl BusMap for Timers {
    const BUS_BEGIN: u32 = 0x1f80_1100;
    const BUS_END: u32 = Self::BUS_BEGIN + 0x30 - 1;
}
