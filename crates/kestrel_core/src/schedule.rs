//! Cycle driven scheduling of peripheral work.
//!
//! Devices with time dependent behavior register an event once and arm it with a distance in CPU
//! cycles. The CPU reports every retired instruction with [`Schedule::add_cycles`], but those
//! cycles are not handed out to the events right away. They pile up in a pool that is only
//! distributed once the closest event is due, at which point every armed event is credited with
//! the same amount and the due event gets its callback. An event that is observed before it's due,
//! like a timer counter being read, can be brought up to date with [`Schedule::update_early`].
//!
//! Everything runs on the thread driving the CPU. Callbacks run to completion and may arm or
//! cancel events, but must never add cycles themselves.

use crate::timer::TimerId;
use crate::Cycle;

use std::fmt;
use std::mem;

/// Handle to an event registered with [`Schedule::create_event`]. It stays valid for the lifetime
/// of the [`Schedule`], also across resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventId(usize);

/// What to run when an event is updated. The [`EventHandler`] routes it to the device owning the
/// event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Timer(TimerId),
    GpuScanline,
    CdRomResponse,
    SpuSample,
    IoPortTransfer,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::Timer(id) => write!(f, "run {id}"),
            Event::GpuScanline => f.write_str("GPU scanline"),
            Event::CdRomResponse => f.write_str("CDROM response"),
            Event::SpuSample => f.write_str("SPU sample"),
            Event::IoPortTransfer => f.write_str("IO port serial transfer"),
        }
    }
}

/// Receives the cycles delivered to events.
pub trait EventHandler {
    /// Deliver `cycles` to `event`. The receiver must consume exactly the cycles given. If the
    /// event was due it has been disarmed before the call, and must be armed again with
    /// [`Schedule::schedule`] if it should run again.
    fn on_event(&mut self, schedule: &mut Schedule, event: Event, cycles: Cycle);
}

struct Entry {
    name: &'static str,
    event: Event,
    active: bool,
    /// Cycles from the last delivery until the event is due.
    until_due: i64,
    /// Cycles distributed to the event since the last delivery. It starts out negative when
    /// armed while the pool holds undistributed cycles.
    pending: i64,
}

#[derive(Clone, Copy)]
struct NextEvent {
    id: EventId,
    /// The amount of cycles the pool must hold for the event to be due.
    distance: i64,
}

pub struct Schedule {
    entries: Vec<Entry>,
    /// Cycles added but not yet distributed to the events.
    pending: i64,
    next: Option<NextEvent>,
    /// Set while a callback runs.
    firing: bool,
    /// Cycles added since startup or the last reset.
    cycle: Cycle,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(16),
            pending: 0,
            next: None,
            firing: false,
            cycle: 0,
        }
    }

    /// Register a new inactive event.
    pub fn create_event(&mut self, name: &'static str, event: Event) -> EventId {
        self.entries.push(Entry {
            name,
            event,
            active: false,
            until_due: 0,
            pending: 0,
        });
        EventId(self.entries.len() - 1)
    }

    /// Arm or re-arm `id` to be due `cycles` from now. Cycles that have been added before this
    /// call, but not yet distributed, don't count towards the event.
    pub fn schedule(&mut self, id: EventId, cycles: Cycle) {
        debug_assert!(cycles > 0, "event '{}' scheduled with no delay", self.name(id));

        let pending = self.pending;
        let entry = &mut self.entries[id.0];

        entry.active = true;
        entry.until_due = cycles as i64;
        entry.pending = -pending;

        if !self.firing {
            self.update_next_event();
        }
    }

    /// Disarm `id`. Any cycles not yet delivered to it are dropped.
    pub fn cancel(&mut self, id: EventId) {
        let entry = &mut self.entries[id.0];

        entry.active = false;
        entry.until_due = 0;
        entry.pending = 0;

        if !self.firing {
            self.update_next_event();
        }
    }

    /// Deliver all cycles that have passed for `id`, but haven't been delivered yet. If the event
    /// is due in the middle of the cycles, it runs as if it was due normally and the rest is
    /// delivered afterwards if it's armed again.
    pub fn update_early<H: EventHandler>(&mut self, id: EventId, handler: &mut H) {
        loop {
            let pending = self.pending;
            let entry = &mut self.entries[id.0];

            if !entry.active {
                break;
            }

            let elapsed = entry.pending + pending;

            if elapsed <= 0 {
                break;
            }

            if elapsed < entry.until_due {
                entry.until_due -= elapsed;
                entry.pending = -pending;

                let event = entry.event;
                self.run_callback(event, elapsed, handler);

                break;
            }

            let leftover = elapsed - entry.until_due;

            entry.pending = entry.until_due;
            self.fire(id, handler);

            let pending = self.pending;
            let entry = &mut self.entries[id.0];

            if !entry.active || leftover == 0 {
                break;
            }

            entry.pending = leftover - pending;
        }

        if !self.firing {
            self.update_next_event();
        }
    }

    /// Add cycles run by the CPU. Runs every event that gets due, one at a time, in the order they
    /// get due. Events due at the same cycle run in the order they were created.
    pub fn add_cycles<H: EventHandler>(&mut self, cycles: Cycle, handler: &mut H) {
        debug_assert!(!self.firing, "cycles added from an event callback");

        self.cycle += cycles;
        self.pending += cycles as i64;

        while let Some(next) = self.next {
            if self.pending < next.distance {
                break;
            }

            for entry in self.entries.iter_mut().filter(|entry| entry.active) {
                entry.pending += next.distance;
            }

            self.pending -= next.distance;

            // The rest of the pool is after the due point, so it must not count against events
            // armed by the callback.
            let carry = mem::take(&mut self.pending);
            self.fire(next.id, handler);
            self.pending += carry;

            self.update_next_event();
        }
    }

    /// If `id` is armed.
    pub fn is_active(&self, id: EventId) -> bool {
        self.entries[id.0].active
    }

    /// The amount of cycles until `id` is due, if it's armed.
    pub fn cycles_until(&self, id: EventId) -> Option<Cycle> {
        let entry = &self.entries[id.0];
        entry.active.then(|| {
            (entry.until_due - entry.pending - self.pending).max(0) as Cycle
        })
    }

    pub fn name(&self, id: EventId) -> &'static str {
        self.entries[id.0].name
    }

    /// Cycles added since startup or the last reset.
    pub fn now(&self) -> Cycle {
        self.cycle
    }

    /// Iterate over the name and cycles until due of every armed event.
    pub fn iter_active(&self) -> impl Iterator<Item = (&'static str, Cycle)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                self.cycles_until(EventId(i)).map(|cycles| (entry.name, cycles))
            })
    }

    /// Disarm all events and forget every cycle added.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.active = false;
            entry.until_due = 0;
            entry.pending = 0;
        }
        self.pending = 0;
        self.cycle = 0;
        self.next = None;
    }

    fn fire<H: EventHandler>(&mut self, id: EventId, handler: &mut H) {
        let entry = &mut self.entries[id.0];

        debug_assert_eq!(
            entry.pending, entry.until_due,
            "event '{}' fired with the wrong amount of cycles", entry.name,
        );

        let cycles = entry.until_due;
        let event = entry.event;

        entry.active = false;
        entry.until_due = 0;
        entry.pending = 0;

        trace!("event '{}' due after {} cycles", entry.name, cycles);

        self.run_callback(event, cycles, handler);
    }

    fn run_callback<H: EventHandler>(&mut self, event: Event, cycles: i64, handler: &mut H) {
        let was_firing = mem::replace(&mut self.firing, true);
        handler.on_event(self, event, cycles as Cycle);
        self.firing = was_firing;
    }

    fn update_next_event(&mut self) {
        self.next = self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.active)
            .map(|(i, entry)| NextEvent {
                id: EventId(i),
                distance: entry.until_due - entry.pending,
            })
            .min_by_key(|next| next.distance);
    }
}
