//! The register front of the CD-ROM controller.
//!
//! There's never a disc in the drive. Commands are answered the way the controller answers with
//! the shell open, which is enough for the BIOS to get past the drive and show the shell menu.

use crate::bits::Bit;
use crate::bus::dma::DmaPort;
use crate::bus::{BusMap, Device, IoCtx};
use crate::cpu::Irq;
use crate::schedule::{Event, EventId, Schedule};
use crate::Cycle;

use std::collections::VecDeque;

/// Delay from a command being written until the first response arrives.
const FIRST_RESPONSE_DELAY: Cycle = 25_000;

/// Delay from the first until the second response of commands answering twice.
const SECOND_RESPONSE_DELAY: Cycle = 50_000;

/// How long to wait before trying again to deliver a response while the last one hasn't been
/// acknowledged.
const ACK_RETRY_DELAY: Cycle = 1_000;

const FIFO_SIZE: usize = 16;

/// Status byte with the shell open and the motor off.
const STAT_NO_DISC: u8 = 0x10;

/// Interrupt codes.
const INT_COMPLETE: u8 = 2;
const INT_ACKNOWLEDGE: u8 = 3;
const INT_ERROR: u8 = 5;

/// Error codes sent with [`INT_ERROR`].
const ERR_WRONG_PARAMS: u8 = 0x20;
const ERR_INVALID_COMMAND: u8 = 0x40;

struct Response {
    int: u8,
    bytes: Vec<u8>,
    delay: Cycle,
}

impl Response {
    fn new(int: u8, bytes: &[u8], delay: Cycle) -> Self {
        Self { int, bytes: bytes.to_vec(), delay }
    }

    fn error(code: u8) -> Self {
        Self::new(INT_ERROR, &[STAT_NO_DISC | 1, code], FIRST_RESPONSE_DELAY)
    }
}

pub struct CdRom {
    /// Selects which registers offsets 1 to 3 map to.
    index: u8,
    params: VecDeque<u8>,
    response: VecDeque<u8>,
    irq_enable: u8,
    irq_flags: u8,
    /// Responses waiting to be delivered. The first one is what the event is armed for.
    pending: VecDeque<Response>,
    event: EventId,
}

impl CdRom {
    pub fn new(schedule: &mut Schedule) -> Self {
        Self {
            index: 0,
            params: VecDeque::with_capacity(FIFO_SIZE),
            response: VecDeque::with_capacity(FIFO_SIZE),
            irq_enable: 0,
            irq_flags: 0,
            pending: VecDeque::new(),
            event: schedule.create_event("CDROM response", Event::CdRomResponse),
        }
    }

    fn status(&self) -> u8 {
        let busy = !self.pending.is_empty() && self.response.is_empty();
        self.index
            | (self.params.is_empty() as u8) << 3
            | ((self.params.len() < FIFO_SIZE) as u8) << 4
            | (!self.response.is_empty() as u8) << 5
            | (busy as u8) << 7
    }

    fn command(&mut self, ctx: &mut IoCtx, cmd: u8) {
        let params: Vec<u8> = self.params.drain(..).collect();

        trace!("CDROM command {cmd:02x} with parameters {params:02x?}");

        if !self.pending.is_empty() {
            warn!("CDROM command {cmd:02x} sent while busy, dropping earlier responses");
            self.pending.clear();
        }

        let ack = |delay| Response::new(INT_ACKNOWLEDGE, &[STAT_NO_DISC], delay);

        let responses = match (cmd, params.as_slice()) {
            // Getstat, Mute and Demute.
            (0x01 | 0x0b | 0x0c, []) => vec![ack(FIRST_RESPONSE_DELAY)],
            // Setmode.
            (0x0e, [mode]) => {
                debug!("CDROM mode set to {mode:02x}");
                vec![ack(FIRST_RESPONSE_DELAY)]
            }
            // Init.
            (0x0a, []) => {
                vec![
                    ack(FIRST_RESPONSE_DELAY),
                    Response::new(INT_COMPLETE, &[STAT_NO_DISC], SECOND_RESPONSE_DELAY),
                ]
            }
            // Test, get version.
            (0x19, [0x20]) => vec![Response::new(
                INT_ACKNOWLEDGE,
                &[0x94, 0x09, 0x19, 0xc0],
                FIRST_RESPONSE_DELAY,
            )],
            (0x19, [sub]) => {
                warn!("CDROM test subfunction {sub:02x} isn't supported");
                vec![Response::error(ERR_INVALID_COMMAND)]
            }
            // GetID.
            (0x1a, []) => vec![
                ack(FIRST_RESPONSE_DELAY),
                Response::new(INT_ERROR, &[0x08, 0x40, 0, 0, 0, 0, 0, 0], SECOND_RESPONSE_DELAY),
            ],
            (0x01 | 0x0a..=0x0c | 0x0e | 0x19 | 0x1a, _) => {
                vec![Response::error(ERR_WRONG_PARAMS)]
            }
            _ => {
                warn!("unknown CDROM command {cmd:02x}");
                vec![Response::error(ERR_INVALID_COMMAND)]
            }
        };

        self.pending.extend(responses);

        if let Some(first) = self.pending.front() {
            ctx.schedule.schedule(self.event, first.delay);
        }
    }

    /// Deliver the next response. Called when the response event is due.
    pub fn respond(&mut self, ctx: &mut IoCtx) {
        if ctx.schedule.is_active(self.event) {
            return;
        }

        if self.irq_flags & 0x7 != 0 {
            ctx.schedule.schedule(self.event, ACK_RETRY_DELAY);
            return;
        }

        let Some(response) = self.pending.pop_front() else {
            return;
        };

        self.response.clear();
        self.response.extend(response.bytes);
        self.irq_flags = response.int;

        if self.irq_enable & response.int != 0 {
            ctx.irq.trigger(Irq::CdRom);
        }

        if let Some(next) = self.pending.front() {
            ctx.schedule.schedule(self.event, next.delay);
        }
    }

    fn ack_irq(&mut self, val: u8) {
        self.irq_flags &= !(val & 0x1f);
        if val.bit(6) {
            self.params.clear();
        }
    }
}

impl Device for CdRom {
    type Unit = u8;

    fn reset(&mut self, _: &mut Schedule) {
        self.index = 0;
        self.params.clear();
        self.response.clear();
        self.irq_enable = 0;
        self.irq_flags = 0;
        self.pending.clear();
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u8 {
        match (offset, self.index) {
            (0, _) => self.status(),
            (1, _) => self.response.pop_front().unwrap_or(0),
            // The data FIFO is always empty.
            (2, _) => 0,
            (3, 0 | 2) => self.irq_enable | 0xe0,
            (3, _) => self.irq_flags | 0xe0,
            _ => unreachable!("CDROM read at offset {offset}"),
        }
    }

    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: u8) {
        match (offset, self.index) {
            (0, _) => self.index = val & 0x3,
            (1, 0) => self.command(ctx, val),
            (2, 0) => {
                if self.params.len() < FIFO_SIZE {
                    self.params.push_back(val);
                } else {
                    warn!("CDROM parameter FIFO full");
                }
            }
            (2, 1) => self.irq_enable = val & 0x1f,
            (3, 0) => {
                if val.bit(7) {
                    trace!("CDROM data requested without a disc");
                }
            }
            (3, 1) => self.ack_irq(val),
            // Audio volume and sound map registers.
            (1..=3, _) => trace!("CDROM audio register {offset}.{} write", self.index),
            _ => unreachable!("CDROM write at offset {offset}"),
        }
    }
}

impl DmaPort for CdRom {
    fn dma_write(&mut self, _: &mut IoCtx, _: u32) {
        warn!("DMA transfer to the CDROM, which only sends data");
    }

    fn dma_read(&mut self, _: &mut IoCtx) -> Option<u32> {
        None
    }
}

impl BusMap for CdRom {
    const BUS_BEGIN: u32 = 0x1f80_1800;
    const BUS_END: u32 = Self::BUS_BEGIN + 4 - 1;
}
