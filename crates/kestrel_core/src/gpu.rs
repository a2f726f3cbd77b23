//! The register front of the GPU.
//!
//! Rendering is done by an external rasterizer, which receives every GP0 word through
//! [`Gpu::drain_gp0`]. This module only frames the GP0 packets to keep track of the state bits
//! visible in GPUSTAT, handles the GP1 display control commands and drives the video timing,
//! which raises the vblank interrupt and clocks timer 1.

use crate::bits::{Bit, BitSet};
use crate::bus::dma::DmaPort;
use crate::bus::{BusMap, Device, IoCtx};
use crate::cpu::{Irq, IrqState};
use crate::schedule::{Event, EventId, Schedule};
use crate::Cycle;

use std::collections::VecDeque;

/// The most GP0 words kept around for the rasterizer. The oldest words are dropped first.
const GP0_QUEUE_LIMIT: usize = 0x10_0000;

/// The video clock runs at 11/7 of the CPU clock. Line progress is kept in CPU cycles times 11, so
/// a line of `n` video cycles is `n * 7` units long.
const VIDEO_CLOCK_NUM: Cycle = 11;
const VIDEO_CLOCK_DEN: Cycle = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    Ntsc,
    Pal,
}

impl VideoMode {
    /// Video cycles per scanline.
    fn line_length(self) -> Cycle {
        match self {
            VideoMode::Ntsc => 3413,
            VideoMode::Pal => 3406,
        }
    }

    fn lines(self) -> u32 {
        match self {
            VideoMode::Ntsc => 263,
            VideoMode::Pal => 314,
        }
    }

    /// The first line of vblank.
    fn vblank_start(self) -> u32 {
        match self {
            VideoMode::Ntsc => 240,
            VideoMode::Pal => 288,
        }
    }
}

/// Framing of the GP0 word stream.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gp0State {
    /// Waiting for a command word.
    Idle,
    /// Parameters left of a command.
    Params { cmd: u32, left: u32 },
    /// Pixel data words left of a copy to VRAM.
    ImageLoad { left: u32 },
    /// Inside a poly-line, which ends with a terminator word.
    PolyLine { words: u32 },
}

/// The amount of words a GP0 packet takes, including the command word. Poly-lines are variable
/// length and take at least this amount.
fn gp0_packet_len(cmd: u32) -> u32 {
    let op = cmd.bit_range(24, 31);
    match op {
        0x02 => 3,
        0x20..=0x3f => {
            let verts = if op.bit(3) { 4 } else { 3 };
            let textured = op.bit(2) as u32;
            let shaded = op.bit(4) as u32;
            1 + verts + verts * textured + (verts - 1) * shaded
        }
        0x40..=0x5f => {
            let shaded = op.bit(4) as u32;
            3 + shaded
        }
        0x60..=0x7f => {
            let textured = op.bit(2) as u32;
            let variable = (op.bit_range(3, 4) == 0) as u32;
            2 + textured + variable
        }
        0x80..=0x9f => 4,
        0xa0..=0xdf => 3,
        _ => 1,
    }
}

pub struct Gpu {
    status: u32,
    /// The value read from GPUREAD.
    gpuread: u32,
    gp0: Gp0State,
    queue: VecDeque<u32>,
    display_start: u32,
    hrange: u32,
    vrange: u32,
    /// Progress into the current line in CPU cycles times 11.
    line_progress: Cycle,
    line: u32,
    frame: u64,
    event: EventId,
}

impl Gpu {
    pub fn new(schedule: &mut Schedule) -> Self {
        Self {
            status: 0x1480_2000,
            gpuread: 0,
            gp0: Gp0State::Idle,
            queue: VecDeque::new(),
            display_start: 0,
            hrange: 0,
            vrange: 0,
            line_progress: 0,
            line: 0,
            frame: 0,
            event: schedule.create_event("GPU scanline", Event::GpuScanline),
        }
    }

    /// Take every GP0 word written since the last call.
    pub fn drain_gp0(&mut self) -> impl Iterator<Item = u32> + '_ {
        self.queue.drain(..)
    }

    /// Frames started since reset.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn video_mode(&self) -> VideoMode {
        if self.status.bit(20) {
            VideoMode::Pal
        } else {
            VideoMode::Ntsc
        }
    }

    pub fn display_enabled(&self) -> bool {
        !self.status.bit(23)
    }

    /// The divider from the video clock to the dot clock, given by the horizontal resolution.
    pub fn dot_divider(&self) -> Cycle {
        if self.status.bit(16) {
            return 7;
        }
        match self.status.bit_range(17, 18) {
            0 => 10,
            1 => 8,
            2 => 5,
            _ => 4,
        }
    }

    fn in_vblank(&self) -> bool {
        self.line >= self.video_mode().vblank_start()
    }

    fn gpustat(&self) -> u32 {
        // The rasterizer consumes commands immediately, so it's always ready.
        let status = self.status | (1 << 26) | (1 << 27) | (1 << 28);

        let dma_request = match status.bit_range(29, 30) {
            0 => false,
            1 => true,
            2 => status.bit(28),
            _ => status.bit(27),
        };

        let odd = !self.in_vblank() && self.line.bit(0);

        status
            .set_bit(25, dma_request)
            .set_bit(31, odd)
    }

    fn line_units(&self) -> Cycle {
        self.video_mode().line_length() * VIDEO_CLOCK_DEN
    }

    fn cycles_to_next_line(&self) -> Cycle {
        let left = self.line_units() - self.line_progress;
        (left + VIDEO_CLOCK_NUM - 1) / VIDEO_CLOCK_NUM
    }

    fn next_line(&mut self, irq: &mut IrqState) {
        self.line += 1;

        if self.line == self.video_mode().vblank_start() {
            self.frame += 1;
            irq.trigger(Irq::VBlank);
        }

        if self.line >= self.video_mode().lines() {
            self.line = 0;
            let field = self.status.bit(13);
            self.status = self.status.set_bit(13, !field);
        }
    }

    /// Deliver `cycles` to the video timing. Returns the amount of scanlines passed.
    pub fn run(&mut self, ctx: &mut IoCtx, cycles: Cycle) -> u64 {
        self.line_progress += cycles * VIDEO_CLOCK_NUM;

        let mut lines = 0;
        while self.line_progress >= self.line_units() {
            self.line_progress -= self.line_units();
            self.next_line(ctx.irq);
            lines += 1;
        }

        if !ctx.schedule.is_active(self.event) {
            ctx.schedule.schedule(self.event, self.cycles_to_next_line());
        }

        lines
    }

    fn gp0(&mut self, irq: &mut IrqState, word: u32) {
        if self.queue.len() >= GP0_QUEUE_LIMIT {
            self.queue.pop_front();
        }
        self.queue.push_back(word);

        self.gp0 = match self.gp0 {
            Gp0State::Idle => {
                self.gp0_command(irq, word);
                match gp0_packet_len(word) {
                    1 => Gp0State::Idle,
                    len => Gp0State::Params { cmd: word, left: len - 1 },
                }
            }
            Gp0State::Params { cmd, left: 1 } => {
                let op = cmd.bit_range(24, 31);
                match op {
                    0xa0..=0xbf => {
                        // The last parameter is the size of the copy in halfwords.
                        let width = (word.bit_range(0, 15).wrapping_sub(1) & 0x3ff) + 1;
                        let height = (word.bit_range(16, 31).wrapping_sub(1) & 0x1ff) + 1;
                        Gp0State::ImageLoad { left: (width * height + 1) / 2 }
                    }
                    0xc0..=0xdf => {
                        warn!("VRAM to CPU copy isn't supported, GPUREAD returns zero");
                        Gp0State::Idle
                    }
                    0x48..=0x4f | 0x58..=0x5f => Gp0State::PolyLine { words: 0 },
                    _ => Gp0State::Idle,
                }
            }
            Gp0State::Params { cmd, left } => Gp0State::Params { cmd, left: left - 1 },
            Gp0State::ImageLoad { left: 1 } => Gp0State::Idle,
            Gp0State::ImageLoad { left } => Gp0State::ImageLoad { left: left - 1 },
            Gp0State::PolyLine { words } => {
                if word & 0xf000_f000 == 0x5000_5000 {
                    Gp0State::Idle
                } else {
                    Gp0State::PolyLine { words: words + 1 }
                }
            }
        };
    }

    /// Apply the effects of a GP0 command word visible in GPUSTAT.
    fn gp0_command(&mut self, irq: &mut IrqState, cmd: u32) {
        match cmd.bit_range(24, 31) {
            // Draw mode.
            0xe1 => {
                self.status = self.status
                    .set_bit_range(0, 10, cmd.bit_range(0, 10))
                    .set_bit(15, cmd.bit(11));
            }
            // Mask bit setting.
            0xe6 => {
                self.status = self.status.set_bit_range(11, 12, cmd.bit_range(0, 1));
            }
            // Interrupt request.
            0x1f => {
                if !self.status.bit(24) {
                    self.status = self.status.set_bit(24, true);
                    irq.trigger(Irq::Gpu);
                }
            }
            _ => (),
        }
    }

    fn gp1(&mut self, cmd: u32) {
        let op = cmd.bit_range(24, 29);
        match op {
            0x00 => {
                self.status = 0x1480_2000;
                self.gp0 = Gp0State::Idle;
                self.display_start = 0;
                self.hrange = 0;
                self.vrange = 0;
                debug!("GPU reset");
            }
            0x01 => self.gp0 = Gp0State::Idle,
            0x02 => self.status = self.status.set_bit(24, false),
            0x03 => self.status = self.status.set_bit(23, cmd.bit(0)),
            0x04 => self.status = self.status.set_bit_range(29, 30, cmd.bit_range(0, 1)),
            0x05 => self.display_start = cmd.bit_range(0, 23),
            0x06 => self.hrange = cmd.bit_range(0, 23),
            0x07 => self.vrange = cmd.bit_range(0, 23),
            0x08 => {
                self.status = self.status
                    .set_bit_range(17, 22, cmd.bit_range(0, 5))
                    .set_bit(16, cmd.bit(6))
                    .set_bit(14, cmd.bit(7));
                debug!("GPU display mode {:?}, dot divider {}", self.video_mode(), self.dot_divider());
            }
            0x10..=0x1f => {
                self.gpuread = match cmd.bit_range(0, 2) {
                    3 => self.display_start,
                    4 => self.hrange,
                    5 => self.vrange,
                    // GPU version.
                    7 => 2,
                    _ => self.gpuread,
                };
            }
            _ => warn!("unknown GP1 command {op:02x}"),
        }
    }
}

impl Device for Gpu {
    type Unit = u32;

    fn reset(&mut self, schedule: &mut Schedule) {
        self.status = 0x1480_2000;
        self.gpuread = 0;
        self.gp0 = Gp0State::Idle;
        self.queue.clear();
        self.display_start = 0;
        self.hrange = 0;
        self.vrange = 0;
        self.line_progress = 0;
        self.line = 0;
        self.frame = 0;
        schedule.schedule(self.event, self.cycles_to_next_line());
    }

    fn read(&mut self, _: &mut IoCtx, offset: u32) -> u32 {
        match offset {
            0 => self.gpuread,
            4 => self.gpustat(),
            _ => unreachable!("GPU read at offset {offset}"),
        }
    }

    fn write(&mut self, ctx: &mut IoCtx, offset: u32, val: u32) {
        match offset {
            0 => self.gp0(ctx.irq, val),
            4 => self.gp1(val),
            _ => unreachable!("GPU write at offset {offset}"),
        }
    }

    /// GPUSTAT shows the current scanline.
    fn live_event(&self, offset: u32) -> Option<EventId> {
        (offset == 4).then_some(self.event)
    }
}

impl DmaPort for Gpu {
    fn dma_write(&mut self, ctx: &mut IoCtx, val: u32) {
        self.gp0(ctx.irq, val);
    }

    fn dma_read(&mut self, _: &mut IoCtx) -> Option<u32> {
        None
    }
}

impl BusMap for Gpu {
    const BUS_BEGIN: u32 = 0x1f80_1810;
    const BUS_END: u32 = Self::BUS_BEGIN + 8 - 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_length() {
        // Flat triangle.
        assert_eq!(gp0_packet_len(0x2000_0000), 4);
        // Shaded textured quad.
        assert_eq!(gp0_packet_len(0x3c00_0000), 12);
        // Variable sized rectangle.
        assert_eq!(gp0_packet_len(0x6000_0000), 3);
        // Textured 16x16 rectangle.
        assert_eq!(gp0_packet_len(0x7c00_0000), 3);
        assert_eq!(gp0_packet_len(0xe100_0000), 1);
    }

    #[test]
    fn image_load_isnt_decoded() {
        let mut schedule = Schedule::new();
        let mut irq = IrqState::default();
        let mut gpu = Gpu::new(&mut schedule);

        gpu.gp0(&mut irq, 0xa000_0000);
        gpu.gp0(&mut irq, 0x0000_0000);
        // 2 by 2 halfwords.
        gpu.gp0(&mut irq, 0x0002_0002);

        // Looks like a draw mode command, but is pixel data.
        gpu.gp0(&mut irq, 0xe100_03ff);
        assert_eq!(gpu.status.bit_range(0, 10), 0);

        gpu.gp0(&mut irq, 0xe100_03ff);
        gpu.gp0(&mut irq, 0xe100_03ff);
        assert_eq!(gpu.status.bit_range(0, 10), 0x3ff);

        assert_eq!(gpu.drain_gp0().count(), 6);
    }
}
