use crate::bits::Bit;
use crate::bus::BusMap;

use std::fmt;

/// The interrupt lines. The value is the bit representing the line in the status and mask
/// registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    /// Triggered every time the GPU enters vblank.
    VBlank = 0,
    /// Rarely used. Can be requested via the GP0(0x1f) GPU command.
    Gpu = 1,
    /// Triggered by the CDROM controller when it has a response ready.
    CdRom = 2,
    /// Triggered by the DMA when a channel is done with a transfer.
    Dma = 3,
    Tmr0 = 4,
    Tmr1 = 5,
    Tmr2 = 6,
    /// Triggered by the IO ports when a controller or memory card acknowledges a byte.
    CtrlAndMemCard = 7,
    Sio = 8,
    Spu = 9,
}

impl fmt::Display for Irq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Irq::VBlank => "vblank",
            Irq::Gpu => "GPU",
            Irq::CdRom => "CDROM",
            Irq::Dma => "DMA",
            Irq::Tmr0 => "TMR0",
            Irq::Tmr1 => "TMR1",
            Irq::Tmr2 => "TMR2",
            Irq::CtrlAndMemCard => "controller and memory card",
            Irq::Sio => "SIO",
            Irq::Spu => "SPU",
        })
    }
}

/// The interrupt controller.
#[derive(Default)]
pub struct IrqState {
    pub status: u32,
    pub mask: u32,
}

impl IrqState {
    /// Raise an interrupt line. This only marks the interrupt as active in the status register.
    /// The CPU checks for pending interrupts before each instruction.
    pub fn trigger(&mut self, irq: Irq) {
        self.status |= 1 << irq as u32;

        if self.is_masked(irq) {
            trace!("{irq} interrupt triggered");
        }
    }

    /// If any enabled interrupts are active. The CPU may still ignore them if interrupts are
    /// disabled in COP0.
    pub fn active(&self) -> bool {
        self.status & self.mask != 0
    }

    /// If an interrupt is active, whether or not it's enabled.
    pub fn is_triggered(&self, irq: Irq) -> bool {
        self.status.bit(irq as usize)
    }

    /// If an interrupt is enabled.
    pub fn is_masked(&self, irq: Irq) -> bool {
        self.mask.bit(irq as usize)
    }

    /// Writing to the status register acknowledges every interrupt with a zero bit in `val`.
    pub fn write(&mut self, offset: u32, val: u32) {
        match offset {
            0 => self.status &= val,
            4 => self.mask = val & 0x7ff,
            _ => warn!("interrupt controller write at offset {offset}"),
        }
    }

    pub fn read(&self, offset: u32) -> u32 {
        match offset {
            0 => self.status,
            4 => self.mask,
            _ => {
                warn!("interrupt controller read at offset {offset}");
                0xffff_ffff
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl BusMap for IrqState {
    const BUS_BEGIN: u32 = 0x1f80_1070;
    const BUS_END: u32 = Self::BUS_BEGIN + 8 - 1;
}
