#[macro_use]
extern crate log;

#[cfg(test)]
mod test;

mod bits;

pub mod bus;
pub mod cdrom;
pub mod cpu;
pub mod debug;
pub mod exe;
pub mod gpu;
pub mod io_port;
pub mod schedule;
pub mod spu;
pub mod timer;

pub use bus::bios::{Bios, BiosError};
pub use cpu::{Cpu, CpuState, Fault};
pub use debug::{Breakpoint, Debugger};
pub use exe::{Exe, ExeError};

use cpu::RegIdx;

/// Used to represent an absolute CPU cycle number. This will never overflow, unless the emulator
/// runs for 17,725 years.
pub type Cycle = u64;

/// The CPU clock rate.
pub const CPU_HZ: u64 = 33_868_800;

/// The address the BIOS jumps to when it starts the shell. Executables are side-loaded when
/// execution reaches this point, since the kernel has been set up by then.
pub const SHELL_ENTRY: u32 = 0x8003_0000;

#[derive(Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The cycles given have run.
    Time,
    /// The CPU can't continue.
    Fault(Fault),
    /// A break instruction was executed, or the debugger asked to stop.
    Break,
}

/// The whole system is on [`Cpu`]. This struct is to control and interact with the system from
/// the frontend.
pub struct System {
    pub cpu: Box<Cpu>,
}

impl System {
    pub fn new(bios: Bios) -> Self {
        Self { cpu: Cpu::new(bios) }
    }

    pub fn bios(&self) -> &Bios {
        self.cpu.bus().bios()
    }

    /// Reset every device and start over from the reset vector.
    pub fn reset(&mut self) {
        self.cpu.bus_mut().reset();
        self.cpu.reset();
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<(), Fault> {
        self.cpu.tick()
    }

    /// Run for at least `cycles` cycles.
    pub fn run(&mut self, cycles: Cycle) -> StopReason {
        self.run_debug(cycles, &mut ())
    }

    /// Run for at least `cycles` cycles, or until `dbg` asks to stop.
    pub fn run_debug(&mut self, cycles: Cycle, dbg: &mut impl Debugger) -> StopReason {
        let end = self.cpu.bus().schedule.now() + cycles;

        while self.cpu.bus().schedule.now() < end {
            if let Some(ins) = self.cpu.next_instruction() {
                dbg.instruction(&self.cpu, self.cpu.pc(), ins);
            }

            if dbg.should_break() {
                return StopReason::Break;
            }

            if let Err(fault) = self.cpu.tick() {
                return StopReason::Fault(fault);
            }

            if self.cpu.take_break() {
                return StopReason::Break;
            }
        }

        StopReason::Time
    }

    /// Copy `exe` into RAM and start executing it. The BIOS should have reached
    /// [`SHELL_ENTRY`] before, or the kernel functions used by the executable won't be there.
    pub fn sideload(&mut self, exe: &Exe) {
        let bus = self.cpu.bus_mut();

        bus.copy_to_ram(exe.text_base, &exe.text);
        bus.copy_to_ram(exe.bss_base, &vec![0; exe.bss_size as usize]);

        self.cpu.write_reg(RegIdx::GP, exe.gp);

        if exe.sp != 0 {
            self.cpu.write_reg(RegIdx::SP, exe.sp);
            self.cpu.write_reg(RegIdx::FP, exe.sp);
        }

        self.cpu.jump_to(exe.pc);

        info!("side-loaded exe with entry point {:08x}", exe.pc);
    }

    /// The number of frames the GPU has finished.
    pub fn frame_count(&self) -> u64 {
        self.cpu.bus().io.gpu.frame_count()
    }
}
