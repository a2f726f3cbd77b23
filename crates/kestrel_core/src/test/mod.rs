mod asm;
mod cpu;
mod dma;
mod exe;

use crate::bus::bios::Bios;
use crate::cpu::{Cpu, Instruction};

/// Give up on programs which don't reach a break instruction after this many instructions.
const MAX_STEPS: usize = 100_000;

/// The address of instruction number `idx` of a program made with [`run_code`].
pub fn addr_of(idx: usize) -> u32 {
    Bios::RESET_VECTOR + 4 * idx as u32
}

fn boot(code: &[u32]) -> Box<Cpu> {
    Cpu::new(Bios::from_code(Bios::RESET_VECTOR, &asm::assemble(code)))
}

/// Boot a BIOS containing `code` and run until the next instruction is a break.
pub fn run_code(code: &[u32]) -> Box<Cpu> {
    let mut cpu = boot(code);
    let brk = Instruction(asm::brk());

    for _ in 0..MAX_STEPS {
        if cpu.next_instruction() == Some(brk) {
            return cpu;
        }
        if let Err(fault) = cpu.tick() {
            panic!("{fault}");
        }
    }

    panic!("no break after {MAX_STEPS} instructions");
}

/// Boot a BIOS containing `code` and execute `steps` instructions.
pub fn run_steps(code: &[u32], steps: usize) -> Box<Cpu> {
    let mut cpu = boot(code);
    for _ in 0..steps {
        if let Err(fault) = cpu.tick() {
            panic!("{fault}");
        }
    }
    cpu
}
