use crate::cpu::{Cpu, Instruction};

pub trait Debugger {
    /// Called before executing each instruction.
    fn instruction(&mut self, _cpu: &Cpu, _addr: u32, _ins: Instruction) {}

    /// Called before each instruction, right after [`Self::instruction`]. If it returns `true`,
    /// the system stops without executing it.
    fn should_break(&mut self) -> bool;
}

impl Debugger for () {
    fn should_break(&mut self) -> bool {
        false
    }
}

/// Break when the instruction at an address is about to be executed.
pub struct Breakpoint {
    addr: u32,
    hit: bool,
}

impl Breakpoint {
    pub fn new(addr: u32) -> Self {
        Self { addr, hit: false }
    }
}

impl Debugger for Breakpoint {
    fn instruction(&mut self, _: &Cpu, addr: u32, _: Instruction) {
        self.hit |= addr == self.addr;
    }

    fn should_break(&mut self) -> bool {
        std::mem::take(&mut self.hit)
    }
}
