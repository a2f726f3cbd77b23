use super::asm::*;
use super::{addr_of, boot, run_code, run_steps};
use crate::bus::bios::Bios;
use crate::cpu::cop0::{BAD_VADDR, CAUSE, EPC, SR};
use crate::cpu::{Cpu, Fault, Instruction, Irq, RegIdx};

const ZERO: RegIdx = RegIdx::ZERO;
const T0: RegIdx = RegIdx::T0;
const T1: RegIdx = RegIdx::T1;
const T2: RegIdx = RegIdx::T2;
const V0: RegIdx = RegIdx::V0;

/// The general exception vector when the boot exception vectors are disabled.
const EXCEPTION_VECTOR: u32 = 0x8000_0080;

fn cause_code(cpu: &Cpu) -> u32 {
    (cpu.cop0().regs()[CAUSE] >> 2) & 0x1f
}

fn assert_exception(cpu: &Cpu, code: u32, epc: u32) {
    assert_eq!(cause_code(cpu), code);
    assert_eq!(cpu.cop0().regs()[EPC], epc);
    assert_eq!(cpu.pc(), EXCEPTION_VECTOR);
}

#[test]
fn zero_reg() {
    let cpu = run_code(&program![addiu(ZERO, ZERO, 1), brk()]);
    assert_eq!(cpu.read_reg(ZERO), 0);
}

#[test]
fn load_delay() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 42),
        sw(T0, 0, ZERO),
        addiu(T1, ZERO, 1),
        lw(T1, 0, ZERO),
        addu(T2, T1, ZERO),
        addu(V0, T1, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), 1);
    assert_eq!(cpu.read_reg(V0), 42);
}

#[test]
fn second_load_replaces_first() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 11),
        sw(T0, 0, ZERO),
        addiu(T0, ZERO, 22),
        sw(T0, 4, ZERO),
        lw(T1, 0, ZERO),
        lw(T1, 4, ZERO),
        addu(T2, T1, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), 0);
    assert_eq!(cpu.read_reg(T1), 22);
}

#[test]
fn write_in_load_delay_wins() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 11),
        sw(T0, 0, ZERO),
        lw(T1, 0, ZERO),
        addiu(T1, ZERO, 7),
        nop(),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 7);
}

#[test]
fn branch_delay() {
    let cpu = run_code(&program![
        addiu(V0, ZERO, 0),
        j(addr_of(3)),
        addiu(V0, V0, 1),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(V0), 1);
}

#[test]
fn branch_not_taken() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 1),
        beq(T0, ZERO, addr_of(1), addr_of(5)),
        addiu(V0, ZERO, 1),
        addiu(T1, ZERO, 2),
        brk(),
        brk(),
    ]);
    assert_eq!(cpu.pc(), addr_of(4));
    assert_eq!(cpu.read_reg(V0), 1);
    assert_eq!(cpu.read_reg(T1), 2);
}

#[test]
fn backwards_branch_loop() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 10),
        addiu(T1, T1, 3),
        addiu(T0, T0, -1),
        bne(T0, ZERO, addr_of(3), addr_of(1)),
        nop(),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 30);
}

#[test]
fn jal_links() {
    let cpu = run_code(&program![
        jal(addr_of(3)),
        nop(),
        brk(),
        addu(V0, RegIdx::RA, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(V0), addr_of(2));
}

#[test]
fn jr_returns() {
    let cpu = run_code(&program![
        jal(addr_of(4)),
        nop(),
        addiu(T1, ZERO, 2),
        brk(),
        jr(RegIdx::RA),
        addiu(T0, ZERO, 1),
    ]);
    assert_eq!(cpu.pc(), addr_of(3));
    assert_eq!(cpu.read_reg(T0), 1);
    assert_eq!(cpu.read_reg(T1), 2);
}

#[test]
fn bltzal_links_when_not_taken() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 1),
        bltzal(T0, addr_of(1), addr_of(4)),
        nop(),
        brk(),
        brk(),
    ]);
    assert_eq!(cpu.pc(), addr_of(3));
    assert_eq!(cpu.read_reg(RegIdx::RA), addr_of(3));
}

#[test]
fn shifts_and_compares() {
    let cpu = run_code(&program![
        li(T0, 0x8000_0000),
        sra(T1, T0, 4),
        sll(T2, T1, 4),
        addiu(V0, ZERO, -1),
        slt(RegIdx::A0, V0, ZERO),
        sltu(RegIdx::A1, V0, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 0xf800_0000);
    assert_eq!(cpu.read_reg(T2), 0x8000_0000);
    assert_eq!(cpu.read_reg(RegIdx::A0), 1);
    assert_eq!(cpu.read_reg(RegIdx::A1), 0);
}

#[test]
fn add_overflow() {
    let cpu = run_steps(
        &program![
            li(T0, 0x7fff_ffff),
            addiu(T1, ZERO, 1),
            addiu(T2, ZERO, 3),
            add(T2, T0, T1),
        ],
        5,
    );
    // The destination isn't written.
    assert_eq!(cpu.read_reg(T2), 3);
    assert_exception(&cpu, 0xc, addr_of(4));
}

#[test]
fn addi_overflow() {
    let cpu = run_steps(&program![li(T0, 0x7fff_ffff), addi(T1, T0, 1)], 3);
    assert_eq!(cpu.read_reg(T1), 0);
    assert_exception(&cpu, 0xc, addr_of(2));
}

#[test]
fn sub_overflow() {
    let cpu = run_steps(
        &program![li(T0, 0x8000_0000), addiu(T1, ZERO, 1), sub(T2, T0, T1)],
        4,
    );
    assert_eq!(cpu.read_reg(T2), 0);
    assert_exception(&cpu, 0xc, addr_of(3));
}

#[test]
fn addu_wraps() {
    let cpu = run_code(&program![
        li(T0, 0x7fff_ffff),
        addiu(T1, ZERO, 1),
        addu(T2, T0, T1),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), 0x8000_0000);
}

#[test]
fn mult() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, -3),
        addiu(T1, ZERO, 7),
        super::asm::mult(T0, T1),
        mflo(T2),
        mfhi(V0),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), -21_i32 as u32);
    assert_eq!(cpu.read_reg(V0), 0xffff_ffff);
}

#[test]
fn mflo_waits_for_mult() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 2),
        addiu(T1, ZERO, 3),
        super::asm::mult(T0, T1),
        mflo(T2),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), 6);
    // Three instructions of 2 cycles, and the rest of the 7 cycle multiplication.
    assert_eq!(cpu.bus().schedule.now(), 6 + 7);
}

#[test]
fn div_by_zero() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, -5),
        div(T0, ZERO),
        mflo(T1),
        mfhi(T2),
        addiu(T0, ZERO, 5),
        div(T0, ZERO),
        mflo(V0),
        mfhi(RegIdx::V1),
        divu(T0, ZERO),
        mflo(RegIdx::A0),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 1);
    assert_eq!(cpu.read_reg(T2), -5_i32 as u32);
    assert_eq!(cpu.read_reg(V0), 0xffff_ffff);
    assert_eq!(cpu.read_reg(RegIdx::V1), 5);
    assert_eq!(cpu.read_reg(RegIdx::A0), 0xffff_ffff);
}

#[test]
fn div_overflow() {
    let cpu = run_code(&program![
        li(T0, 0x8000_0000),
        addiu(T1, ZERO, -1),
        div(T0, T1),
        mflo(T2),
        mfhi(V0),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), 0x8000_0000);
    assert_eq!(cpu.read_reg(V0), 0);
}

#[test]
fn sign_extended_loads() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 0x80),
        sb(T0, 0, ZERO),
        lb(T1, 0, ZERO),
        lbu(T2, 0, ZERO),
        nop(),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 0xffff_ff80);
    assert_eq!(cpu.read_reg(T2), 0x80);
}

#[test]
fn unaligned_load() {
    let cpu = run_code(&program![
        li(T0, 0x4433_2211),
        sw(T0, 0, ZERO),
        li(T0, 0x8877_6655),
        sw(T0, 4, ZERO),
        lwr(T1, 1, ZERO),
        lwl(T1, 4, ZERO),
        nop(),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 0x5544_3322);
}

#[test]
fn unaligned_store() {
    let cpu = run_code(&program![
        sw(ZERO, 0, ZERO),
        sw(ZERO, 4, ZERO),
        li(T0, 0xaabb_ccdd),
        swr(T0, 1, ZERO),
        swl(T0, 4, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.bus().peek::<u32>(0), Some(0xbbcc_dd00));
    assert_eq!(cpu.bus().peek::<u32>(4), Some(0x0000_00aa));
}

#[test]
fn store_halfword() {
    let cpu = run_code(&program![
        sw(ZERO, 0, ZERO),
        li(T0, 0x1234_5678),
        sh(T0, 2, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.bus().peek::<u32>(0), Some(0x5678_0000));
}

#[test]
fn misaligned_load_address_error() {
    let cpu = run_steps(&program![addiu(T0, ZERO, 1), lw(T1, 0, T0)], 2);
    assert_exception(&cpu, 0x4, addr_of(1));
    assert_eq!(cpu.cop0().regs()[BAD_VADDR], 1);
}

#[test]
fn misaligned_store_address_error() {
    let cpu = run_steps(&program![sh(T1, 3, ZERO)], 1);
    assert_exception(&cpu, 0x5, addr_of(0));
    assert_eq!(cpu.cop0().regs()[BAD_VADDR], 3);
}

#[test]
fn unmapped_load_bus_error() {
    let cpu = run_steps(&program![li(T0, 0x1e00_0000), lw(T1, 0, T0)], 3);
    assert_exception(&cpu, 0x7, addr_of(2));
}

#[test]
fn syscall_exception() {
    let cpu = run_steps(&program![nop(), syscall()], 2);
    assert_exception(&cpu, 0x8, addr_of(1));
}

#[test]
fn exception_in_delay_slot() {
    let cpu = run_steps(&program![j(addr_of(4)), syscall()], 2);
    assert_exception(&cpu, 0x8, addr_of(0));
    assert_eq!(cpu.cop0().regs()[CAUSE] >> 31, 1);
}

#[test]
fn boot_exception_vector() {
    let cpu = run_steps(
        &program![li(T0, 1 << 22), mtc0(T0, SR as u8), syscall()],
        4,
    );
    assert_eq!(cpu.pc(), 0xbfc0_0180);
}

#[test]
fn missing_coprocessor() {
    let cpu = run_steps(&program![0x31_u32 << 26], 1);
    assert_exception(&cpu, 0xb, addr_of(0));
}

#[test]
fn unimplemented_instruction() {
    let mut cpu = boot(&program![cop2(0x28), nop()]);
    assert_eq!(
        cpu.tick(),
        Err(Fault::UnimplementedInstruction {
            addr: Bios::RESET_VECTOR,
            ins: Instruction(cop2(0x28)),
        }),
    );
    assert_eq!(cpu.bus().schedule.now(), 0);

    // Execution can go on after the fault.
    assert_eq!(cpu.tick(), Ok(()));
    assert_eq!(cpu.bus().schedule.now(), crate::cpu::CYCLES_PER_INSTRUCTION);
}

#[test]
fn mfc0_delay() {
    let cpu = run_code(&program![
        mfc0(T0, 15),
        addu(T1, T0, ZERO),
        addu(T2, T0, ZERO),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T1), 0);
    assert_eq!(cpu.read_reg(T2), 2);
}

#[test]
fn mfc0_missing_register() {
    let cpu = run_steps(&program![mfc0(T0, 16)], 1);
    assert_exception(&cpu, 0xa, addr_of(0));
}

#[test]
fn rfe_pops_mode() {
    let cpu = run_code(&program![
        addiu(T0, ZERO, 0b1100),
        mtc0(T0, SR as u8),
        rfe(),
        brk(),
    ]);
    assert_eq!(cpu.cop0().regs()[SR] & 0x3f, 0b0011);
}

#[test]
fn isolated_cache_drops_stores() {
    let cpu = run_code(&program![
        li(T0, 1 << 16),
        mtc0(T0, SR as u8),
        addiu(T1, ZERO, 5),
        sw(T1, 0, ZERO),
        mtc0(ZERO, SR as u8),
        lw(T2, 0, ZERO),
        nop(),
        brk(),
    ]);
    assert_eq!(cpu.read_reg(T2), 0xffff_ffff);
}

#[test]
fn interrupt() {
    let mut cpu = boot(&program![nop(), nop()]);

    cpu.cop0_mut().write_reg(SR as u32, 0x0401);

    let irq = &mut cpu.bus_mut().io.irq;
    irq.write(4, 1 << Irq::VBlank as u32);
    irq.trigger(Irq::VBlank);

    cpu.tick().unwrap();

    assert_exception(&cpu, 0x0, Bios::RESET_VECTOR);
    // Interrupts are disabled by entering kernel mode.
    assert_eq!(cpu.cop0().regs()[SR] & 0x3f, 0b0100);
}

#[test]
fn masked_interrupt_ignored() {
    let mut cpu = boot(&program![nop(), nop()]);

    cpu.cop0_mut().write_reg(SR as u32, 0x0401);
    cpu.bus_mut().io.irq.trigger(Irq::VBlank);

    cpu.tick().unwrap();

    assert_eq!(cpu.pc(), addr_of(1));
}

#[test]
fn store_to_next_instruction_not_seen() {
    let mut cpu = boot(&[]);

    let code = assemble(&[sw(T1, 4, T0), addiu(V0, ZERO, 2), nop()]);
    cpu.bus_mut().copy_to_ram(0, &code);

    cpu.write_reg(T0, 0x8000_0000);
    cpu.write_reg(T1, addiu(V0, ZERO, 1));
    cpu.jump_to(0x8000_0000);

    cpu.tick().unwrap();
    cpu.tick().unwrap();

    assert_eq!(cpu.read_reg(V0), 2);
    assert_eq!(cpu.bus().peek::<u32>(4), Some(addiu(V0, ZERO, 1)));
}

#[test]
fn snapshot_and_restore() {
    let code = program![addiu(T0, ZERO, 5), mtc0(T0, 3), brk()];
    let cpu = run_code(&code);
    let state = cpu.snapshot();

    let mut other = boot(&code);
    other.restore(&state);

    assert_eq!(other.pc(), cpu.pc());
    assert_eq!(other.read_reg(T0), 5);
    assert_eq!(other.cop0().regs()[3], 5);
    assert_eq!(other.next_instruction(), Some(Instruction(brk())));
}
