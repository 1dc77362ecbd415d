//! End-to-end scenarios driven entirely through the public API: load a
//! program into a flat bus, clock the core until it halts, and check the
//! architectural state against Intel's documented behavior for each
//! instruction sequence.

use cpu_i8086::registers::Flags;
use cpu_i8086::{Bus, Cpu, CpuSignal, FlatBus, IllegalOpcodePolicy};

/// Appends a trailing `HLT` to `program` so each scenario has a stable,
/// unambiguous stopping point regardless of exact cycle counts.
fn run_to_halt(cpu: &mut Cpu, bus: &mut FlatBus, at: u32, program: &[u8], max_clocks: u32) {
    let mut bytes = program.to_vec();
    bytes.push(0xF4);
    bus.load_at(at, &bytes);
    for _ in 0..max_clocks {
        cpu.clock(bus);
    }
    assert!(cpu.is_halted(), "program did not reach its trailing HLT");
}

#[test]
fn s1_add_ax_imm16_sets_carry_and_aux_carry_without_overflow() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_ax(0xFFFF);
    run_to_halt(&mut cpu, &mut bus, 0, &[0x05, 0x03, 0x10], 40);

    assert_eq!(cpu.ax(), 0x1002);
    assert!(cpu.flags().contains(Flags::CF));
    assert!(!cpu.flags().contains(Flags::OF));
    assert!(!cpu.flags().contains(Flags::SF));
    assert!(!cpu.flags().contains(Flags::ZF));
    assert!(cpu.flags().contains(Flags::PF));
    assert!(cpu.flags().contains(Flags::AF));
}

#[test]
fn s2_add_memory_operand_via_bx_si_displacement() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_ds(0);
    cpu.set_bx(1);
    cpu.set_si(0);
    cpu.set_cx(1);
    bus.write_u16(0, 0); // DS:0000 starts at zero
    // ADD [BX+SI-1], CX
    run_to_halt(&mut cpu, &mut bus, 0, &[0x01, 0x48, 0xFF], 70);

    assert_eq!(bus.read_u16(0), 1);
    assert!(!cpu.flags().contains(Flags::CF));
    assert!(!cpu.flags().contains(Flags::ZF));
}

#[test]
fn s3_far_jump_resyncs_cs_ip_and_empties_the_prefetch_queue() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new(); // CS=0xFFFF, IP=0 — the architectural reset vector,
                              // physically equivalent to the classic F000:FFF0 BIOS entry
    bus.load_at(0xFFFF0, &[0xEA, 0x5B, 0xE0, 0x00, 0xF0]); // JMP FAR F000:E05B
    bus.load_at(0xFE05B, &[0xF4]);
    for _ in 0..40 {
        cpu.clock(&mut bus);
    }
    assert!(cpu.is_halted());
    assert_eq!(cpu.cs(), 0xF000);
    assert_eq!(cpu.ip(), 0xE05B);
}

#[test]
fn s4_mov_al_imm8_then_cbw_sign_extends() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    run_to_halt(&mut cpu, &mut bus, 0, &[0xB0, 0x80, 0x98], 40);
    assert_eq!(cpu.ax(), 0xFF80);
}

#[test]
fn s5_daa_on_9b_produces_carry_and_aux_carry() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_ax(0x009B);
    run_to_halt(&mut cpu, &mut bus, 0, &[0x27], 20);
    assert_eq!(cpu.ax() & 0xFF, 0x01);
    assert!(cpu.flags().contains(Flags::CF));
    assert!(cpu.flags().contains(Flags::AF));
}

#[test]
fn s6_rep_movsb_copies_four_bytes_and_advances_pointers() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_ds(0);
    cpu.set_es(0);
    cpu.set_si(0x100);
    cpu.set_di(0x200);
    cpu.set_cx(4);
    bus.load_at(0x100, &[0xAA, 0xBB, 0xCC, 0xDD]);
    run_to_halt(&mut cpu, &mut bus, 0, &[0xF3, 0xA4], 140);

    assert_eq!(bus.read_u8(0x200), 0xAA);
    assert_eq!(bus.read_u8(0x201), 0xBB);
    assert_eq!(bus.read_u8(0x202), 0xCC);
    assert_eq!(bus.read_u8(0x203), 0xDD);
    assert_eq!(cpu.cx(), 0);
    assert_eq!(cpu.si(), 0x104);
    assert_eq!(cpu.di(), 0x204);
}

#[test]
fn reset_restores_the_power_up_vector_after_running_code() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    run_to_halt(&mut cpu, &mut bus, 0, &[0xB0, 0x42], 20);
    assert_eq!(cpu.ax() & 0xFF, 0x42);

    cpu.reset();
    assert_eq!(cpu.cs(), 0xFFFF);
    assert_eq!(cpu.ip(), 0);
    assert_eq!(cpu.ds(), 0);
    assert_eq!(cpu.ss(), 0);
    assert_eq!(cpu.es(), 0);
    assert!(cpu.flags().is_empty());
    assert!(!cpu.is_halted());
}

#[test]
fn illegal_opcode_under_ignore_policy_advances_past_it_as_a_one_byte_nop() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_illegal_opcode_policy(IllegalOpcodePolicy::Ignore);
    // 0x0F has no table entry on this core; MOV AL, 0x7A follows it.
    bus.load_at(0, &[0x0F, 0xB0, 0x7A, 0xF4]);

    let mut saw_signal = false;
    for _ in 0..40 {
        if let Some(CpuSignal::IllegalOpcode { opcode, .. }) = cpu.clock(&mut bus) {
            assert_eq!(opcode, 0x0F);
            saw_signal = true;
        }
    }
    assert!(saw_signal, "expected a diagnostic signal for the illegal opcode");
    assert!(!cpu.is_halted(), "Ignore policy must not halt the core");
    assert_eq!(cpu.ax() & 0xFF, 0x7A);
}

#[test]
fn repz_cmpsb_stops_before_cx_reaches_zero_on_mismatch() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_ds(0);
    cpu.set_es(0);
    cpu.set_si(0x300);
    cpu.set_di(0x400);
    cpu.set_cx(5);
    bus.load_at(0x300, &[1, 2, 3, 4, 5]);
    bus.load_at(0x400, &[1, 2, 9, 4, 5]);
    // REPZ CMPSB
    run_to_halt(&mut cpu, &mut bus, 0, &[0xF3, 0xA6], 150);

    // Stops after the third pair mismatches, well short of the CX=5 budget.
    assert_eq!(cpu.cx(), 2);
    assert_eq!(cpu.si(), 0x303);
    assert_eq!(cpu.di(), 0x403);
    assert!(!cpu.flags().contains(Flags::ZF));
}

#[test]
fn push_then_pop_round_trips_and_restores_stack_pointer() {
    let mut bus = FlatBus::new();
    let mut cpu = Cpu::new();
    cpu.set_cs(0);
    cpu.set_ss(0);
    cpu.set_sp(0x200);
    cpu.set_ax(0x4242);
    // PUSH AX; POP CX
    run_to_halt(&mut cpu, &mut bus, 0, &[0x50, 0x59], 40);

    assert_eq!(cpu.cx(), 0x4242);
    assert_eq!(cpu.sp(), 0x200);
}
