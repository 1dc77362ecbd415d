//! String primitives: MOVS/CMPS/STOS/LODS/SCAS. Each handler performs one
//! iteration's worth of work; the REP/REPZ/REPNZ repeat loop itself lives in
//! [`crate::cpu::Cpu::clock`], which re-enters the handler once per iteration
//! and decides whether to continue based on CX and, for CMPS/SCAS, ZF.

use super::width_of;
use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::flags;
use crate::registers::{Flags, RegIndex};

fn step(cpu: &Cpu) -> u16 {
    let width = if width_of(cpu) == crate::flags::Width::Word { 2 } else { 1 };
    if cpu.flags().contains(Flags::DF) {
        0u16.wrapping_sub(width)
    } else {
        width
    }
}

fn advance_si(cpu: &mut Cpu, delta: u16) {
    let si = cpu.regs().word(RegIndex::Si).wrapping_add(delta);
    cpu.regs_mut().set_word(RegIndex::Si, si);
}

fn advance_di(cpu: &mut Cpu, delta: u16) {
    let di = cpu.regs().word(RegIndex::Di).wrapping_add(delta);
    cpu.regs_mut().set_word(RegIndex::Di, di);
}

/// `MOVSB`/`MOVSW`: copies `[DS:SI]` to `[ES:DI]`, advancing both pointers.
pub fn movs(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let width = width_of(cpu);
    let (dest, src) = (cpu.dest_loc(), cpu.src_loc());
    let v = cpu.read_loc(bus, src, width);
    cpu.write_loc(bus, dest, v, width);
    let delta = step(cpu);
    advance_si(cpu, delta);
    advance_di(cpu, delta);
}

/// `CMPSB`/`CMPSW`: flags-only comparison of `[DS:SI] - [ES:DI]`.
pub fn cmps(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let width = width_of(cpu);
    let (dest, src) = (cpu.dest_loc(), cpu.src_loc());
    let si_val = cpu.read_loc(bus, src, width);
    let di_val = cpu.read_loc(bus, dest, width);
    flags::sub(cpu.flags_mut(), si_val, di_val, width, true);
    let delta = step(cpu);
    advance_si(cpu, delta);
    advance_di(cpu, delta);
}

/// `STOSB`/`STOSW`: stores AL/AX to `[ES:DI]`, advancing DI.
pub fn stos(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let width = width_of(cpu);
    let (dest, src) = (cpu.dest_loc(), cpu.src_loc());
    let v = cpu.read_loc(bus, src, width);
    cpu.write_loc(bus, dest, v, width);
    let delta = step(cpu);
    advance_di(cpu, delta);
}

/// `LODSB`/`LODSW`: loads AL/AX from `[DS:SI]`, advancing SI.
pub fn lods(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let width = width_of(cpu);
    let (dest, src) = (cpu.dest_loc(), cpu.src_loc());
    let v = cpu.read_loc(bus, src, width);
    cpu.write_loc(bus, dest, v, width);
    let delta = step(cpu);
    advance_si(cpu, delta);
}

/// `SCASB`/`SCASW`: flags-only comparison of `AL/AX - [ES:DI]`, advancing DI.
pub fn scas(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let width = width_of(cpu);
    let (dest, src) = (cpu.dest_loc(), cpu.src_loc());
    let al = cpu.read_loc(bus, dest, width);
    let mem = cpu.read_loc(bus, src, width);
    flags::sub(cpu.flags_mut(), al, mem, width, true);
    let delta = step(cpu);
    advance_di(cpu, delta);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatBus;
    use crate::cpu::Cpu as RealCpu;

    #[test]
    fn movsb_copies_one_byte_and_advances_both_pointers() {
        let mut bus = FlatBus::new();
        bus.write_u8(0x200, 0xAB);
        bus.load_at(0, &[0xA4, 0xF4]); // MOVSB; HLT
        let mut cpu = RealCpu::new();
        cpu.set_cs(0);
        cpu.set_si(0x200);
        cpu.set_di(0x300);
        for _ in 0..40 {
            cpu.clock(&mut bus);
        }
        assert!(cpu.is_halted());
        assert_eq!(bus.read_u8(0x300), 0xAB);
        assert_eq!(cpu.si(), 0x201);
        assert_eq!(cpu.di(), 0x301);
    }

    #[test]
    fn rep_movsb_copies_cx_bytes_then_stops() {
        let mut bus = FlatBus::new();
        bus.load_at(0x200, &[1, 2, 3]);
        bus.load_at(0, &[0xF3, 0xA4, 0xF4]); // REP MOVSB; HLT
        let mut cpu = RealCpu::new();
        cpu.set_cs(0);
        cpu.set_cx(3);
        cpu.set_si(0x200);
        cpu.set_di(0x400);
        for _ in 0..140 {
            cpu.clock(&mut bus);
        }
        assert!(cpu.is_halted());
        assert_eq!(cpu.cx(), 0);
        assert_eq!(bus.read_u8(0x400), 1);
        assert_eq!(bus.read_u8(0x401), 2);
        assert_eq!(bus.read_u8(0x402), 3);
        assert_eq!(cpu.si(), 0x203);
        assert_eq!(cpu.di(), 0x403);
    }

    #[test]
    fn repz_cmpsb_stops_early_on_first_mismatch() {
        let mut bus = FlatBus::new();
        bus.load_at(0x200, &[5, 5, 9]);
        bus.load_at(0x300, &[5, 5, 1]);
        bus.load_at(0, &[0xF3, 0xA6, 0xF4]); // REPZ CMPSB; HLT
        let mut cpu = RealCpu::new();
        cpu.set_cs(0);
        cpu.set_cx(3);
        cpu.set_si(0x200);
        cpu.set_di(0x300);
        for _ in 0..160 {
            cpu.clock(&mut bus);
        }
        assert!(cpu.is_halted());
        // Stops after comparing the third byte pair (5 vs 9 mismatches),
        // having decremented CX three times.
        assert_eq!(cpu.cx(), 0);
        assert_eq!(cpu.si(), 0x203);
        assert_eq!(cpu.di(), 0x303);
        assert!(!cpu.flags().contains(Flags::ZF));
    }

    #[test]
    fn scasb_sets_zero_flag_on_match_and_advances_di() {
        let mut bus = FlatBus::new();
        bus.write_u8(0x400, 0x42);
        bus.load_at(0, &[0xAE, 0xF4]); // SCASB; HLT
        let mut cpu = RealCpu::new();
        cpu.set_cs(0);
        cpu.set_ax(0x0042);
        cpu.set_di(0x400);
        for _ in 0..40 {
            cpu.clock(&mut bus);
        }
        assert!(cpu.is_halted());
        assert!(cpu.flags().contains(Flags::ZF));
        assert_eq!(cpu.di(), 0x401);
    }
}
