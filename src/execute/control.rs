//! Control transfer and flag-control instructions: conditional jumps, near
//! and far CALL/JMP/RET, WAIT, HLT, and the CLC/STC/CMC/CLI/STI/CLD/STD
//! family.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::decode::table::Handler;
use crate::flags::Width;
use crate::registers::{Flags, SegIndex};

fn test_condition(flags: Flags, idx: usize) -> bool {
    let cf = flags.contains(Flags::CF);
    let zf = flags.contains(Flags::ZF);
    let sf = flags.contains(Flags::SF);
    let of = flags.contains(Flags::OF);
    let pf = flags.contains(Flags::PF);
    match idx {
        0 => of,
        1 => !of,
        2 => cf,
        3 => !cf,
        4 => zf,
        5 => !zf,
        6 => cf || zf,
        7 => !cf && !zf,
        8 => sf,
        9 => !sf,
        10 => pf,
        11 => !pf,
        12 => sf != of,
        13 => sf == of,
        14 => zf || (sf != of),
        _ => !zf && (sf == of),
    }
}

fn jcc_generic(cpu: &mut Cpu, bus: &mut dyn Bus, idx: usize) {
    if test_condition(cpu.flags(), idx) {
        let rel = cpu.read_loc(bus, cpu.src_loc(), Width::Word) as i16;
        let target = cpu.ip().wrapping_add(rel as u16);
        cpu.near_jump(target);
    }
}

macro_rules! jcc_fn {
    ($name:ident, $idx:literal) => {
        fn $name(cpu: &mut Cpu, bus: &mut dyn Bus) {
            jcc_generic(cpu, bus, $idx);
        }
    };
}

jcc_fn!(jo, 0);
jcc_fn!(jno, 1);
jcc_fn!(jb, 2);
jcc_fn!(jae, 3);
jcc_fn!(je, 4);
jcc_fn!(jne, 5);
jcc_fn!(jbe, 6);
jcc_fn!(ja, 7);
jcc_fn!(js, 8);
jcc_fn!(jns, 9);
jcc_fn!(jp, 10);
jcc_fn!(jnp, 11);
jcc_fn!(jl, 12);
jcc_fn!(jge, 13);
jcc_fn!(jle, 14);
jcc_fn!(jg, 15);

/// The sixteen `0x70..=0x7F` condition-code handlers, in opcode order.
pub fn jcc_handlers() -> [Handler; 16] {
    [jo, jno, jb, jae, je, jne, jbe, ja, js, jns, jp, jnp, jl, jge, jle, jg]
}

pub fn jmp_short(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let rel = cpu.read_loc(bus, cpu.src_loc(), Width::Word) as i16;
    let target = cpu.ip().wrapping_add(rel as u16);
    cpu.near_jump(target);
}

pub fn jmp_near(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let rel = cpu.read_loc(bus, cpu.src_loc(), Width::Word) as u16;
    let target = cpu.ip().wrapping_add(rel);
    cpu.near_jump(target);
}

pub fn jmp_far(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    let (seg, off) = cpu.far_target();
    cpu.far_jump(seg, off);
}

pub fn call_near(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let return_ip = cpu.ip();
    let rel = cpu.read_loc(bus, cpu.src_loc(), Width::Word) as u16;
    cpu.push_word(bus, return_ip);
    cpu.near_jump(return_ip.wrapping_add(rel));
}

pub fn call_far(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let (seg, off) = cpu.far_target();
    let return_cs = cpu.regs().seg(SegIndex::Cs);
    let return_ip = cpu.ip();
    cpu.push_word(bus, return_cs);
    cpu.push_word(bus, return_ip);
    cpu.far_jump(seg, off);
}

pub fn ret_near(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let ip = cpu.pop_word(bus);
    cpu.near_jump(ip);
}

pub fn ret_near_imm(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let ip = cpu.pop_word(bus);
    cpu.near_jump(ip);
    adjust_sp(cpu, bus);
}

pub fn ret_far(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let ip = cpu.pop_word(bus);
    let cs = cpu.pop_word(bus);
    cpu.far_jump(cs, ip);
}

pub fn ret_far_imm(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let ip = cpu.pop_word(bus);
    let cs = cpu.pop_word(bus);
    cpu.far_jump(cs, ip);
    adjust_sp(cpu, bus);
}

fn adjust_sp(cpu: &mut Cpu, bus: &mut dyn Bus) {
    let imm = cpu.read_loc(bus, cpu.src_loc(), Width::Word) as u16;
    let sp = cpu.sp().wrapping_add(imm);
    cpu.set_sp(sp);
}

/// Retires immediately; the base 3-cycle charge and the +5-per-tick charge
/// while `test_pin` is asserted are both modeled in
/// [`crate::cpu::Cpu::step_executing`], which re-enters this no-op handler
/// each tick the pin holds it up.
pub fn wait(_cpu: &mut Cpu, _bus: &mut dyn Bus) {}

pub fn hlt(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.set_halted(true);
}

pub fn clc(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.flags_mut().set(Flags::CF, false);
}

pub fn stc(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.flags_mut().set(Flags::CF, true);
}

pub fn cmc(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    let cf = cpu.flags().contains(Flags::CF);
    cpu.flags_mut().set(Flags::CF, !cf);
}

pub fn cli(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.flags_mut().set(Flags::IF, false);
}

pub fn sti(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.flags_mut().set(Flags::IF, true);
}

pub fn cld(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.flags_mut().set(Flags::DF, false);
}

pub fn std_(cpu: &mut Cpu, _bus: &mut dyn Bus) {
    cpu.flags_mut().set(Flags::DF, true);
}
