//! The primary opcode table and the `0x80-0x83` immediate-group table.
//!
//! Each entry names a destination/source operand descriptor pair, a width
//! flag, whether the opcode is a string primitive (for REP handling), and a
//! handler function pointer. Prefix bytes and illegal opcodes are handled by
//! their own table entries or by the `None` fallthrough — never by a null
//! function pointer checked at dispatch time.

use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::execute;

/// Where an operand comes from, before resolution into an
/// [`crate::operand::OperandLocation`]. Generic `Rm`/`Reg`/`Imm` descriptors
/// are interpreted as byte or word by the opcode's `word` flag.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum OperandDescriptor {
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
    Es,
    Cs,
    Ss,
    Ds,
    /// The ModR/M `rm` operand (register or memory, per `mod`).
    Rm,
    /// The ModR/M `reg` operand (always a register).
    Reg,
    /// The ModR/M `reg` operand reinterpreted as a segment register (0x8C/0x8E).
    Sreg,
    /// An immediate, width per the opcode's `word` flag.
    Imm,
    /// A byte immediate sign-extended to word width (group `0x83` only).
    Imm8,
    /// A direct memory address (`moffs`), 16-bit offset into DS.
    Addr,
    /// A 32-bit packed segment:offset (far CALL/JMP).
    SegOff,
    /// `DS:SI`, overridable by a segment-override prefix.
    StrSrc,
    /// `ES:DI`, never overridable.
    StrDst,
    /// No operand.
    None,
}

pub type Handler = fn(&mut Cpu, &mut dyn Bus);

#[derive(Debug, Clone, Copy)]
pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub dest: OperandDescriptor,
    pub src: OperandDescriptor,
    /// True if register/memory operands of this opcode are word-sized.
    pub word: bool,
    /// True for MOVS/CMPS/STOS/LODS/SCAS (eligible for REP looping).
    pub string_op: bool,
    pub handler: Handler,
}

const fn entry(
    mnemonic: &'static str,
    dest: OperandDescriptor,
    src: OperandDescriptor,
    word: bool,
    string_op: bool,
    handler: Handler,
) -> OpcodeEntry {
    OpcodeEntry {
        mnemonic,
        dest,
        src,
        word,
        string_op,
        handler,
    }
}

use OperandDescriptor::*;

/// The eight canonical ALU operations, in `reg`-field / opcode-block order:
/// ADD, OR, ADC, SBB, AND, SUB, XOR, CMP.
const ALU_NAMES: [&str; 8] = ["ADD", "OR", "ADC", "SBB", "AND", "SUB", "XOR", "CMP"];
const ALU_HANDLERS: [Handler; 8] = [
    execute::arith::add,
    execute::arith::or,
    execute::arith::adc,
    execute::arith::sbb,
    execute::arith::and,
    execute::arith::sub,
    execute::arith::xor,
    execute::arith::cmp,
];

/// Decode one of the eight `op Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev / AL,Ib / AX,Iv`
/// six-opcode ALU blocks (`0x00`, `0x08`, `0x10`, ... `0x38`).
fn decode_alu_block(opcode: u8) -> Option<OpcodeEntry> {
    if opcode >= 0xC0 {
        return Option::None;
    }
    let block = opcode >> 3;
    let slot = opcode & 0x7;
    if slot > 5 {
        return Option::None;
    }
    let name = ALU_NAMES[block as usize];
    let handler = ALU_HANDLERS[block as usize];
    Some(match slot {
        0 => entry(name, Rm, Reg, false, false, handler),
        1 => entry(name, Rm, Reg, true, false, handler),
        2 => entry(name, Reg, Rm, false, false, handler),
        3 => entry(name, Reg, Rm, true, false, handler),
        4 => entry(name, Al, Imm, false, false, handler),
        _ => entry(name, Ax, Imm, true, false, handler),
    })
}

fn word_reg_descriptor(field: u8) -> OperandDescriptor {
    [Ax, Cx, Dx, Bx, Sp, Bp, Si, Di][field as usize]
}

fn byte_reg_descriptor(field: u8) -> OperandDescriptor {
    [Al, Cl, Dl, Bl, Ah, Ch, Dh, Bh][field as usize]
}

/// The 16 condition-code mnemonics for `0x70..=0x7F`.
pub const JCC_MNEMONICS: [&str; 16] = [
    "JO", "JNO", "JB", "JAE", "JE", "JNE", "JBE", "JA", "JS", "JNS", "JP", "JNP", "JL", "JGE",
    "JLE", "JG",
];

/// Look up the primary opcode table entry for a (post-prefix) opcode byte.
/// `None` means illegal/unimplemented — the caller raises
/// `CpuSignal::IllegalOpcode`.
pub fn decode_primary(opcode: u8) -> Option<OpcodeEntry> {
    if (0x70..=0x7F).contains(&opcode) {
        let cc = (opcode - 0x70) as usize;
        return Some(entry(
            JCC_MNEMONICS[cc],
            OperandDescriptor::None,
            Imm8,
            false,
            false,
            execute::control::jcc_handlers()[cc],
        ));
    }
    if (0x40..=0x47).contains(&opcode) {
        return Some(entry(
            "INC",
            word_reg_descriptor(opcode - 0x40),
            OperandDescriptor::None,
            true,
            false,
            execute::arith::inc_reg,
        ));
    }
    if (0x48..=0x4F).contains(&opcode) {
        return Some(entry(
            "DEC",
            word_reg_descriptor(opcode - 0x48),
            OperandDescriptor::None,
            true,
            false,
            execute::arith::dec_reg,
        ));
    }
    if (0x50..=0x57).contains(&opcode) {
        return Some(entry(
            "PUSH",
            word_reg_descriptor(opcode - 0x50),
            OperandDescriptor::None,
            true,
            false,
            execute::data::push,
        ));
    }
    if (0x58..=0x5F).contains(&opcode) {
        return Some(entry(
            "POP",
            word_reg_descriptor(opcode - 0x58),
            OperandDescriptor::None,
            true,
            false,
            execute::data::pop,
        ));
    }
    if (0x91..=0x97).contains(&opcode) {
        return Some(entry(
            "XCHG",
            Ax,
            word_reg_descriptor(opcode - 0x90),
            true,
            false,
            execute::data::xchg,
        ));
    }
    if (0xB0..=0xB7).contains(&opcode) {
        return Some(entry(
            "MOV",
            byte_reg_descriptor(opcode - 0xB0),
            Imm,
            false,
            false,
            execute::data::mov,
        ));
    }
    if (0xB8..=0xBF).contains(&opcode) {
        return Some(entry(
            "MOV",
            word_reg_descriptor(opcode - 0xB8),
            Imm,
            true,
            false,
            execute::data::mov,
        ));
    }

    match opcode {
        0x06 => Some(entry("PUSH", Es, OperandDescriptor::None, true, false, execute::data::push)),
        0x07 => Some(entry("POP", Es, OperandDescriptor::None, true, false, execute::data::pop)),
        0x0E => Some(entry("PUSH", Cs, OperandDescriptor::None, true, false, execute::data::push)),
        0x16 => Some(entry("PUSH", Ss, OperandDescriptor::None, true, false, execute::data::push)),
        0x17 => Some(entry("POP", Ss, OperandDescriptor::None, true, false, execute::data::pop)),
        0x1E => Some(entry("PUSH", Ds, OperandDescriptor::None, true, false, execute::data::push)),
        0x1F => Some(entry("POP", Ds, OperandDescriptor::None, true, false, execute::data::pop)),
        0x27 => Some(entry("DAA", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::bcd::daa)),
        0x2F => Some(entry("DAS", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::bcd::das)),
        0x37 => Some(entry("AAA", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::bcd::aaa)),
        0x3F => Some(entry("AAS", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::bcd::aas)),
        0x84 => Some(entry("TEST", Rm, Reg, false, false, execute::arith::test)),
        0x85 => Some(entry("TEST", Rm, Reg, true, false, execute::arith::test)),
        0x86 => Some(entry("XCHG", Rm, Reg, false, false, execute::data::xchg)),
        0x87 => Some(entry("XCHG", Rm, Reg, true, false, execute::data::xchg)),
        0x88 => Some(entry("MOV", Rm, Reg, false, false, execute::data::mov)),
        0x89 => Some(entry("MOV", Rm, Reg, true, false, execute::data::mov)),
        0x8A => Some(entry("MOV", Reg, Rm, false, false, execute::data::mov)),
        0x8B => Some(entry("MOV", Reg, Rm, true, false, execute::data::mov)),
        0x8C => Some(entry("MOV", Rm, Sreg, true, false, execute::data::mov)),
        0x8D => Some(entry("LEA", Reg, Rm, true, false, execute::data::lea)),
        0x8E => Some(entry("MOV", Sreg, Rm, true, false, execute::data::mov)),
        0x8F => Some(entry("POP", Rm, OperandDescriptor::None, true, false, execute::data::pop)),
        0x90 => Some(entry("NOP", Ax, Ax, true, false, execute::data::xchg)),
        0x98 => Some(entry("CBW", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::data::cbw)),
        0x99 => Some(entry("CWD", OperandDescriptor::None, OperandDescriptor::None, true, false, execute::data::cwd)),
        0x9A => Some(entry("CALL", OperandDescriptor::None, SegOff, true, false, execute::control::call_far)),
        0x9B => Some(entry("WAIT", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::wait)),
        0x9C => Some(entry("PUSHF", OperandDescriptor::None, OperandDescriptor::None, true, false, execute::data::pushf)),
        0x9D => Some(entry("POPF", OperandDescriptor::None, OperandDescriptor::None, true, false, execute::data::popf)),
        0x9E => Some(entry("SAHF", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::data::sahf)),
        0x9F => Some(entry("LAHF", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::data::lahf)),
        0xA0 => Some(entry("MOV", Al, Addr, false, false, execute::data::mov)),
        0xA1 => Some(entry("MOV", Ax, Addr, true, false, execute::data::mov)),
        0xA2 => Some(entry("MOV", Addr, Al, false, false, execute::data::mov)),
        0xA3 => Some(entry("MOV", Addr, Ax, true, false, execute::data::mov)),
        0xA4 => Some(entry("MOVSB", StrDst, StrSrc, false, true, execute::string::movs)),
        0xA5 => Some(entry("MOVSW", StrDst, StrSrc, true, true, execute::string::movs)),
        0xA6 => Some(entry("CMPSB", StrDst, StrSrc, false, true, execute::string::cmps)),
        0xA7 => Some(entry("CMPSW", StrDst, StrSrc, true, true, execute::string::cmps)),
        0xA8 => Some(entry("TEST", Al, Imm, false, false, execute::arith::test)),
        0xA9 => Some(entry("TEST", Ax, Imm, true, false, execute::arith::test)),
        0xAA => Some(entry("STOSB", StrDst, Al, false, true, execute::string::stos)),
        0xAB => Some(entry("STOSW", StrDst, Ax, true, true, execute::string::stos)),
        0xAC => Some(entry("LODSB", Al, StrSrc, false, true, execute::string::lods)),
        0xAD => Some(entry("LODSW", Ax, StrSrc, true, true, execute::string::lods)),
        0xAE => Some(entry("SCASB", Al, StrDst, false, true, execute::string::scas)),
        0xAF => Some(entry("SCASW", Ax, StrDst, true, true, execute::string::scas)),
        0xC2 => Some(entry("RET", OperandDescriptor::None, Imm, true, false, execute::control::ret_near_imm)),
        0xC3 => Some(entry("RET", OperandDescriptor::None, OperandDescriptor::None, true, false, execute::control::ret_near)),
        0xC4 => Some(entry("LES", Reg, Rm, true, false, execute::data::les)),
        0xC5 => Some(entry("LDS", Reg, Rm, true, false, execute::data::lds)),
        0xC6 => Some(entry("MOV", Rm, Imm, false, false, execute::data::mov)),
        0xC7 => Some(entry("MOV", Rm, Imm, true, false, execute::data::mov)),
        0xCA => Some(entry("RETF", OperandDescriptor::None, Imm, true, false, execute::control::ret_far_imm)),
        0xCB => Some(entry("RETF", OperandDescriptor::None, OperandDescriptor::None, true, false, execute::control::ret_far)),
        0xE8 => Some(entry("CALL", OperandDescriptor::None, Imm, true, false, execute::control::call_near)),
        0xE9 => Some(entry("JMP", OperandDescriptor::None, Imm, true, false, execute::control::jmp_near)),
        0xEA => Some(entry("JMP", OperandDescriptor::None, SegOff, true, false, execute::control::jmp_far)),
        0xEB => Some(entry("JMP", OperandDescriptor::None, Imm8, false, false, execute::control::jmp_short)),
        0xF4 => Some(entry("HLT", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::hlt)),
        0xF5 => Some(entry("CMC", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::cmc)),
        0xF8 => Some(entry("CLC", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::clc)),
        0xF9 => Some(entry("STC", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::stc)),
        0xFA => Some(entry("CLI", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::cli)),
        0xFB => Some(entry("STI", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::sti)),
        0xFC => Some(entry("CLD", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::cld)),
        0xFD => Some(entry("STD", OperandDescriptor::None, OperandDescriptor::None, false, false, execute::control::std_)),
        0xFE => Some(entry("INC", Rm, OperandDescriptor::None, false, false, execute::arith::inc_dec_group_byte)),
        _ if opcode < 0x40 && (opcode & 0x7) <= 5 => decode_alu_block(opcode),
        _ => Option::None,
    }
}

/// The `0x80..=0x83` arithmetic-immediate group, keyed by the ModR/M `reg`
/// field: ADD/OR/ADC/SBB/AND/SUB/XOR/CMP.
pub fn decode_group1(opcode: u8, reg_field: u8) -> OpcodeEntry {
    let word = opcode != 0x80 && opcode != 0x82;
    let src = if opcode == 0x83 { Imm8 } else { Imm };
    const NAMES: [&str; 8] = ["ADD", "OR", "ADC", "SBB", "AND", "SUB", "XOR", "CMP"];
    const HANDLERS: [Handler; 8] = [
        execute::arith::add,
        execute::arith::or,
        execute::arith::adc,
        execute::arith::sbb,
        execute::arith::and,
        execute::arith::sub,
        execute::arith::xor,
        execute::arith::cmp,
    ];
    let idx = (reg_field & 0x7) as usize;
    entry(NAMES[idx], Rm, src, word, false, HANDLERS[idx])
}

/// True for opcodes that carry a ModR/M byte.
pub fn entry_uses_modrm(e: &OpcodeEntry) -> bool {
    matches!(
        e.dest,
        Rm | Reg | Sreg
    ) || matches!(e.src, Rm | Reg | Sreg)
}

pub fn is_group1_opcode(opcode: u8) -> bool {
    matches!(opcode, 0x80..=0x83)
}
