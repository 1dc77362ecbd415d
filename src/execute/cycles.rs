//! Instruction execution cost, keyed on `(destination_category,
//! source_category)` pairs per the canonical 8086 timing table. Charged on
//! top of whatever effective-address computation cost the decoder already
//! stalled for; the separate odd-address word-access penalty is charged at
//! the point of the actual bus access, in [`crate::cpu::Cpu::read_loc`] and
//! `write_loc`.

use crate::decode::table::{OpcodeEntry, OperandDescriptor};
use crate::operand::OperandLocation;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Category {
    Reg,
    Mem,
    /// The `mov AL/AX, moffs` and `mov moffs, AL/AX` direct forms, which the
    /// 8086 times as a single fixed cost regardless of direction.
    MemAcc,
    Imm,
    None,
}

fn category(desc: OperandDescriptor, loc: OperandLocation) -> Category {
    match desc {
        OperandDescriptor::Imm | OperandDescriptor::Imm8 => Category::Imm,
        OperandDescriptor::Addr => Category::MemAcc,
        OperandDescriptor::None | OperandDescriptor::SegOff => Category::None,
        _ if loc.is_memory() => Category::Mem,
        _ if loc == OperandLocation::None => Category::None,
        _ => Category::Reg,
    }
}

const ALU_MNEMONICS: [&str; 11] =
    ["ADD", "OR", "ADC", "SBB", "AND", "SUB", "XOR", "CMP", "TEST", "INC", "DEC"];

fn alu_cost(mnemonic: &str, dest: Category, src: Category) -> u32 {
    // CMP/TEST never write their result back, so memory-destination forms
    // skip the write-back bus cycle the other ALU ops pay for.
    let no_writeback = mnemonic == "CMP" || mnemonic == "TEST";
    match (dest, src) {
        (Category::Reg, Category::Reg) | (Category::Reg, Category::None) => 3,
        (Category::Reg, Category::Mem) => 9,
        (Category::Mem, Category::Reg) | (Category::Mem, Category::None) => {
            if no_writeback {
                9
            } else {
                16
            }
        }
        (Category::Reg, Category::Imm) => 4,
        (Category::Mem, Category::Imm) => {
            if no_writeback {
                10
            } else {
                17
            }
        }
        _ => 3,
    }
}

fn mov_cost(dest: Category, src: Category) -> u32 {
    if dest == Category::MemAcc || src == Category::MemAcc {
        return 10;
    }
    match (dest, src) {
        (Category::Reg, Category::Reg) => 2,
        (Category::Reg, Category::Mem) => 8,
        (Category::Mem, Category::Reg) => 9,
        (Category::Reg, Category::Imm) => 4,
        (Category::Mem, Category::Imm) => 10,
        _ => 2,
    }
}

/// `repeated` is false for an unprefixed string op or the first iteration of
/// a `REP`-prefixed one; true for every iteration after the first.
fn string_cost(mnemonic: &str, repeated: bool) -> u32 {
    match mnemonic {
        "MOVSB" | "MOVSW" => {
            if repeated {
                17
            } else {
                18
            }
        }
        "STOSB" | "STOSW" => {
            if repeated {
                10
            } else {
                11
            }
        }
        "LODSB" | "LODSW" => {
            if repeated {
                13
            } else {
                12
            }
        }
        "CMPSB" | "CMPSW" => 22,
        "SCASB" | "SCASW" => 15,
        _ => 0,
    }
}

/// The execution-stage cycle charge for one dispatch of `entry`, given its
/// resolved operand locations. `rep_iteration` is 0 for the first (or only)
/// pass and counts up for each subsequent `REP`-driven iteration.
pub fn charge_for(
    entry: OpcodeEntry,
    dest: OperandLocation,
    src: OperandLocation,
    rep_iteration: u32,
) -> u32 {
    if entry.string_op {
        return string_cost(entry.mnemonic, rep_iteration > 0);
    }
    if entry.mnemonic == "MOV" {
        return mov_cost(category(entry.dest, dest), category(entry.src, src));
    }
    if entry.mnemonic == "WAIT" {
        return 3;
    }
    if ALU_MNEMONICS.contains(&entry.mnemonic) {
        return alu_cost(entry.mnemonic, category(entry.dest, dest), category(entry.src, src));
    }
    // Families with no explicit entry in the timing table (control transfer,
    // stack, BCD, flag control, ...) keep the flat decode-to-execute handoff
    // cost: free if an EA was already charged for a memory operand, else 2.
    if dest.is_memory() || src.is_memory() {
        0
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::table::decode_primary;
    use crate::registers::{ByteReg, RegIndex};

    #[test]
    fn reg_reg_add_costs_three() {
        let e = decode_primary(0x01).unwrap(); // ADD Ev, Gv (Rm, Reg)
        let cost = charge_for(
            e,
            OperandLocation::Reg16(RegIndex::Ax),
            OperandLocation::Reg16(RegIndex::Cx),
            0,
        );
        assert_eq!(cost, 3);
    }

    #[test]
    fn mem_dest_add_costs_sixteen_but_cmp_costs_nine() {
        let add = decode_primary(0x01).unwrap();
        let cmp = decode_primary(0x39).unwrap();
        let dest = OperandLocation::Mem(0x100);
        let src = OperandLocation::Reg16(RegIndex::Cx);
        assert_eq!(charge_for(add, dest, src, 0), 16);
        assert_eq!(charge_for(cmp, dest, src, 0), 9);
    }

    #[test]
    fn mov_moffs_form_always_costs_ten() {
        let e = decode_primary(0xA2).unwrap(); // MOV moffs8, AL
        let cost = charge_for(e, OperandLocation::Mem(0x10), OperandLocation::Reg8(ByteReg::Al), 0);
        assert_eq!(cost, 10);
    }

    #[test]
    fn rep_movsb_charges_eighteen_then_seventeen_per_iteration() {
        let e = decode_primary(0xA4).unwrap();
        let dest = OperandLocation::Str(0x200);
        let src = OperandLocation::Str(0x100);
        assert_eq!(charge_for(e, dest, src, 0), 18);
        assert_eq!(charge_for(e, dest, src, 1), 17);
    }
}
