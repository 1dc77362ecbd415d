//! ModR/M byte decomposition and effective-address computation.

use crate::registers::{RegIndex, SegIndex};

/// A decomposed ModR/M byte.
#[derive(Debug, Clone, Copy)]
pub struct ModRm {
    pub md: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub fn decode(byte: u8) -> ModRm {
        ModRm {
            md: (byte >> 6) & 0x3,
            reg: (byte >> 3) & 0x7,
            rm: byte & 0x7,
        }
    }

    /// True if `rm` (combined with `mod`) names a register rather than
    /// memory — mode `0b11` always does.
    pub fn is_register(&self) -> bool {
        self.md == 0b11
    }

    /// True if this encoding needs a displacement byte at all
    /// (`mod` 01/10, or the `mod=00, rm=110` direct-address special case).
    pub fn needs_disp(&self) -> bool {
        self.md == 0b01 || self.md == 0b10 || (self.md == 0b00 && self.rm == 0b110)
    }

    /// True if the displacement is a full 16-bit word rather than a
    /// sign-extended byte.
    pub fn needs_disp16(&self) -> bool {
        self.md == 0b10 || (self.md == 0b00 && self.rm == 0b110)
    }
}

/// One row of the effective-address table: the base registers combined to
/// form the address (at most two), the default segment, and the additional
/// EA cycle cost per the Intel timing tables (excludes the displacement
/// fetch, charged separately).
#[derive(Debug, Clone, Copy)]
pub struct EaComponents {
    pub base: Option<RegIndex>,
    pub index: Option<RegIndex>,
    pub default_seg: SegIndex,
    pub cycles: u32,
}

/// Resolve the `mod=00/01/10, rm` table into its base/index registers,
/// default segment, and cycle cost. `rm=110` with `mod=00` is the direct
/// address special case and is handled by the caller (no base register).
pub fn ea_components(rm: u8) -> EaComponents {
    use RegIndex::*;
    use SegIndex::Ds;
    match rm {
        0b000 => EaComponents { base: Some(Bx), index: Some(Si), default_seg: Ds, cycles: 7 },
        0b001 => EaComponents { base: Some(Bx), index: Some(Di), default_seg: Ds, cycles: 8 },
        0b010 => EaComponents { base: Some(Bp), index: Some(Si), default_seg: SegIndex::Ss, cycles: 8 },
        0b011 => EaComponents { base: Some(Bp), index: Some(Di), default_seg: SegIndex::Ss, cycles: 7 },
        0b100 => EaComponents { base: Some(Si), index: None, default_seg: Ds, cycles: 5 },
        0b101 => EaComponents { base: Some(Di), index: None, default_seg: Ds, cycles: 5 },
        0b110 => EaComponents { base: Some(Bp), index: None, default_seg: SegIndex::Ss, cycles: 5 },
        0b111 => EaComponents { base: Some(Bx), index: None, default_seg: Ds, cycles: 5 },
        _ => unreachable!("rm is a 3-bit field"),
    }
}

/// Cycle cost of the `mod=00, rm=110` direct-address form.
pub const DIRECT_ADDRESS_CYCLES: u32 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mod_reg_rm_fields() {
        let m = ModRm::decode(0b11_010_001);
        assert_eq!(m.md, 0b11);
        assert_eq!(m.reg, 0b010);
        assert_eq!(m.rm, 0b001);
        assert!(m.is_register());
    }

    #[test]
    fn mod_00_rm_110_is_direct_address() {
        let m = ModRm::decode(0b00_000_110);
        assert!(m.needs_disp());
        assert!(m.needs_disp16());
    }

    #[test]
    fn mod_01_takes_one_displacement_byte() {
        let m = ModRm::decode(0b01_000_000);
        assert!(m.needs_disp());
        assert!(!m.needs_disp16());
    }

    #[test]
    fn bp_based_modes_default_to_stack_segment() {
        assert_eq!(ea_components(0b010).default_seg, SegIndex::Ss);
        assert_eq!(ea_components(0b110).default_seg, SegIndex::Ss);
        assert_eq!(ea_components(0b000).default_seg, SegIndex::Ds);
    }
}
