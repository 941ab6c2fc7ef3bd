//! 寄存器表（Register tables）
//!
//! Each ISA describes its register file as a flat table of named views onto
//! storage slots. Sub-registers and aliases are extra entries pointing at the
//! same slot with a different shift/width, so `al`, `ax`, `eax` and `rax`
//! all resolve to slot 0 on x86-64.

use emu_core::GuestArch;

pub mod arm;
pub mod arm64;
pub mod cortex_m;
pub mod mips;
pub mod x86;
pub mod x8664;

/// One named view onto a storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegDef {
    pub name: &'static str,
    pub slot: u16,
    pub shift: u8,
    pub bits: u8,
    /// Writes clear the rest of the slot (x86-64 32-bit GPR writes)
    pub zero_extend: bool,
}

impl RegDef {
    /// A view covering a whole slot
    pub const fn full(name: &'static str, slot: u16, bits: u8) -> Self {
        Self {
            name,
            slot,
            shift: 0,
            bits,
            zero_extend: false,
        }
    }

    /// A partial view of a slot
    pub const fn sub(name: &'static str, slot: u16, shift: u8, bits: u8) -> Self {
        Self {
            name,
            slot,
            shift,
            bits,
            zero_extend: false,
        }
    }

    /// A low view whose writes zero the upper part of the slot
    pub const fn zx(name: &'static str, slot: u16, bits: u8) -> Self {
        Self {
            name,
            slot,
            shift: 0,
            bits,
            zero_extend: true,
        }
    }

    pub fn mask(&self) -> u64 {
        width_mask(self.bits as u32)
    }
}

/// Value mask for a field of `bits` bits
pub fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Register file description of one ISA
#[derive(Debug)]
pub struct RegTable {
    pub arch: GuestArch,
    pub regs: &'static [RegDef],
    pub pc: &'static str,
    pub sp: &'static str,
    /// Implicit flags register, if the ISA has one
    pub flags: Option<&'static str>,
    /// Return-address register for register-linked ISAs
    pub link: Option<&'static str>,
}

impl RegTable {
    pub fn find(&self, name: &str) -> Option<(usize, &RegDef)> {
        self.regs.iter().enumerate().find(|(_, r)| r.name == name)
    }

    /// Number of storage slots the table addresses
    pub fn slot_count(&self) -> usize {
        self.regs.iter().map(|r| r.slot as usize + 1).max().unwrap_or(0)
    }
}

/// Register table of `arch`
pub fn reg_table(arch: GuestArch) -> &'static RegTable {
    match arch {
        GuestArch::X86 => &x86::TABLE,
        GuestArch::X8664 => &x8664::TABLE,
        GuestArch::Arm => &arm::TABLE,
        GuestArch::Arm64 => &arm64::TABLE,
        GuestArch::CortexM => &cortex_m::TABLE,
        GuestArch::Mips => &mips::TABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tables_are_consistent() {
        for &arch in GuestArch::all() {
            let table = reg_table(arch);
            assert_eq!(table.arch, arch);

            let mut seen = HashSet::new();
            for reg in table.regs {
                assert!(seen.insert(reg.name), "{arch}: duplicate register {}", reg.name);
                assert!(reg.shift as u32 + reg.bits as u32 <= 64);
            }
            assert!(table.find(table.pc).is_some(), "{arch}: pc missing");
            assert!(table.find(table.sp).is_some(), "{arch}: sp missing");
            if let Some(flags) = table.flags {
                assert!(table.find(flags).is_some());
            }
            if let Some(link) = table.link {
                assert!(table.find(link).is_some());
            }
        }
    }

    #[test]
    fn test_width_mask() {
        assert_eq!(width_mask(8), 0xff);
        assert_eq!(width_mask(64), u64::MAX);
    }
}
