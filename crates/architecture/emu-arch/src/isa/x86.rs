//! x86 (32-bit)

use emu_core::GuestArch;

use super::{RegDef, RegTable};

const REGS: &[RegDef] = &[
    RegDef::full("eax", 0, 32),
    RegDef::sub("ax", 0, 0, 16),
    RegDef::sub("al", 0, 0, 8),
    RegDef::sub("ah", 0, 8, 8),
    RegDef::full("ebx", 1, 32),
    RegDef::sub("bx", 1, 0, 16),
    RegDef::sub("bl", 1, 0, 8),
    RegDef::sub("bh", 1, 8, 8),
    RegDef::full("ecx", 2, 32),
    RegDef::sub("cx", 2, 0, 16),
    RegDef::sub("cl", 2, 0, 8),
    RegDef::sub("ch", 2, 8, 8),
    RegDef::full("edx", 3, 32),
    RegDef::sub("dx", 3, 0, 16),
    RegDef::sub("dl", 3, 0, 8),
    RegDef::sub("dh", 3, 8, 8),
    RegDef::full("esi", 4, 32),
    RegDef::sub("si", 4, 0, 16),
    RegDef::full("edi", 5, 32),
    RegDef::sub("di", 5, 0, 16),
    RegDef::full("ebp", 6, 32),
    RegDef::sub("bp", 6, 0, 16),
    RegDef::full("esp", 7, 32),
    RegDef::sub("sp", 7, 0, 16),
    RegDef::full("eip", 8, 32),
    RegDef::sub("ip", 8, 0, 16),
    RegDef::full("eflags", 9, 32),
    RegDef::full("cs", 10, 16),
    RegDef::full("ds", 11, 16),
    RegDef::full("es", 12, 16),
    RegDef::full("fs", 13, 16),
    RegDef::full("gs", 14, 16),
    RegDef::full("ss", 15, 16),
    RegDef::full("cr0", 16, 32),
    RegDef::full("cr3", 17, 32),
    RegDef::full("cr4", 18, 32),
];

pub static TABLE: RegTable = RegTable {
    arch: GuestArch::X86,
    regs: REGS,
    pc: "eip",
    sp: "esp",
    flags: Some("eflags"),
    link: None,
};
