//! x86-64

use emu_core::GuestArch;

use super::{RegDef, RegTable};

const REGS: &[RegDef] = &[
    RegDef::full("rax", 0, 64),
    RegDef::zx("eax", 0, 32),
    RegDef::sub("ax", 0, 0, 16),
    RegDef::sub("al", 0, 0, 8),
    RegDef::sub("ah", 0, 8, 8),
    RegDef::full("rbx", 1, 64),
    RegDef::zx("ebx", 1, 32),
    RegDef::sub("bx", 1, 0, 16),
    RegDef::sub("bl", 1, 0, 8),
    RegDef::sub("bh", 1, 8, 8),
    RegDef::full("rcx", 2, 64),
    RegDef::zx("ecx", 2, 32),
    RegDef::sub("cx", 2, 0, 16),
    RegDef::sub("cl", 2, 0, 8),
    RegDef::sub("ch", 2, 8, 8),
    RegDef::full("rdx", 3, 64),
    RegDef::zx("edx", 3, 32),
    RegDef::sub("dx", 3, 0, 16),
    RegDef::sub("dl", 3, 0, 8),
    RegDef::sub("dh", 3, 8, 8),
    RegDef::full("rsi", 4, 64),
    RegDef::zx("esi", 4, 32),
    RegDef::sub("si", 4, 0, 16),
    RegDef::sub("sil", 4, 0, 8),
    RegDef::full("rdi", 5, 64),
    RegDef::zx("edi", 5, 32),
    RegDef::sub("di", 5, 0, 16),
    RegDef::sub("dil", 5, 0, 8),
    RegDef::full("rbp", 6, 64),
    RegDef::zx("ebp", 6, 32),
    RegDef::sub("bp", 6, 0, 16),
    RegDef::sub("bpl", 6, 0, 8),
    RegDef::full("rsp", 7, 64),
    RegDef::zx("esp", 7, 32),
    RegDef::sub("sp", 7, 0, 16),
    RegDef::sub("spl", 7, 0, 8),
    RegDef::full("r8", 8, 64),
    RegDef::zx("r8d", 8, 32),
    RegDef::sub("r8w", 8, 0, 16),
    RegDef::sub("r8b", 8, 0, 8),
    RegDef::full("r9", 9, 64),
    RegDef::zx("r9d", 9, 32),
    RegDef::sub("r9w", 9, 0, 16),
    RegDef::sub("r9b", 9, 0, 8),
    RegDef::full("r10", 10, 64),
    RegDef::zx("r10d", 10, 32),
    RegDef::sub("r10w", 10, 0, 16),
    RegDef::sub("r10b", 10, 0, 8),
    RegDef::full("r11", 11, 64),
    RegDef::zx("r11d", 11, 32),
    RegDef::sub("r11w", 11, 0, 16),
    RegDef::sub("r11b", 11, 0, 8),
    RegDef::full("r12", 12, 64),
    RegDef::zx("r12d", 12, 32),
    RegDef::sub("r12w", 12, 0, 16),
    RegDef::sub("r12b", 12, 0, 8),
    RegDef::full("r13", 13, 64),
    RegDef::zx("r13d", 13, 32),
    RegDef::sub("r13w", 13, 0, 16),
    RegDef::sub("r13b", 13, 0, 8),
    RegDef::full("r14", 14, 64),
    RegDef::zx("r14d", 14, 32),
    RegDef::sub("r14w", 14, 0, 16),
    RegDef::sub("r14b", 14, 0, 8),
    RegDef::full("r15", 15, 64),
    RegDef::zx("r15d", 15, 32),
    RegDef::sub("r15w", 15, 0, 16),
    RegDef::sub("r15b", 15, 0, 8),
    RegDef::full("rip", 16, 64),
    RegDef::zx("eip", 16, 32),
    RegDef::sub("ip", 16, 0, 16),
    RegDef::full("rflags", 17, 64),
    RegDef::zx("eflags", 17, 32),
    RegDef::full("cs", 18, 16),
    RegDef::full("ds", 19, 16),
    RegDef::full("es", 20, 16),
    RegDef::full("fs", 21, 16),
    RegDef::full("gs", 22, 16),
    RegDef::full("ss", 23, 16),
    RegDef::full("fs_base", 24, 64),
    RegDef::full("gs_base", 25, 64),
    RegDef::full("cr0", 26, 64),
    RegDef::full("cr3", 27, 64),
    RegDef::full("cr4", 28, 64),
];

pub static TABLE: RegTable = RegTable {
    arch: GuestArch::X8664,
    regs: REGS,
    pc: "rip",
    sp: "rsp",
    flags: Some("rflags"),
    link: None,
};
