//! ARM (AArch32)

use emu_core::GuestArch;

use super::{RegDef, RegTable};

/// Thumb state bit in CPSR
pub const CPSR_THUMB: u64 = 1 << 5;

const REGS: &[RegDef] = &[
    RegDef::full("r0", 0, 32),
    RegDef::full("r1", 1, 32),
    RegDef::full("r2", 2, 32),
    RegDef::full("r3", 3, 32),
    RegDef::full("r4", 4, 32),
    RegDef::full("r5", 5, 32),
    RegDef::full("r6", 6, 32),
    RegDef::full("r7", 7, 32),
    RegDef::full("r8", 8, 32),
    RegDef::full("r9", 9, 32),
    RegDef::full("r10", 10, 32),
    RegDef::full("r11", 11, 32),
    RegDef::full("r12", 12, 32),
    RegDef::full("sp", 13, 32),
    RegDef::full("lr", 14, 32),
    RegDef::full("pc", 15, 32),
    RegDef::full("cpsr", 16, 32),
    RegDef::full("spsr", 17, 32),
    RegDef::full("fpexc", 18, 32),
    RegDef::full("fpscr", 19, 32),
    RegDef::full("c1_c0_2", 20, 32),
    RegDef::full("c13_c0_3", 21, 32),
    // aliases
    RegDef::full("sb", 9, 32),
    RegDef::full("sl", 10, 32),
    RegDef::full("fp", 11, 32),
    RegDef::full("ip", 12, 32),
    RegDef::full("r13", 13, 32),
    RegDef::full("r14", 14, 32),
    RegDef::full("r15", 15, 32),
];

pub static TABLE: RegTable = RegTable {
    arch: GuestArch::Arm,
    regs: REGS,
    pc: "pc",
    sp: "sp",
    flags: Some("cpsr"),
    link: Some("lr"),
};
