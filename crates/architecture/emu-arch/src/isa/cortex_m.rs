//! ARM Cortex-M
//!
//! `ipsr`, `epsr` and `apsr` are views into `xpsr`; `msp` and `psp` are the
//! banked stack pointers behind `sp`.

use emu_core::GuestArch;

use super::{RegDef, RegTable};

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
    RegDef::full("xpsr", 16, 32),
    RegDef::sub("ipsr", 16, 0, 9),
    RegDef::sub("epsr", 16, 24, 1),
    RegDef::sub("apsr", 16, 27, 5),
    RegDef::full("msp", 17, 32),
    RegDef::full("psp", 18, 32),
    RegDef::full("control", 19, 32),
    RegDef::full("primask", 20, 32),
    RegDef::full("basepri", 21, 32),
    RegDef::full("faultmask", 22, 32),
    // aliases
    RegDef::full("r13", 13, 32),
    RegDef::full("r14", 14, 32),
    RegDef::full("r15", 15, 32),
];

pub static TABLE: RegTable = RegTable {
    arch: GuestArch::CortexM,
    regs: REGS,
    pc: "pc",
    sp: "sp",
    flags: Some("apsr"),
    link: Some("lr"),
};
