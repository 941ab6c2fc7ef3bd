//! ARM64 (AArch64)

use emu_core::GuestArch;

use super::{RegDef, RegTable};

const REGS: &[RegDef] = &[
    RegDef::full("x0", 0, 64),
    RegDef::full("x1", 1, 64),
    RegDef::full("x2", 2, 64),
    RegDef::full("x3", 3, 64),
    RegDef::full("x4", 4, 64),
    RegDef::full("x5", 5, 64),
    RegDef::full("x6", 6, 64),
    RegDef::full("x7", 7, 64),
    RegDef::full("x8", 8, 64),
    RegDef::full("x9", 9, 64),
    RegDef::full("x10", 10, 64),
    RegDef::full("x11", 11, 64),
    RegDef::full("x12", 12, 64),
    RegDef::full("x13", 13, 64),
    RegDef::full("x14", 14, 64),
    RegDef::full("x15", 15, 64),
    RegDef::full("x16", 16, 64),
    RegDef::full("x17", 17, 64),
    RegDef::full("x18", 18, 64),
    RegDef::full("x19", 19, 64),
    RegDef::full("x20", 20, 64),
    RegDef::full("x21", 21, 64),
    RegDef::full("x22", 22, 64),
    RegDef::full("x23", 23, 64),
    RegDef::full("x24", 24, 64),
    RegDef::full("x25", 25, 64),
    RegDef::full("x26", 26, 64),
    RegDef::full("x27", 27, 64),
    RegDef::full("x28", 28, 64),
    RegDef::full("x29", 29, 64),
    RegDef::full("x30", 30, 64),
    RegDef::zx("w0", 0, 32),
    RegDef::zx("w1", 1, 32),
    RegDef::zx("w2", 2, 32),
    RegDef::zx("w3", 3, 32),
    RegDef::zx("w4", 4, 32),
    RegDef::zx("w5", 5, 32),
    RegDef::zx("w6", 6, 32),
    RegDef::zx("w7", 7, 32),
    RegDef::zx("w8", 8, 32),
    RegDef::zx("w9", 9, 32),
    RegDef::zx("w10", 10, 32),
    RegDef::zx("w11", 11, 32),
    RegDef::zx("w12", 12, 32),
    RegDef::zx("w13", 13, 32),
    RegDef::zx("w14", 14, 32),
    RegDef::zx("w15", 15, 32),
    RegDef::zx("w16", 16, 32),
    RegDef::zx("w17", 17, 32),
    RegDef::zx("w18", 18, 32),
    RegDef::zx("w19", 19, 32),
    RegDef::zx("w20", 20, 32),
    RegDef::zx("w21", 21, 32),
    RegDef::zx("w22", 22, 32),
    RegDef::zx("w23", 23, 32),
    RegDef::zx("w24", 24, 32),
    RegDef::zx("w25", 25, 32),
    RegDef::zx("w26", 26, 32),
    RegDef::zx("w27", 27, 32),
    RegDef::zx("w28", 28, 32),
    RegDef::zx("w29", 29, 32),
    RegDef::zx("w30", 30, 32),
    RegDef::full("sp", 31, 64),
    RegDef::full("pc", 32, 64),
    RegDef::full("nzcv", 33, 32),
    RegDef::full("tpidr_el0", 34, 64),
    RegDef::full("tpidrro_el0", 35, 64),
    RegDef::full("tpidr_el1", 36, 64),
    RegDef::full("cpacr_el1", 37, 64),
    RegDef::full("elr_el1", 38, 64),
    RegDef::full("esr_el1", 39, 64),
    RegDef::full("far_el1", 40, 64),
    RegDef::full("vbar_el1", 41, 64),
    RegDef::full("sp_el0", 42, 64),
    RegDef::full("sp_el1", 43, 64),
    RegDef::full("spsr_el1", 44, 32),
    RegDef::zx("wsp", 31, 32),
    // aliases
    RegDef::full("fp", 29, 64),
    RegDef::full("lr", 30, 64),
];

pub static TABLE: RegTable = RegTable {
    arch: GuestArch::Arm64,
    regs: REGS,
    pc: "pc",
    sp: "sp",
    flags: Some("nzcv"),
    link: Some("lr"),
};
