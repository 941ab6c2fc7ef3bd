//! MIPS32
//!
//! MIPS keeps no implicit flags register; comparisons write GPRs.

use emu_core::GuestArch;

use super::{RegDef, RegTable};

const REGS: &[RegDef] = &[
    RegDef::full("zero", 0, 32),
    RegDef::full("at", 1, 32),
    RegDef::full("v0", 2, 32),
    RegDef::full("v1", 3, 32),
    RegDef::full("a0", 4, 32),
    RegDef::full("a1", 5, 32),
    RegDef::full("a2", 6, 32),
    RegDef::full("a3", 7, 32),
    RegDef::full("t0", 8, 32),
    RegDef::full("t1", 9, 32),
    RegDef::full("t2", 10, 32),
    RegDef::full("t3", 11, 32),
    RegDef::full("t4", 12, 32),
    RegDef::full("t5", 13, 32),
    RegDef::full("t6", 14, 32),
    RegDef::full("t7", 15, 32),
    RegDef::full("s0", 16, 32),
    RegDef::full("s1", 17, 32),
    RegDef::full("s2", 18, 32),
    RegDef::full("s3", 19, 32),
    RegDef::full("s4", 20, 32),
    RegDef::full("s5", 21, 32),
    RegDef::full("s6", 22, 32),
    RegDef::full("s7", 23, 32),
    RegDef::full("t8", 24, 32),
    RegDef::full("t9", 25, 32),
    RegDef::full("k0", 26, 32),
    RegDef::full("k1", 27, 32),
    RegDef::full("gp", 28, 32),
    RegDef::full("sp", 29, 32),
    RegDef::full("s8", 30, 32),
    RegDef::full("ra", 31, 32),
    RegDef::full("pc", 32, 32),
    RegDef::full("hi", 33, 32),
    RegDef::full("lo", 34, 32),
    RegDef::full("cp0_status", 35, 32),
    RegDef::full("cp0_cause", 36, 32),
    RegDef::full("cp0_epc", 37, 32),
    RegDef::full("cp0_config3", 38, 32),
    RegDef::full("cp0_userlocal", 39, 32),
    // aliases
    RegDef::full("fp", 30, 32),
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
    RegDef::full("r13", 13, 32),
    RegDef::full("r14", 14, 32),
    RegDef::full("r15", 15, 32),
    RegDef::full("r16", 16, 32),
    RegDef::full("r17", 17, 32),
    RegDef::full("r18", 18, 32),
    RegDef::full("r19", 19, 32),
    RegDef::full("r20", 20, 32),
    RegDef::full("r21", 21, 32),
    RegDef::full("r22", 22, 32),
    RegDef::full("r23", 23, 32),
    RegDef::full("r24", 24, 32),
    RegDef::full("r25", 25, 32),
    RegDef::full("r26", 26, 32),
    RegDef::full("r27", 27, 32),
    RegDef::full("r28", 28, 32),
    RegDef::full("r29", 29, 32),
    RegDef::full("r30", 30, 32),
    RegDef::full("r31", 31, 32),
];

pub static TABLE: RegTable = RegTable {
    arch: GuestArch::Mips,
    regs: REGS,
    pc: "pc",
    sp: "sp",
    flags: None,
    link: Some("ra"),
};
