//! ARM coprocessor and system register access
//!
//! AArch32 coprocessor registers are addressed by `coproc/opc1/CRn/CRm/opc2`
//! plus the owning exception level; AArch64 system registers by
//! `op0/op1/CRn/CRm/op2`. Both are routed through the CPU engine.

use emu_core::{EmuError, Result};

use crate::context::SharedEngine;

/// AArch32 coprocessor register selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CprReg {
    /// 0..=15
    pub coproc: u8,
    /// 0..=7
    pub opc1: u8,
    /// 0..=15
    pub crn: u8,
    /// 0..=15
    pub crm: u8,
    /// 0..=7
    pub opc2: u8,
    /// 0..=3
    pub el: u8,
    pub is_64: bool,
}

impl CprReg {
    pub fn new(coproc: u8, opc1: u8, crn: u8, crm: u8, opc2: u8) -> Self {
        Self {
            coproc,
            opc1,
            crn,
            crm,
            opc2,
            el: 0,
            is_64: false,
        }
    }

    pub fn at_el(mut self, el: u8) -> Self {
        self.el = el;
        self
    }

    pub fn wide(mut self) -> Self {
        self.is_64 = true;
        self
    }

    fn validate(&self) -> Result<()> {
        check("coproc", self.coproc, 15)?;
        check("opc1", self.opc1, 7)?;
        check("crn", self.crn, 15)?;
        check("crm", self.crm, 15)?;
        check("opc2", self.opc2, 7)?;
        check("el", self.el, 3)
    }
}

/// AArch64 system register selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SysReg {
    pub op0: u8,
    pub op1: u8,
    pub crn: u8,
    pub crm: u8,
    pub op2: u8,
}

impl SysReg {
    pub const fn new(op0: u8, op1: u8, crn: u8, crm: u8, op2: u8) -> Self {
        Self {
            op0,
            op1,
            crn,
            crm,
            op2,
        }
    }

    fn validate(&self) -> Result<()> {
        check("op0", self.op0, 3)?;
        check("op1", self.op1, 7)?;
        check("crn", self.crn, 15)?;
        check("crm", self.crm, 15)?;
        check("op2", self.op2, 7)
    }
}

/// A coprocessor access as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CprAccess {
    Aarch32(CprReg),
    Aarch64(SysReg),
}

impl CprAccess {
    /// Register width in bits
    pub fn width(&self) -> u32 {
        match self {
            CprAccess::Aarch32(reg) if !reg.is_64 => 32,
            _ => 64,
        }
    }
}

fn check(field: &str, value: u8, max: u8) -> Result<()> {
    if value > max {
        return Err(EmuError::InvalidConfig(format!(
            "coprocessor field {field}={value} out of range 0..={max}"
        )));
    }
    Ok(())
}

/// AArch32 coprocessor register access
pub struct CprManager {
    engine: SharedEngine,
}

impl CprManager {
    pub(crate) fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }

    pub fn read(&self, reg: CprReg) -> Result<u64> {
        reg.validate()?;
        self.engine.borrow().cpr_read(&CprAccess::Aarch32(reg))
    }

    pub fn write(&self, reg: CprReg, value: u64) -> Result<()> {
        reg.validate()?;
        self.engine
            .borrow_mut()
            .cpr_write(&CprAccess::Aarch32(reg), value)
    }
}

/// AArch64 system register access
pub struct Cpr64Manager {
    engine: SharedEngine,
}

impl Cpr64Manager {
    /// TPIDR_EL0
    pub const TPIDR_EL0: SysReg = SysReg::new(3, 3, 13, 0, 2);
    /// CPACR_EL1
    pub const CPACR_EL1: SysReg = SysReg::new(3, 0, 1, 0, 2);

    pub(crate) fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }

    pub fn read(&self, reg: SysReg) -> Result<u64> {
        reg.validate()?;
        self.engine.borrow().cpr_read(&CprAccess::Aarch64(reg))
    }

    pub fn write(&self, reg: SysReg, value: u64) -> Result<()> {
        reg.validate()?;
        self.engine
            .borrow_mut()
            .cpr_write(&CprAccess::Aarch64(reg), value)
    }
}
