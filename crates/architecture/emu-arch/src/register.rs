//! 寄存器管理器（Register Manager）
//!
//! The single point of register access. Names are matched exactly
//! (case-sensitive) against the ISA table; the table's program-counter and
//! stack-pointer names back [`RegisterManager::pc`] and
//! [`RegisterManager::sp`].

use std::collections::{BTreeMap, HashMap};

use emu_core::{EmuError, Result};

use crate::context::SharedEngine;
use crate::engine::RegId;
use crate::isa::RegTable;

/// Named view over an engine's register file
pub struct RegisterManager {
    engine: SharedEngine,
    table: &'static RegTable,
    names: HashMap<&'static str, RegId>,
    pc: RegId,
    sp: RegId,
}

impl RegisterManager {
    /// Bind a register table to an engine
    ///
    /// Fails if any name maps to a register the engine does not implement, or
    /// if the table lacks its pc/sp entries.
    pub fn new(engine: SharedEngine, table: &'static RegTable) -> Result<Self> {
        let mut names = HashMap::with_capacity(table.regs.len());
        {
            let cpu = engine.borrow();
            for (idx, reg) in table.regs.iter().enumerate() {
                let id = RegId(idx as u16);
                if !cpu.implements(id) {
                    return Err(EmuError::UnknownRegister(format!(
                        "{} ({} engine lacks it)",
                        reg.name, table.arch
                    )));
                }
                names.insert(reg.name, id);
            }
        }

        let lookup = |name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| EmuError::UnknownRegister(name.to_string()))
        };
        let pc = lookup(table.pc)?;
        let sp = lookup(table.sp)?;

        Ok(Self {
            engine,
            table,
            names,
            pc,
            sp,
        })
    }

    pub fn id(&self, name: &str) -> Result<RegId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| EmuError::UnknownRegister(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn read(&self, name: &str) -> Result<u64> {
        let id = self.id(name)?;
        self.engine.borrow().reg_read(id)
    }

    pub fn write(&self, name: &str, value: u64) -> Result<()> {
        let id = self.id(name)?;
        self.engine.borrow_mut().reg_write(id, value)
    }

    pub fn pc(&self) -> Result<u64> {
        self.engine.borrow().reg_read(self.pc)
    }

    pub fn set_pc(&self, value: u64) -> Result<()> {
        self.engine.borrow_mut().reg_write(self.pc, value)
    }

    pub fn sp(&self) -> Result<u64> {
        self.engine.borrow().reg_read(self.sp)
    }

    pub fn set_sp(&self, value: u64) -> Result<()> {
        self.engine.borrow_mut().reg_write(self.sp, value)
    }

    pub fn pc_name(&self) -> &'static str {
        self.table.pc
    }

    pub fn sp_name(&self) -> &'static str {
        self.table.sp
    }

    /// Name of the implicit flags register, if the ISA has one
    pub fn flags_name(&self) -> Option<&'static str> {
        self.table.flags
    }

    /// All register names, aliases included, in table order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.regs.iter().map(|r| r.name)
    }

    /// Snapshot of every full-width register
    pub fn save(&self) -> Result<BTreeMap<&'static str, u64>> {
        let cpu = self.engine.borrow();
        let mut seen = std::collections::HashSet::new();
        let mut out = BTreeMap::new();
        for (idx, reg) in self.table.regs.iter().enumerate() {
            // the first entry of a slot is its widest view
            if reg.shift == 0 && seen.insert(reg.slot) {
                out.insert(reg.name, cpu.reg_read(RegId(idx as u16))?);
            }
        }
        Ok(out)
    }

    pub fn restore(&self, snapshot: &BTreeMap<&'static str, u64>) -> Result<()> {
        for (name, value) in snapshot {
            self.write(name, *value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RegisterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterManager")
            .field("arch", &self.table.arch)
            .field("pc", &self.table.pc)
            .field("sp", &self.table.sp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CpuEngine, EngineMode, SoftCpu};
    use crate::isa::reg_table;
    use emu_core::GuestArch;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager(arch: GuestArch, mode: EngineMode) -> RegisterManager {
        let engine: Box<dyn CpuEngine> = Box::new(SoftCpu::new(arch, mode));
        RegisterManager::new(Rc::new(RefCell::new(engine)), reg_table(arch)).unwrap()
    }

    #[test]
    fn test_pc_sp_aliases() {
        let regs = manager(GuestArch::Arm, EngineMode::ARM);
        regs.set_sp(0x7fff_0000).unwrap();
        regs.set_pc(0x8000).unwrap();
        assert_eq!(regs.read("r13").unwrap(), 0x7fff_0000);
        assert_eq!(regs.read("r15").unwrap(), 0x8000);
        regs.write("ip", 3).unwrap();
        assert_eq!(regs.read("r12").unwrap(), 3);
    }

    #[test]
    fn test_unknown_register_is_an_error() {
        let regs = manager(GuestArch::Mips, EngineMode::MIPS32);
        assert!(regs.flags_name().is_none());
        assert_eq!(
            regs.read("eflags"),
            Err(EmuError::UnknownRegister("eflags".into()))
        );
        // case-sensitive
        assert!(regs.read("SP").is_err());
    }

    #[test]
    fn test_save_restore() {
        let regs = manager(GuestArch::X86, EngineMode::MODE_32);
        regs.write("eax", 0xdead_beef).unwrap();
        let snap = regs.save().unwrap();
        assert_eq!(snap["eax"], 0xdead_beef);
        assert!(!snap.contains_key("ax"));

        regs.write("eax", 0).unwrap();
        regs.restore(&snap).unwrap();
        assert_eq!(regs.read("ax").unwrap(), 0xbeef);
    }

    struct HalfEngine(SoftCpu);

    impl CpuEngine for HalfEngine {
        fn arch(&self) -> GuestArch {
            self.0.arch()
        }
        fn mode(&self) -> EngineMode {
            self.0.mode()
        }
        fn implements(&self, reg: RegId) -> bool {
            reg.0 < 4
        }
        fn reg_read(&self, reg: RegId) -> Result<u64> {
            self.0.reg_read(reg)
        }
        fn reg_write(&mut self, reg: RegId, value: u64) -> Result<()> {
            self.0.reg_write(reg, value)
        }
        fn add_trap(&mut self, addr: u64) {
            self.0.add_trap(addr)
        }
        fn remove_trap(&mut self, addr: u64) {
            self.0.remove_trap(addr)
        }
        fn emu_start(
            &mut self,
            begin: u64,
            until: u64,
            mem: &mut dyn emu_core::GuestMemory,
        ) -> Result<crate::engine::StopReason> {
            self.0.emu_start(begin, until, mem)
        }
        fn emu_stop(&mut self) {
            self.0.emu_stop()
        }
    }

    #[test]
    fn test_missing_engine_register_rejected() {
        let engine: Box<dyn CpuEngine> =
            Box::new(HalfEngine(SoftCpu::new(GuestArch::X86, EngineMode::MODE_32)));
        let err = RegisterManager::new(Rc::new(RefCell::new(engine)), reg_table(GuestArch::X86))
            .unwrap_err();
        assert!(matches!(err, EmuError::UnknownRegister(_)));
    }
}
