//! CPU 引擎抽象（CPU engine seam）
//!
//! [`CpuEngine`] is the boundary between the architecture context and the
//! component that owns guest register state and executes guest code. The
//! built-in [`SoftCpu`] keeps a software register file and stops at trap
//! addresses; instruction translation is left to external backends plugged
//! in through [`ArchContext::set_engine_factory`].
//!
//! [`ArchContext::set_engine_factory`]: crate::ArchContext::set_engine_factory

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::BitOr;

use emu_core::{EmuError, Endian, GuestArch, GuestMemory, Result};

use crate::cpr::CprAccess;
use crate::isa::{RegTable, arm::CPSR_THUMB, reg_table, width_mask};

/// Index of a register in its ISA's register table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId(pub u16);

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg#{}", self.0)
    }
}

/// Why [`CpuEngine::emu_start`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Execution reached a registered trap address
    Trap(u64),
    /// Execution reached the `until` address
    Finished,
    /// A stop was requested through [`CpuEngine::emu_stop`]
    Stopped,
    /// The engine cannot execute the instruction at this address
    Unsupported(u64),
}

/// Mode word handed to a CPU engine backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineMode(u32);

impl EngineMode {
    pub const LITTLE_ENDIAN: EngineMode = EngineMode(0);
    pub const ARM: EngineMode = EngineMode(0);
    pub const MODE_32: EngineMode = EngineMode(1 << 2);
    pub const MODE_64: EngineMode = EngineMode(1 << 3);
    pub const THUMB: EngineMode = EngineMode(1 << 4);
    pub const MCLASS: EngineMode = EngineMode(1 << 5);
    pub const MIPS32: EngineMode = EngineMode(1 << 2);
    pub const BIG_ENDIAN: EngineMode = EngineMode(1 << 30);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: EngineMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EngineMode {
    type Output = EngineMode;

    fn bitor(self, rhs: EngineMode) -> EngineMode {
        EngineMode(self.0 | rhs.0)
    }
}

/// Engine mode for an ISA, byte order and start mode
pub fn engine_mode(arch: GuestArch, endian: Endian, thumb: bool) -> Result<EngineMode> {
    let unsupported = || EmuError::UnsupportedArch {
        arch,
        endian,
        component: "engine",
    };

    let order = match endian {
        Endian::Little => EngineMode::LITTLE_ENDIAN,
        Endian::Big => EngineMode::BIG_ENDIAN,
    };

    match (arch, endian) {
        (GuestArch::X86, Endian::Little) => Ok(EngineMode::MODE_32),
        (GuestArch::X8664, Endian::Little) => Ok(EngineMode::MODE_64),
        (GuestArch::Arm, _) => {
            let isa = if thumb { EngineMode::THUMB } else { EngineMode::ARM };
            Ok(isa | order)
        }
        (GuestArch::Arm64, _) => Ok(EngineMode::ARM | order),
        (GuestArch::CortexM, Endian::Little) => {
            Ok(EngineMode::ARM | EngineMode::MCLASS | EngineMode::THUMB)
        }
        (GuestArch::Mips, _) => Ok(EngineMode::MIPS32 | order),
        (GuestArch::X86 | GuestArch::X8664 | GuestArch::CortexM, Endian::Big) => {
            Err(unsupported())
        }
    }
}

/// Register and execution interface of a CPU emulation engine
pub trait CpuEngine {
    fn arch(&self) -> GuestArch;

    fn mode(&self) -> EngineMode;

    /// Whether the engine actually backs this register
    fn implements(&self, reg: RegId) -> bool;

    fn reg_read(&self, reg: RegId) -> Result<u64>;

    fn reg_write(&mut self, reg: RegId, value: u64) -> Result<()>;

    /// Coprocessor / system register read
    fn cpr_read(&self, access: &CprAccess) -> Result<u64> {
        Err(EmuError::not_implemented(
            "engine",
            format!("coprocessor read {access:?}"),
        ))
    }

    /// Coprocessor / system register write
    fn cpr_write(&mut self, access: &CprAccess, value: u64) -> Result<()> {
        let _ = value;
        Err(EmuError::not_implemented(
            "engine",
            format!("coprocessor write {access:?}"),
        ))
    }

    /// Stop with [`StopReason::Trap`] whenever execution reaches `addr`
    fn add_trap(&mut self, addr: u64);

    fn remove_trap(&mut self, addr: u64);

    /// Run from `begin` until `until`, a trap, or a stop request
    fn emu_start(&mut self, begin: u64, until: u64, mem: &mut dyn GuestMemory) -> Result<StopReason>;

    /// Request the current or next run to stop
    fn emu_stop(&mut self);
}

/// Software register file with trap-only execution
#[derive(Debug)]
pub struct SoftCpu {
    table: &'static RegTable,
    mode: EngineMode,
    slots: Vec<u64>,
    traps: BTreeSet<u64>,
    cpr: HashMap<CprAccess, u64>,
    stop_pending: bool,
}

impl SoftCpu {
    pub fn new(arch: GuestArch, mode: EngineMode) -> Self {
        let table = reg_table(arch);
        let mut cpu = Self {
            table,
            mode,
            slots: vec![0; table.slot_count()],
            traps: BTreeSet::new(),
            cpr: HashMap::new(),
            stop_pending: false,
        };
        cpu.set_thumb(mode.contains(EngineMode::THUMB));
        cpu
    }

    fn def(&self, reg: RegId) -> Result<&'static crate::isa::RegDef> {
        self.table
            .regs
            .get(reg.0 as usize)
            .ok_or_else(|| EmuError::UnknownRegister(reg.to_string()))
    }

    fn named(&self, name: &str) -> Option<RegId> {
        self.table.find(name).map(|(idx, _)| RegId(idx as u16))
    }

    fn is_arm32(&self) -> bool {
        matches!(self.table.arch, GuestArch::Arm | GuestArch::CortexM)
    }

    fn set_thumb(&mut self, thumb: bool) {
        let (name, bit) = match self.table.arch {
            GuestArch::Arm => ("cpsr", CPSR_THUMB),
            GuestArch::CortexM => ("xpsr", 1 << 24),
            _ => return,
        };
        if let Some(id) = self.named(name) {
            let cur = self.reg_read(id).unwrap_or(0);
            let next = if thumb { cur | bit } else { cur & !bit };
            let _ = self.reg_write(id, next);
        }
    }

    /// Fold the Thumb interworking bit into CPU state and strip it from `addr`
    fn enter(&mut self, addr: u64) -> u64 {
        if self.is_arm32() {
            if self.table.arch == GuestArch::Arm {
                self.set_thumb(addr & 1 == 1);
            }
            addr & !1
        } else {
            addr
        }
    }
}

impl CpuEngine for SoftCpu {
    fn arch(&self) -> GuestArch {
        self.table.arch
    }

    fn mode(&self) -> EngineMode {
        self.mode
    }

    fn implements(&self, reg: RegId) -> bool {
        (reg.0 as usize) < self.table.regs.len()
    }

    fn reg_read(&self, reg: RegId) -> Result<u64> {
        let def = self.def(reg)?;
        Ok((self.slots[def.slot as usize] >> def.shift) & def.mask())
    }

    fn reg_write(&mut self, reg: RegId, value: u64) -> Result<()> {
        let def = self.def(reg)?;
        // $zero is hardwired
        if self.table.arch == GuestArch::Mips && def.slot == 0 {
            return Ok(());
        }
        let slot = &mut self.slots[def.slot as usize];
        let value = value & def.mask();
        if def.zero_extend {
            *slot = value;
        } else {
            let field = def.mask() << def.shift;
            *slot = (*slot & !field) | (value << def.shift);
        }
        Ok(())
    }

    fn cpr_read(&self, access: &CprAccess) -> Result<u64> {
        Ok(self.cpr.get(access).copied().unwrap_or(0))
    }

    fn cpr_write(&mut self, access: &CprAccess, value: u64) -> Result<()> {
        self.cpr
            .insert(*access, value & width_mask(access.width()));
        Ok(())
    }

    fn add_trap(&mut self, addr: u64) {
        let addr = if self.is_arm32() { addr & !1 } else { addr };
        self.traps.insert(addr);
    }

    fn remove_trap(&mut self, addr: u64) {
        let addr = if self.is_arm32() { addr & !1 } else { addr };
        self.traps.remove(&addr);
    }

    fn emu_start(&mut self, begin: u64, until: u64, _mem: &mut dyn GuestMemory) -> Result<StopReason> {
        if std::mem::take(&mut self.stop_pending) {
            return Ok(StopReason::Stopped);
        }

        let pc = self.enter(begin);
        let until = if self.is_arm32() { until & !1 } else { until };
        let pc_id = self
            .named(self.table.pc)
            .ok_or_else(|| EmuError::UnknownRegister(self.table.pc.to_string()))?;
        self.reg_write(pc_id, pc)?;

        let reason = if pc == until {
            StopReason::Finished
        } else if self.traps.contains(&pc) {
            StopReason::Trap(pc)
        } else {
            StopReason::Unsupported(pc)
        };
        tracing::trace!("soft cpu stop at {:#x}: {:?}", pc, reason);
        Ok(reason)
    }

    fn emu_stop(&mut self) {
        self.stop_pending = true;
    }
}
