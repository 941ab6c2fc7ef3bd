//! 架构上下文（Architecture Context）
//!
//! One context per emulated process. The engine, register manager,
//! disassembler and assembler are each built on first access and memoized for
//! the lifetime of the context. Construction problems (an unsupported
//! ISA/byte-order pair, a CPU model from another family) surface on that
//! first access, not when the context is created.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use emu_core::{CpuModel, EmuError, Endian, GuestArch, GuestMemory, Result};

use crate::asm::Assembler;
use crate::cpr::{Cpr64Manager, CprManager};
use crate::disasm::Disassembler;
use crate::engine::{CpuEngine, SoftCpu, engine_mode};
use crate::isa::{arm::CPSR_THUMB, reg_table};
use crate::register::RegisterManager;

/// Engine handle shared by the context and the register manager
pub type SharedEngine = Rc<RefCell<Box<dyn CpuEngine>>>;

/// Builds the CPU engine for a context
pub type EngineFactory = Box<dyn Fn(&ArchContext) -> Result<Box<dyn CpuEngine>>>;

pub struct ArchContext {
    arch: GuestArch,
    endian: Endian,
    thumb: bool,
    model: Option<CpuModel>,
    factory: Option<EngineFactory>,
    engine: OnceCell<SharedEngine>,
    regs: OnceCell<RegisterManager>,
    disassembler: OnceCell<Disassembler>,
    assembler: OnceCell<Assembler>,
}

/// Memoize the outcome of `build` in `cell`; failures are not cached
fn get_or_build<T>(cell: &OnceCell<T>, build: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = build()?;
    Ok(cell.get_or_init(|| value))
}

impl ArchContext {
    pub fn new(arch: GuestArch, endian: Endian, model: Option<CpuModel>) -> Self {
        Self {
            arch,
            endian,
            // Cortex-M only runs Thumb code
            thumb: arch == GuestArch::CortexM,
            model,
            factory: None,
            engine: OnceCell::new(),
            regs: OnceCell::new(),
            disassembler: OnceCell::new(),
            assembler: OnceCell::new(),
        }
    }

    /// Start ARM guests in Thumb state
    pub fn with_thumb(mut self, thumb: bool) -> Self {
        if self.arch == GuestArch::Arm {
            self.thumb = thumb;
        }
        self
    }

    /// Replace the built-in [`SoftCpu`] backend
    ///
    /// Only allowed before the engine has been built.
    pub fn set_engine_factory(&mut self, factory: EngineFactory) -> Result<()> {
        if self.engine.get().is_some() {
            return Err(EmuError::InvalidConfig(
                "engine factory installed after the engine was built".into(),
            ));
        }
        self.factory = Some(factory);
        Ok(())
    }

    pub fn arch(&self) -> GuestArch {
        self.arch
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn bits(&self) -> u32 {
        self.arch.bits()
    }

    pub fn pointer_size(&self) -> usize {
        self.arch.pointer_size()
    }

    pub fn model(&self) -> Option<CpuModel> {
        self.model
    }

    /// Whether the guest starts in (or, for ARM, is currently in) Thumb state
    pub fn is_thumb(&self) -> Result<bool> {
        match self.arch {
            GuestArch::CortexM => Ok(true),
            GuestArch::Arm => Ok(self.registers()?.read("cpsr")? & CPSR_THUMB != 0),
            _ => Ok(false),
        }
    }

    fn build_engine(&self) -> Result<Box<dyn CpuEngine>> {
        if let Some(model) = self.model.filter(|m| !m.fits(self.arch)) {
            return Err(EmuError::InvalidConfig(format!(
                "cpu model {model:?} does not belong to {}",
                self.arch
            )));
        }
        match &self.factory {
            Some(factory) => factory(self),
            None => {
                let mode = engine_mode(self.arch, self.endian, self.thumb)?;
                Ok(Box::new(SoftCpu::new(self.arch, mode)))
            }
        }
    }

    pub fn engine(&self) -> Result<&SharedEngine> {
        get_or_build(&self.engine, || {
            let engine = self.build_engine()?;
            tracing::debug!("engine built for {} ({})", self.arch, self.endian);
            Ok(Rc::new(RefCell::new(engine)))
        })
    }

    pub fn registers(&self) -> Result<&RegisterManager> {
        get_or_build(&self.regs, || {
            RegisterManager::new(Rc::clone(self.engine()?), reg_table(self.arch))
        })
    }

    pub fn disassembler(&self) -> Result<&Disassembler> {
        get_or_build(&self.disassembler, || {
            Disassembler::new(self.arch, self.endian, self.thumb)
        })
    }

    pub fn assembler(&self) -> Result<&Assembler> {
        get_or_build(&self.assembler, || {
            Assembler::new(self.arch, self.endian, self.thumb)
        })
    }

    /// AArch32 coprocessor access
    pub fn cpr(&self) -> Result<CprManager> {
        match self.arch {
            GuestArch::Arm | GuestArch::CortexM => Ok(CprManager::new(Rc::clone(self.engine()?))),
            _ => Err(EmuError::UnsupportedArch {
                arch: self.arch,
                endian: self.endian,
                component: "cpr",
            }),
        }
    }

    /// AArch64 system register access
    pub fn cpr64(&self) -> Result<Cpr64Manager> {
        match self.arch {
            GuestArch::Arm64 => Ok(Cpr64Manager::new(Rc::clone(self.engine()?))),
            _ => Err(EmuError::UnsupportedArch {
                arch: self.arch,
                endian: self.endian,
                component: "cpr64",
            }),
        }
    }

    /// Program counter with the Thumb bit folded in
    pub fn effective_pc(&self) -> Result<u64> {
        let pc = self.registers()?.pc()?;
        Ok(if self.is_thumb()? { pc | 1 } else { pc })
    }

    // ------------------------------------------------------------------
    // 栈操作
    // ------------------------------------------------------------------

    /// Push a native word; returns the new stack pointer
    pub fn stack_push(&self, mem: &mut dyn GuestMemory, value: u64) -> Result<u64> {
        let regs = self.registers()?;
        let sp = regs.sp()?.wrapping_sub(self.pointer_size() as u64);
        regs.set_sp(sp)?;
        mem.write_ptr(sp, value, Some(self.pointer_size()))?;
        Ok(sp)
    }

    /// Pop a native word
    pub fn stack_pop(&self, mem: &mut dyn GuestMemory) -> Result<u64> {
        let regs = self.registers()?;
        let sp = regs.sp()?;
        let value = mem.read_ptr(sp, Some(self.pointer_size()))?;
        regs.set_sp(sp.wrapping_add(self.pointer_size() as u64))?;
        Ok(value)
    }

    /// Read the word at `sp + offset` without moving the stack pointer
    pub fn stack_read(&self, mem: &dyn GuestMemory, offset: i64) -> Result<u64> {
        let sp = self.registers()?.sp()?;
        mem.read_ptr(sp.wrapping_add_signed(offset), Some(self.pointer_size()))
    }

    /// Write the word at `sp + offset` without moving the stack pointer
    pub fn stack_write(&self, mem: &mut dyn GuestMemory, offset: i64, value: u64) -> Result<()> {
        let sp = self.registers()?.sp()?;
        mem.write_ptr(sp.wrapping_add_signed(offset), value, Some(self.pointer_size()))
    }
}

impl std::fmt::Debug for ArchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchContext")
            .field("arch", &self.arch)
            .field("endian", &self.endian)
            .field("thumb", &self.thumb)
            .field("model", &self.model)
            .field("engine_built", &self.engine.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SoftMemory;

    #[test]
    fn test_members_are_memoized() {
        let ctx = ArchContext::new(GuestArch::X8664, Endian::Little, None);
        let a = Rc::clone(ctx.engine().unwrap());
        let b = Rc::clone(ctx.engine().unwrap());
        assert!(Rc::ptr_eq(&a, &b));
        assert!(std::ptr::eq(ctx.registers().unwrap(), ctx.registers().unwrap()));
        assert!(std::ptr::eq(ctx.disassembler().unwrap(), ctx.disassembler().unwrap()));
    }

    #[test]
    fn test_failure_surfaces_on_first_access() {
        // creation itself never fails
        let ctx = ArchContext::new(GuestArch::X86, Endian::Big, None);
        assert!(matches!(
            ctx.engine().err().unwrap(),
            EmuError::UnsupportedArch { component: "engine", .. }
        ));
        assert!(ctx.registers().is_err());

        let ctx = ArchContext::new(GuestArch::Arm, Endian::Little, Some(CpuModel::CortexM4));
        assert!(matches!(ctx.engine().err().unwrap(), EmuError::InvalidConfig(_)));
    }

    #[test]
    fn test_stack_helpers() {
        let mut mem = SoftMemory::new(GuestArch::X86, Endian::Little);
        mem.map(0x7000, 0x1000, "stack").unwrap();
        let ctx = ArchContext::new(GuestArch::X86, Endian::Little, None);
        ctx.registers().unwrap().set_sp(0x8000).unwrap();

        assert_eq!(ctx.stack_push(&mut mem, 0x1111).unwrap(), 0x7ffc);
        ctx.stack_push(&mut mem, 0x2222).unwrap();
        assert_eq!(ctx.stack_read(&mem, 4).unwrap(), 0x1111);
        ctx.stack_write(&mut mem, 0, 0x3333).unwrap();
        assert_eq!(ctx.stack_pop(&mut mem).unwrap(), 0x3333);
        assert_eq!(ctx.stack_pop(&mut mem).unwrap(), 0x1111);
        assert_eq!(ctx.registers().unwrap().sp().unwrap(), 0x8000);
    }

    #[test]
    fn test_effective_pc_thumb() {
        let ctx = ArchContext::new(GuestArch::Arm, Endian::Little, None).with_thumb(true);
        ctx.registers().unwrap().set_pc(0x4000).unwrap();
        assert_eq!(ctx.effective_pc().unwrap(), 0x4001);

        let ctx = ArchContext::new(GuestArch::Mips, Endian::Big, None);
        ctx.registers().unwrap().set_pc(0x4000).unwrap();
        assert_eq!(ctx.effective_pc().unwrap(), 0x4000);
    }

    #[test]
    fn test_cpr_routing() {
        let ctx = ArchContext::new(GuestArch::Arm64, Endian::Little, None);
        let cpr = ctx.cpr64().unwrap();
        cpr.write(Cpr64Manager::TPIDR_EL0, 0xfeed).unwrap();
        assert_eq!(cpr.read(Cpr64Manager::TPIDR_EL0).unwrap(), 0xfeed);
        assert!(ctx.cpr().is_err());
    }
}
