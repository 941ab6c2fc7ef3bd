//! Cortex-M 异常模型
//!
//! Reset, handler-mode queries and the hardware interrupt frame: on entry
//! `xpsr, pc, lr, r12, r3, r2, r1, r0` are pushed, the vector entry is loaded
//! and `lr` receives an EXC_RETURN code; on exit the code is validated, the
//! stack is selected through CONTROL.SPSEL and the frame is popped.

use emu_core::{EmuError, GuestArch, GuestMemory, Result};

use crate::context::ArchContext;

/// EXC_RETURN values carry all ones in their top 28 bits
pub const EXC_RETURN_MASK: u64 = 0xffff_fff0;
/// EXC_RETURN bit: return to the process stack
pub const EXC_RETURN_SP: u64 = 0b0100;
/// EXC_RETURN: thread mode, process stack
pub const EXC_RETURN_THREAD_PSP: u64 = 0xffff_fffd;
/// EXC_RETURN: thread mode, main stack
pub const EXC_RETURN_THREAD_MSP: u64 = 0xffff_fff9;

/// CONTROL.SPSEL
pub const CONTROL_SPSEL: u64 = 0b010;

const FRAME: [&str; 8] = ["xpsr", "pc", "lr", "r12", "r3", "r2", "r1", "r0"];

/// System exception numbers relative to the first external IRQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Irq {
    Reset = -15,
    Nmi = -14,
    HardFault = -13,
    MemoryManagementFault = -12,
    BusFault = -11,
    UsageFault = -10,
    SvCall = -5,
    PendSv = -2,
    SysTick = -1,
}

/// Exception classes raised by the CPU engine
pub mod excp {
    pub const UDEF: u32 = 1;
    pub const SWI: u32 = 2;
    pub const PREFETCH_ABORT: u32 = 3;
    pub const DATA_ABORT: u32 = 4;
    pub const EXCEPTION_EXIT: u32 = 8;
    pub const NOCP: u32 = 17;
    pub const INVSTATE: u32 = 18;
    pub const STKOF: u32 = 19;
    pub const UNALIGNED: u32 = 22;
}

/// Map an engine exception to the IRQ it pends; `None` means nothing pends
pub fn exception_to_irq(excp: u32) -> Result<Option<Irq>> {
    match excp {
        excp::UDEF | excp::PREFETCH_ABORT | excp::DATA_ABORT => Ok(Some(Irq::HardFault)),
        excp::SWI => Ok(Some(Irq::SvCall)),
        excp::EXCEPTION_EXIT => Ok(None),
        excp::NOCP | excp::INVSTATE | excp::STKOF | excp::UNALIGNED => Ok(Some(Irq::UsageFault)),
        other => Err(EmuError::not_implemented(
            "cortex_m",
            format!("unhandled exception number ({other})"),
        )),
    }
}

/// Outcome of leaving an interrupt handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptExit {
    Returned,
    /// The handler returned through something other than an EXC_RETURN code
    Crashed { retval: u64 },
}

fn check_arch(ctx: &ArchContext) -> Result<()> {
    if ctx.arch() != GuestArch::CortexM {
        return Err(EmuError::UnsupportedArch {
            arch: ctx.arch(),
            endian: ctx.endian(),
            component: "cortex_m",
        });
    }
    Ok(())
}

/// Reset state: `lr` poisoned, `msp`/`sp` from word 0, `pc` from word 1
pub fn init_context(ctx: &ArchContext, mem: &dyn GuestMemory) -> Result<()> {
    check_arch(ctx)?;
    let regs = ctx.registers()?;
    let msp = mem.read_ptr(0x0, Some(4))?;
    let reset = mem.read_ptr(0x4, Some(4))?;
    regs.write("lr", 0xffff_ffff)?;
    regs.write("msp", msp)?;
    regs.set_sp(msp)?;
    regs.set_pc(reset & !1)?;
    Ok(())
}

pub fn is_handler_mode(ctx: &ArchContext) -> Result<bool> {
    Ok(ctx.registers()?.read("ipsr")? > 1)
}

pub fn using_psp(ctx: &ArchContext) -> Result<bool> {
    Ok(!is_handler_mode(ctx)? && ctx.registers()?.read("control")? & CONTROL_SPSEL != 0)
}

/// Whether `intno` may preempt under the current mask registers
pub fn interrupt_allowed(ctx: &ArchContext, intno: i32, priority: u8) -> Result<bool> {
    let regs = ctx.registers()?;
    let basepri = regs.read("basepri")? & 0xf0;
    if basepri != 0 && basepri <= priority as u64 {
        return Ok(false);
    }
    if intno > Irq::HardFault as i32 && regs.read("primask")? & 1 != 0 {
        return Ok(false);
    }
    if intno != Irq::Nmi as i32 && regs.read("faultmask")? & 1 != 0 {
        return Ok(false);
    }
    Ok(true)
}

/// Push the exception frame and branch to the vector of `intno`
pub fn enter_interrupt(ctx: &ArchContext, mem: &mut dyn GuestMemory, intno: i32) -> Result<()> {
    check_arch(ctx)?;
    let regs = ctx.registers()?;
    for name in FRAME {
        let value = regs.read(name)?;
        ctx.stack_push(mem, value)?;
    }

    let isr = (intno + 16) as u64;
    let entry = mem.read_ptr(isr * 4, Some(4))?;
    let exc_return = if using_psp(ctx)? {
        EXC_RETURN_THREAD_PSP
    } else {
        EXC_RETURN_THREAD_MSP
    };

    regs.write("ipsr", isr)?;
    regs.set_pc(entry & !1)?;
    regs.write("lr", exc_return)?;
    tracing::debug!("enter interrupt {} (vector {:#x})", intno, entry);
    Ok(())
}

/// Leave the current handler, returning through the EXC_RETURN now in pc
pub fn exit_interrupt(ctx: &ArchContext, mem: &mut dyn GuestMemory) -> Result<InterruptExit> {
    check_arch(ctx)?;
    let retval = ctx.effective_pc()?;
    if retval & EXC_RETURN_MASK != EXC_RETURN_MASK {
        tracing::warn!("interrupt crash: return to {:#x}", retval);
        return Ok(InterruptExit::Crashed { retval });
    }

    let regs = ctx.registers()?;
    regs.write("ipsr", 0)?;

    let control = regs.read("control")?;
    if retval & EXC_RETURN_SP != 0 {
        regs.write("control", control | CONTROL_SPSEL)?;
    } else {
        regs.write("control", control & !CONTROL_SPSEL)?;
    }

    for name in FRAME.iter().rev() {
        let value = ctx.stack_pop(mem)?;
        match *name {
            // only the condition flags come back from the frame
            "xpsr" => regs.write("apsr", value >> 27)?,
            "pc" => regs.set_pc(value & !1)?,
            other => regs.write(other, value)?,
        }
    }
    tracing::debug!("exit interrupt");
    Ok(InterruptExit::Returned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::{Endian, SoftMemory};

    fn setup() -> (ArchContext, SoftMemory) {
        let mut mem = SoftMemory::new(GuestArch::CortexM, Endian::Little);
        mem.map(0, 0x1000, "vectors").unwrap();
        mem.map(0x2000_0000, 0x1000, "sram").unwrap();
        mem.write_ptr(0x0, 0x2000_1000, None).unwrap();
        mem.write_ptr(0x4, 0x0000_0101, None).unwrap();
        // SysTick vector (exception 15)
        mem.write_ptr(15 * 4, 0x0000_0201, None).unwrap();
        let ctx = ArchContext::new(GuestArch::CortexM, Endian::Little, None);
        init_context(&ctx, &mem).unwrap();
        (ctx, mem)
    }

    #[test]
    fn test_reset_state() {
        let (ctx, _) = setup();
        let regs = ctx.registers().unwrap();
        assert_eq!(regs.read("msp").unwrap(), 0x2000_1000);
        assert_eq!(regs.pc().unwrap(), 0x100);
        assert_eq!(ctx.effective_pc().unwrap(), 0x101);
        assert_eq!(regs.read("lr").unwrap(), 0xffff_ffff);
        assert!(!is_handler_mode(&ctx).unwrap());
    }

    #[test]
    fn test_interrupt_roundtrip() {
        let (ctx, mut mem) = setup();
        let regs = ctx.registers().unwrap();
        regs.write("r0", 0xaa).unwrap();
        regs.write("r3", 0xdd).unwrap();

        enter_interrupt(&ctx, &mut mem, Irq::SysTick as i32).unwrap();
        assert!(is_handler_mode(&ctx).unwrap());
        assert_eq!(regs.read("ipsr").unwrap(), 15);
        assert_eq!(regs.pc().unwrap(), 0x200);
        assert_eq!(regs.read("lr").unwrap(), EXC_RETURN_THREAD_MSP);
        assert_eq!(regs.sp().unwrap(), 0x2000_1000 - 32);

        // handler clobbers r0, then returns through lr
        regs.write("r0", 0).unwrap();
        regs.set_pc(EXC_RETURN_THREAD_MSP).unwrap();
        assert_eq!(exit_interrupt(&ctx, &mut mem).unwrap(), InterruptExit::Returned);
        assert_eq!(regs.read("r0").unwrap(), 0xaa);
        assert_eq!(regs.read("r3").unwrap(), 0xdd);
        assert_eq!(regs.pc().unwrap(), 0x100);
        assert_eq!(regs.sp().unwrap(), 0x2000_1000);
        assert!(!is_handler_mode(&ctx).unwrap());
    }

    #[test]
    fn test_bad_exc_return_crashes() {
        let (ctx, mut mem) = setup();
        enter_interrupt(&ctx, &mut mem, Irq::SysTick as i32).unwrap();
        ctx.registers().unwrap().set_pc(0x1234).unwrap();
        assert!(matches!(
            exit_interrupt(&ctx, &mut mem).unwrap(),
            InterruptExit::Crashed { .. }
        ));
    }

    #[test]
    fn test_exception_mapping() {
        assert_eq!(exception_to_irq(excp::SWI).unwrap(), Some(Irq::SvCall));
        assert_eq!(exception_to_irq(excp::UNALIGNED).unwrap(), Some(Irq::UsageFault));
        assert_eq!(exception_to_irq(excp::EXCEPTION_EXIT).unwrap(), None);
        assert!(exception_to_irq(99).unwrap_err().is_not_implemented());
    }

    #[test]
    fn test_masking() {
        let (ctx, _) = setup();
        let regs = ctx.registers().unwrap();
        assert!(interrupt_allowed(&ctx, 3, 0x80).unwrap());
        regs.write("primask", 1).unwrap();
        assert!(!interrupt_allowed(&ctx, 3, 0x80).unwrap());
        assert!(interrupt_allowed(&ctx, Irq::HardFault as i32, 0).unwrap());
        regs.write("primask", 0).unwrap();
        regs.write("basepri", 0x40).unwrap();
        assert!(!interrupt_allowed(&ctx, 3, 0x80).unwrap());
        assert!(interrupt_allowed(&ctx, 3, 0x20).unwrap());
    }
}
