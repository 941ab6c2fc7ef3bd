//! 调用约定绑定（Calling-Convention Binding）
//!
//! Where arguments live when an intercepted routine is entered, how the
//! return value is handed back, and who cleans the stack. On x86 and x86-64
//! the trap fires on the first instruction of the callee, so `[sp]` holds
//! the return address; on the register-link ISAs the return address is in
//! the link register.

use std::fmt;

use emu_arch::ArchContext;
use emu_arch::isa::arm::CPSR_THUMB;
use emu_arch::isa::width_mask;
use emu_core::{EmuError, GuestArch, GuestMemory, Result};

/// Convention a routine is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredConv {
    Stdcall,
    Cdecl,
}

/// Concrete convention for one ISA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConv {
    /// x86, callee pops its arguments
    Stdcall,
    /// x86, caller pops
    Cdecl,
    /// x86-64 Microsoft: rcx, rdx, r8, r9, then stack past the shadow space
    Ms64,
    /// ARM / Cortex-M: r0-r3, then stack
    Aapcs,
    /// ARM64: x0-x7, then stack
    Aapcs64,
    /// MIPS o32: a0-a3, stack slots reserved for them
    MipsO32,
}

/// Where one argument lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    Reg(&'static str),
    /// Byte offset from the stack pointer at routine entry
    Stack(i64),
}

const MS64_REGS: [&str; 4] = ["rcx", "rdx", "r8", "r9"];
const AAPCS_REGS: [&str; 4] = ["r0", "r1", "r2", "r3"];
const AAPCS64_REGS: [&str; 8] = ["x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7"];
const MIPS_REGS: [&str; 4] = ["a0", "a1", "a2", "a3"];

/// Bytes between the return address and the fifth Ms64 argument
const MS64_SHADOW: u64 = 32;

impl CallConv {
    /// Bind a declared convention to the ISA of `arch`
    pub fn resolve(declared: DeclaredConv, arch: GuestArch) -> CallConv {
        match arch {
            GuestArch::X86 => match declared {
                DeclaredConv::Stdcall => CallConv::Stdcall,
                DeclaredConv::Cdecl => CallConv::Cdecl,
            },
            GuestArch::X8664 => CallConv::Ms64,
            GuestArch::Arm | GuestArch::CortexM => CallConv::Aapcs,
            GuestArch::Arm64 => CallConv::Aapcs64,
            GuestArch::Mips => CallConv::MipsO32,
        }
    }

    /// Stack slot width
    pub fn word(&self) -> u64 {
        match self {
            CallConv::Ms64 | CallConv::Aapcs64 => 8,
            _ => 4,
        }
    }

    /// Register carrying the return value
    pub fn return_reg(&self) -> &'static str {
        match self {
            CallConv::Stdcall | CallConv::Cdecl => "eax",
            CallConv::Ms64 => "rax",
            CallConv::Aapcs => "r0",
            CallConv::Aapcs64 => "x0",
            CallConv::MipsO32 => "v0",
        }
    }

    /// Link register, for conventions that return through one
    pub fn link_reg(&self) -> Option<&'static str> {
        match self {
            CallConv::Aapcs | CallConv::Aapcs64 => Some("lr"),
            CallConv::MipsO32 => Some("ra"),
            _ => None,
        }
    }

    fn arg_regs(&self) -> &'static [&'static str] {
        match self {
            CallConv::Stdcall | CallConv::Cdecl => &[],
            CallConv::Ms64 => &MS64_REGS,
            CallConv::Aapcs => &AAPCS_REGS,
            CallConv::Aapcs64 => &AAPCS64_REGS,
            CallConv::MipsO32 => &MIPS_REGS,
        }
    }

    /// Location of argument `index`
    pub fn arg_slot(&self, index: usize) -> ArgSlot {
        let regs = self.arg_regs();
        if let Some(reg) = regs.get(index) {
            return ArgSlot::Reg(reg);
        }
        let word = self.word() as i64;
        let i = index as i64;
        let n = regs.len() as i64;
        ArgSlot::Stack(match self {
            CallConv::Stdcall | CallConv::Cdecl => word * (i + 1),
            CallConv::Ms64 => word * (i + 1),
            CallConv::Aapcs | CallConv::Aapcs64 => word * (i - n),
            CallConv::MipsO32 => word * i,
        })
    }
}

impl fmt::Display for CallConv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallConv::Stdcall => "stdcall",
            CallConv::Cdecl => "cdecl",
            CallConv::Ms64 => "ms64",
            CallConv::Aapcs => "aapcs",
            CallConv::Aapcs64 => "aapcs64",
            CallConv::MipsO32 => "o32",
        };
        f.write_str(name)
    }
}

/// Raw values of the first `count` arguments
pub fn read_args(ctx: &ArchContext, mem: &dyn GuestMemory, conv: CallConv, count: usize) -> Result<Vec<u64>> {
    let regs = ctx.registers()?;
    let word = conv.word() as usize;
    (0..count)
        .map(|i| match conv.arg_slot(i) {
            ArgSlot::Reg(name) => regs.read(name),
            ArgSlot::Stack(offset) => {
                let sp = regs.sp()?;
                mem.read_ptr(sp.wrapping_add_signed(offset), Some(word))
            }
        })
        .collect()
}

/// Hand `retval` back and resume at the caller; returns the return address
///
/// `nargs` is the declared argument count, used by callee-cleanup
/// conventions.
pub fn return_to_caller(
    ctx: &ArchContext,
    mem: &mut dyn GuestMemory,
    conv: CallConv,
    nargs: usize,
    retval: u64,
) -> Result<u64> {
    let regs = ctx.registers()?;
    regs.write(conv.return_reg(), retval & width_mask(ctx.bits()))?;

    let ret_addr = match conv.link_reg() {
        Some(link) => regs.read(link)?,
        None => {
            let ret_addr = ctx.stack_pop(mem)?;
            if conv == CallConv::Stdcall {
                let sp = regs.sp()?;
                regs.set_sp(sp.wrapping_add(conv.word() * nargs as u64))?;
            }
            ret_addr
        }
    };

    if ctx.arch() == GuestArch::Arm {
        // interworking: bit 0 of the link value selects Thumb
        let cpsr = regs.read("cpsr")?;
        let cpsr = if ret_addr & 1 != 0 {
            cpsr | CPSR_THUMB
        } else {
            cpsr & !CPSR_THUMB
        };
        regs.write("cpsr", cpsr)?;
    }
    match ctx.arch() {
        GuestArch::Arm | GuestArch::CortexM => regs.set_pc(ret_addr & !1)?,
        _ => regs.set_pc(ret_addr)?,
    }
    Ok(ret_addr)
}

/// Lay out a call from the host: arguments, return address, stack
///
/// Leaves the guest in the state it would have on the callee's first
/// instruction.
pub fn setup_call(
    ctx: &ArchContext,
    mem: &mut dyn GuestMemory,
    conv: CallConv,
    args: &[u64],
    ret_addr: u64,
) -> Result<()> {
    if ctx.pointer_size() as u64 != conv.word() {
        return Err(EmuError::InvalidConfig(format!(
            "{conv} calls do not fit a {}-bit guest",
            ctx.bits()
        )));
    }
    let regs = ctx.registers()?;
    let word = conv.word();
    let nregs = conv.arg_regs().len();

    for value in args.iter().skip(nregs).rev() {
        ctx.stack_push(mem, *value)?;
    }
    for (reg, value) in conv.arg_regs().iter().zip(args) {
        regs.write(reg, *value)?;
    }

    match conv {
        CallConv::Stdcall | CallConv::Cdecl => {
            ctx.stack_push(mem, ret_addr)?;
        }
        CallConv::Ms64 => {
            regs.set_sp(regs.sp()?.wrapping_sub(MS64_SHADOW))?;
            ctx.stack_push(mem, ret_addr)?;
        }
        CallConv::MipsO32 => {
            regs.set_sp(regs.sp()?.wrapping_sub(word * nregs as u64))?;
            regs.write("ra", ret_addr)?;
        }
        CallConv::Aapcs | CallConv::Aapcs64 => {
            regs.write("lr", ret_addr)?;
        }
    }
    Ok(())
}
