//! # emu-arch - 架构抽象层
//!
//! 为每种客户 ISA 构建 CPU 引擎、寄存器管理器、反汇编器与汇编器。
//!
//! ## 主要组件
//!
//! - **架构上下文**: [`ArchContext`] 按需构建并缓存各成员
//! - **CPU 引擎**: [`CpuEngine`] trait 与内置软件实现 [`SoftCpu`]
//! - **寄存器**: [`RegisterManager`] 与每个 ISA 的寄存器表
//! - **反汇编/汇编**: [`Disassembler`] (capstone), [`Assembler`] (keystone, 可选特性)
//! - **协处理器**: [`CprManager`], [`Cpr64Manager`]
//! - **Cortex-M**: 复位与中断帧处理
//!
//! ## 示例
//!
//! ```rust
//! use emu_arch::ArchContext;
//! use emu_core::{Endian, GuestArch};
//!
//! let ctx = ArchContext::new(GuestArch::Mips, Endian::Big, None);
//! let regs = ctx.registers().unwrap();
//! regs.set_sp(0x7fff_0000).unwrap();
//! assert_eq!(regs.read("r29").unwrap(), 0x7fff_0000);
//! ```

pub mod asm;
pub mod context;
pub mod cortex_m;
pub mod cpr;
pub mod disasm;
pub mod engine;
pub mod isa;
pub mod register;

pub use asm::Assembler;
pub use context::{ArchContext, EngineFactory, SharedEngine};
pub use cpr::{Cpr64Manager, CprAccess, CprManager, CprReg, SysReg};
pub use disasm::{Disassembler, Insn};
pub use engine::{CpuEngine, EngineMode, RegId, SoftCpu, StopReason, engine_mode};
pub use isa::{RegDef, RegTable, reg_table};
pub use register::RegisterManager;
