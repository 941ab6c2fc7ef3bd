//! # emu-core - 仿真核心库
//!
//! 提供仿真框架共享的基础类型。
//!
//! ## 主要组件
//!
//! - **架构标签**: [`GuestArch`], [`Endian`], [`CpuModel`]
//! - **错误类型**: [`EmuError`] 与 [`Result`]
//! - **客户内存**: [`GuestMemory`] trait 以及软件实现 [`SoftMemory`]
//! - **客户堆**: [`GuestHeap`] 首次适配分配器
//! - **配置档案**: [`Profile`] 大小写不敏感的 TOML 查找
//! - **日志**: [`Verbosity`] 与 [`init_logging`]
//!
//! ## 示例
//!
//! ```rust
//! use emu_core::{GuestArch, Endian, GuestMemory, SoftMemory};
//!
//! let mut mem = SoftMemory::new(GuestArch::X86, Endian::Little);
//! mem.map(0x1000, 0x1000, "scratch").unwrap();
//! mem.write_ptr(0x1000, 0xdeadbeef, None).unwrap();
//! assert_eq!(mem.read_ptr(0x1000, None).unwrap(), 0xdeadbeef);
//! ```

// 模块定义
pub mod arch;
pub mod error;
pub mod heap;
pub mod logging;
pub mod memory;
pub mod profile;

pub use arch::{CpuModel, Endian, GuestArch};
pub use error::{EmuError, Result};
pub use heap::GuestHeap;
pub use logging::{Verbosity, init_logging};
pub use memory::{GuestMemory, MemRegion, SoftMemory};
pub use profile::{Profile, ProfileSection};
