//! # winapi-compat - Windows API 兼容层
//!
//! 在仿真核心之上提供一个 Windows 进程所见的操作系统状态。
//!
//! ## 主要组件
//!
//! - **进程上下文**: [`WindowsOs`] 拥有内存、堆、句柄表与注册表
//! - **句柄表**: [`HandleTable`] 与预定义句柄
//! - **注册表仿真**: [`RegistryManager`], 配置档案 `[REGISTRY]` 覆盖
//! - **SID/令牌**: [`Sid`], [`WellKnownSids`], [`Token`]
//! - **调用约定**: [`CallConv`] 参数读取与返回
//! - **例程**: [`ApiTable`] 与 advapi32 例程族
//!
//! ## 示例
//!
//! ```rust
//! use emu_arch::ArchContext;
//! use emu_core::{Endian, GuestArch, GuestMemory, Profile};
//! use winapi_compat::WindowsOs;
//! use winapi_compat::consts::{ERROR_SUCCESS, HKEY_CURRENT_USER};
//!
//! let ctx = ArchContext::new(GuestArch::X86, Endian::Little, None);
//! let mut os = WindowsOs::new(ctx, Profile::windows_default()).unwrap();
//!
//! let sub = os.heap_mut().alloc(32).unwrap();
//! let out = os.heap_mut().alloc(4).unwrap();
//! os.mem_mut().write_cstring(sub, "Software\\Demo").unwrap();
//!
//! let status = os
//!     .invoke("RegCreateKeyA", &[HKEY_CURRENT_USER, sub, out])
//!     .unwrap();
//! assert_eq!(status, ERROR_SUCCESS as u64);
//! assert!(os.registry().exists("HKEY_CURRENT_USER\\Software\\Demo"));
//! ```

pub mod api;
pub mod consts;
pub mod dlls;
pub mod fncc;
pub mod handle;
pub mod os;
pub mod params;
pub mod registry;
pub mod sid;
pub mod token;

pub use api::{ApiDescriptor, ApiFn, ApiStats, ApiTable};
pub use fncc::{CallConv, DeclaredConv};
pub use handle::{Handle, HandleObject, HandleTable};
pub use os::{CallRecord, WindowsOs};
pub use params::{ParamKind, ParamValue, Params};
pub use registry::{RegValue, RegistryDiff, RegistryManager};
pub use sid::{Sid, WellKnown, WellKnownSids};
pub use token::Token;
