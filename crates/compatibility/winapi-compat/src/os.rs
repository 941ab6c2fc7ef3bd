//! Windows 进程上下文（Windows OS context）
//!
//! Owns everything one emulated process sees: the architecture context,
//! guest memory with its heap and stack, the handle table, the registry,
//! the well-known SID cache and the routine table. Nothing here is shared
//! between processes.

use std::collections::{BTreeMap, HashMap};

use emu_arch::{ArchContext, StopReason};
use emu_core::logging::API_TARGET;
use emu_core::{EmuError, GuestHeap, GuestMemory, Profile, ProfileSection, Result, SoftMemory};

use crate::api::ApiTable;
use crate::fncc::{self, CallConv};
use crate::handle::HandleTable;
use crate::params::Params;
use crate::registry::RegistryManager;
use crate::sid::WellKnownSids;

/// Return address used by [`WindowsOs::invoke`]
pub const RETURN_SENTINEL_32: u64 = 0xdead_f00c;
pub const RETURN_SENTINEL_64: u64 = 0x0000_7fff_dead_f00c;

/// One intercepted call, after it returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub address: u64,
    pub name: &'static str,
    pub params: Params,
    pub retval: u64,
}

pub struct WindowsOs {
    pub(crate) ctx: ArchContext,
    pub(crate) mem: Box<dyn GuestMemory>,
    pub(crate) heap: GuestHeap,
    pub(crate) handles: HandleTable,
    pub(crate) registry: RegistryManager,
    pub(crate) profile: Profile,
    pub(crate) sids: WellKnownSids,
    pub(crate) services: BTreeMap<String, String>,
    pub(crate) last_error: u32,
    api: ApiTable,
    hooks: HashMap<u64, &'static str>,
    call_trace: Vec<CallRecord>,
    stack_top: u64,
}

fn required(section: &ProfileSection, key: &str) -> Result<u64> {
    section.get_int(key)?.ok_or_else(|| {
        EmuError::InvalidConfig(format!("profile [{}] lacks {key}", section.name()))
    })
}

impl WindowsOs {
    /// Build a process on top of `ctx`, laid out per the `[OS32]`/`[OS64]`
    /// profile section
    pub fn new(ctx: ArchContext, profile: Profile) -> Result<Self> {
        let section_name = if ctx.bits() == 64 { "OS64" } else { "OS32" };
        let section = profile
            .section(section_name)
            .ok_or_else(|| EmuError::InvalidConfig(format!("profile lacks [{section_name}]")))?;
        let heap_address = required(section, "heap_address")?;
        let heap_size = required(section, "heap_size")?;
        let stack_address = required(section, "stack_address")?;
        let stack_size = required(section, "stack_size")?;

        let mut mem = SoftMemory::new(ctx.arch(), ctx.endian());
        mem.map(heap_address, heap_size, "[heap]")?;
        mem.map(stack_address, stack_size, "[stack]")?;

        Self::with_memory(ctx, Box::new(mem), profile, GuestHeap::new(heap_address, heap_size), stack_address + stack_size)
    }

    /// Build a process over caller-provided memory
    ///
    /// The heap region and the stack below `stack_top` must already be
    /// mapped.
    pub fn with_memory(
        ctx: ArchContext,
        mem: Box<dyn GuestMemory>,
        profile: Profile,
        heap: GuestHeap,
        stack_top: u64,
    ) -> Result<Self> {
        ctx.registers()?.set_sp(stack_top)?;

        let overlay = profile
            .section("REGISTRY")
            .cloned()
            .unwrap_or_else(|| ProfileSection::new("REGISTRY"));

        let mut api = ApiTable::new();
        crate::dlls::register_all(&mut api);

        tracing::info!(
            "windows process: {} ({}), {} routines",
            ctx.arch(),
            ctx.endian(),
            api.len()
        );

        Ok(Self {
            ctx,
            mem,
            heap,
            handles: HandleTable::with_predefined(),
            registry: RegistryManager::new(overlay),
            profile,
            sids: WellKnownSids::new(),
            services: BTreeMap::new(),
            last_error: 0,
            api,
            hooks: HashMap::new(),
            call_trace: Vec::new(),
            stack_top,
        })
    }

    // ------------------------------------------------------------------
    // 访问器
    // ------------------------------------------------------------------

    pub fn ctx(&self) -> &ArchContext {
        &self.ctx
    }

    pub fn mem(&self) -> &dyn GuestMemory {
        self.mem.as_ref()
    }

    pub fn mem_mut(&mut self) -> &mut dyn GuestMemory {
        self.mem.as_mut()
    }

    pub fn heap(&self) -> &GuestHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut GuestHeap {
        &mut self.heap
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn handles_mut(&mut self) -> &mut HandleTable {
        &mut self.handles
    }

    pub fn registry(&self) -> &RegistryManager {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RegistryManager {
        &mut self.registry
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn sids(&self) -> &WellKnownSids {
        &self.sids
    }

    pub fn services(&self) -> &BTreeMap<String, String> {
        &self.services
    }

    pub fn api(&self) -> &ApiTable {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut ApiTable {
        &mut self.api
    }

    pub fn call_trace(&self) -> &[CallRecord] {
        &self.call_trace
    }

    pub fn stack_top(&self) -> u64 {
        self.stack_top
    }

    /// Value `GetLastError` would return
    pub fn last_error(&self) -> u32 {
        self.last_error
    }

    pub fn set_last_error(&mut self, code: u32) {
        self.last_error = code;
    }

    /// Whether the configured principal runs with administrative rights
    pub fn is_privileged(&self) -> bool {
        self.profile
            .get("SYSTEM", "permission")
            .is_some_and(|p| p.eq_ignore_ascii_case("root"))
    }

    // ------------------------------------------------------------------
    // 拦截与分发
    // ------------------------------------------------------------------

    /// Intercept calls to `address` with the routine `name`
    pub fn hook_import(&mut self, name: &str, address: u64) -> Result<()> {
        let desc = self
            .api
            .get(name)
            .ok_or_else(|| EmuError::UnknownRoutine(name.to_string()))?;
        self.hooks.insert(address, desc.name);
        self.ctx.engine()?.borrow_mut().add_trap(address);
        tracing::debug!("hooked {} at {:#x}", name, address);
        Ok(())
    }

    /// Routine hooked at `address`
    pub fn hooked(&self, address: u64) -> Option<&'static str> {
        self.hooks.get(&address).copied()
    }

    /// Service an intercepted call at `address` and return to the caller
    ///
    /// Returns the routine's return value.
    pub fn dispatch(&mut self, address: u64) -> Result<u64> {
        let name = self
            .hooked(address)
            .ok_or_else(|| EmuError::UnknownRoutine(format!("no routine hooked at {address:#x}")))?;
        self.call(name, address)
    }

    fn call(&mut self, name: &str, address: u64) -> Result<u64> {
        let desc = *self
            .api
            .get(name)
            .ok_or_else(|| EmuError::UnknownRoutine(name.to_string()))?;
        let conv = CallConv::resolve(desc.conv, self.ctx.arch());

        let raws = fncc::read_args(&self.ctx, self.mem.as_ref(), conv, desc.params.len())?;
        let mut params = Params::decode(desc.params, &raws, self.mem.as_ref())?;

        let retval = (desc.func)(self, address, &mut params)?;

        tracing::info!(target: API_TARGET, "{:#x}: {}({}) = {:#x}", address, desc.name, params, retval);
        self.api.record_call(desc.name);
        self.call_trace.push(CallRecord {
            address,
            name: desc.name,
            params,
            retval,
        });

        fncc::return_to_caller(&self.ctx, self.mem.as_mut(), conv, desc.params.len(), retval)?;
        Ok(retval)
    }

    /// Call routine `name` from the host with raw arguments
    ///
    /// Arguments and a sentinel return address are laid out per convention
    /// on the guest stack, the routine runs through the regular binding, and
    /// the stack is back where it started when the convention cleans up.
    pub fn invoke(&mut self, name: &str, args: &[u64]) -> Result<u64> {
        let desc = *self
            .api
            .get(name)
            .ok_or_else(|| EmuError::UnknownRoutine(name.to_string()))?;
        let conv = CallConv::resolve(desc.conv, self.ctx.arch());
        let sentinel = if self.ctx.bits() == 64 {
            RETURN_SENTINEL_64
        } else {
            RETURN_SENTINEL_32
        };

        fncc::setup_call(&self.ctx, self.mem.as_mut(), conv, args, sentinel)?;
        let retval = self.call(desc.name, 0)?;

        let pc = self.ctx.registers()?.pc()?;
        if pc != sentinel {
            return Err(EmuError::InvalidConfig(format!(
                "{name} returned to {pc:#x} instead of the caller"
            )));
        }
        Ok(retval)
    }

    /// Run guest code from `begin` until `until`, servicing hooked calls
    pub fn run(&mut self, begin: u64, until: u64) -> Result<()> {
        let mut pc = begin;
        loop {
            let reason = {
                let engine = self.ctx.engine()?;
                let mut engine = engine.borrow_mut();
                engine.emu_start(pc, until, self.mem.as_mut())?
            };
            match reason {
                StopReason::Trap(addr) => {
                    self.dispatch(addr)?;
                    pc = self.ctx.effective_pc()?;
                }
                StopReason::Finished | StopReason::Stopped => return Ok(()),
                StopReason::Unsupported(addr) => {
                    return Err(EmuError::not_implemented(
                        "engine",
                        format!("cannot execute guest code at {addr:#x}"),
                    ));
                }
            }
        }
    }
}

impl std::fmt::Debug for WindowsOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsOs")
            .field("ctx", &self.ctx)
            .field("handles", &self.handles.len())
            .field("routines", &self.api.len())
            .field("hooks", &self.hooks.len())
            .field("last_error", &self.last_error)
            .finish()
    }
}
