//! 例程注册表（Routine registration）
//!
//! Every emulated entry point is described by an [`ApiDescriptor`]: name,
//! declared calling convention, ordered parameter list and the host
//! function. The table is filled when the OS context is built and looked up
//! by name at intercept time.

use std::collections::HashMap;
use std::fmt;

use emu_core::Result;

use crate::fncc::DeclaredConv;
use crate::os::WindowsOs;
use crate::params::{ParamKind, Params};

/// Host implementation: `(os, call site, params) -> return value`
pub type ApiFn = fn(&mut WindowsOs, u64, &mut Params) -> Result<u64>;

#[derive(Clone, Copy)]
pub struct ApiDescriptor {
    pub name: &'static str,
    pub conv: DeclaredConv,
    pub params: &'static [(&'static str, ParamKind)],
    pub func: ApiFn,
}

impl ApiDescriptor {
    pub const fn new(
        name: &'static str,
        conv: DeclaredConv,
        params: &'static [(&'static str, ParamKind)],
        func: ApiFn,
    ) -> Self {
        Self {
            name,
            conv,
            params,
            func,
        }
    }
}

impl fmt::Debug for ApiDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiDescriptor")
            .field("name", &self.name)
            .field("conv", &self.conv)
            .field("params", &self.params.len())
            .finish()
    }
}

/// Routine table with per-routine call statistics
#[derive(Debug, Default, Clone)]
pub struct ApiTable {
    routines: HashMap<&'static str, ApiDescriptor>,
    call_counts: HashMap<&'static str, u64>,
    total_calls: u64,
}

/// Call statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiStats {
    pub total_calls: u64,
    pub registered: u64,
    pub distinct_called: u64,
}

impl ApiTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a routine; returns the descriptor it replaced, if any
    pub fn register(&mut self, desc: ApiDescriptor) -> Option<ApiDescriptor> {
        let old = self.routines.insert(desc.name, desc);
        if old.is_some() {
            tracing::warn!("routine {} registered twice", desc.name);
        }
        old
    }

    pub fn register_all(&mut self, descs: &[ApiDescriptor]) {
        for desc in descs {
            self.register(*desc);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ApiDescriptor> {
        self.routines.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.routines.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// 记录一次调用
    pub fn record_call(&mut self, name: &'static str) {
        *self.call_counts.entry(name).or_insert(0) += 1;
        self.total_calls += 1;
    }

    pub fn call_count(&self, name: &str) -> u64 {
        self.call_counts.get(name).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> ApiStats {
        ApiStats {
            total_calls: self.total_calls,
            registered: self.routines.len() as u64,
            distinct_called: self.call_counts.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::types::DWORD;

    fn noop(_: &mut WindowsOs, _: u64, _: &mut Params) -> Result<u64> {
        Ok(0)
    }

    const NOOP: ApiDescriptor = ApiDescriptor::new("Noop", DeclaredConv::Stdcall, &[("x", DWORD)], noop);

    #[test]
    fn test_register_and_lookup() {
        let mut table = ApiTable::new();
        assert!(table.register(NOOP).is_none());
        assert!(table.register(NOOP).is_some());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("Noop").unwrap().params.len(), 1);
        assert!(table.get("noop").is_none());
    }

    #[test]
    fn test_statistics() {
        let mut table = ApiTable::new();
        table.register(NOOP);
        table.record_call("Noop");
        table.record_call("Noop");
        assert_eq!(table.call_count("Noop"), 2);
        assert_eq!(table.call_count("Other"), 0);
        assert_eq!(
            table.stats(),
            ApiStats {
                total_calls: 2,
                registered: 1,
                distinct_called: 1
            }
        );
    }
}
