//! 仿真 DLL 例程

pub mod advapi32;

use crate::api::ApiTable;

/// Register every emulated routine family
pub fn register_all(table: &mut ApiTable) {
    table.register_all(advapi32::ROUTINES);
}
