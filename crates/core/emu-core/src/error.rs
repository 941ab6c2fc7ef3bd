//! 统一错误类型
//!
//! Every fallible operation in the emulation core returns [`EmuError`].
//! Conditions the guest is expected to observe (missing keys, bad handles,
//! short buffers) are *not* errors: the Windows layer maps them to status
//! codes. What ends up here is host-fatal: misconfiguration, memory contract
//! violations, and behaviour the emulator deliberately refuses to guess.

use crate::arch::{Endian, GuestArch};
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EmuError>;

/// Errors raised by the emulation core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmuError {
    /// The requested ISA/endianness combination has no mapping in a backend
    #[error("{component}: unsupported architecture {arch} ({endian})")]
    UnsupportedArch {
        arch: GuestArch,
        endian: Endian,
        component: &'static str,
    },

    /// A register name (or alias) that the active architecture does not define
    #[error("unknown register: {0}")]
    UnknownRegister(String),

    /// A backend that was not compiled into this build
    #[error("{backend} backend is not available in this build")]
    BackendUnavailable { backend: &'static str },

    /// A backend failed to initialise or to carry out a request
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// Invalid or inconsistent configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Profile could not be read or parsed
    #[error("profile error: {0}")]
    Profile(String),

    /// Guest memory access outside any mapped region
    #[error("memory fault at {addr:#x} (size {size})")]
    MemoryFault { addr: u64, size: usize },

    /// Guest heap exhausted
    #[error("guest heap exhausted while allocating {size:#x} bytes")]
    OutOfMemory { size: usize },

    /// Syntactically valid request whose semantics are not modelled
    #[error("{module}: not implemented: {feature}")]
    NotImplemented { feature: String, module: &'static str },

    /// Call dispatched to a routine nobody registered
    #[error("unknown routine: {0}")]
    UnknownRoutine(String),

    /// Routine asked for a parameter its descriptor does not declare
    #[error("routine parameter missing: {0}")]
    MissingParam(String),

    /// Routine asked for a parameter with the wrong semantic type
    #[error("routine parameter {name} is not {expected}")]
    ParamType { name: String, expected: &'static str },
}

impl EmuError {
    /// Shorthand for [`EmuError::NotImplemented`]
    pub fn not_implemented(module: &'static str, feature: impl Into<String>) -> Self {
        EmuError::NotImplemented {
            feature: feature.into(),
            module,
        }
    }

    /// Whether this error signals an unmodelled emulation behaviour
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, EmuError::NotImplemented { .. })
    }

    /// Whether this error stems from configuration rather than guest activity
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EmuError::UnsupportedArch { .. }
                | EmuError::UnknownRegister(_)
                | EmuError::BackendUnavailable { .. }
                | EmuError::InvalidConfig(_)
                | EmuError::Profile(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tiers() {
        let err = EmuError::not_implemented("advapi32", "CheckTokenMembership with a token");
        assert!(err.is_not_implemented());
        assert!(!err.is_configuration());

        let err = EmuError::UnsupportedArch {
            arch: GuestArch::X86,
            endian: Endian::Big,
            component: "engine",
        };
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "engine: unsupported architecture x86 (big endian)");
    }

    #[test]
    fn test_memory_fault_display() {
        let err = EmuError::MemoryFault { addr: 0x1000, size: 4 };
        assert_eq!(err.to_string(), "memory fault at 0x1000 (size 4)");
    }
}
