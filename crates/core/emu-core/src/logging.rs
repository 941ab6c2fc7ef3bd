// 日志（Logging）
//
// The core emits `tracing` events only. Hosts that want console output call
// [`init_logging`] once; embedding hosts install their own subscriber.

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

use crate::error::EmuError;

/// Target of the per-call API trace records
pub const API_TARGET: &str = "api";

/// Target of disassembly records
pub const DISASM_TARGET: &str = "disasm";

/// Emulator verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Nothing at all, warnings included
    Disabled,
    /// Warnings and errors
    Off,
    /// API call records
    #[default]
    Default,
    /// Internal decisions
    Debug,
    /// Per-instruction disassembly
    Disasm,
    /// Everything, register dumps included
    Dump,
}

impl Verbosity {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            Verbosity::Disabled => LevelFilter::OFF,
            Verbosity::Off => LevelFilter::WARN,
            Verbosity::Default => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
            Verbosity::Disasm | Verbosity::Dump => LevelFilter::TRACE,
        }
    }

    /// Whether per-instruction disassembly should be produced
    pub fn wants_disasm(&self) -> bool {
        *self >= Verbosity::Disasm
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verbosity::Disabled => "disabled",
            Verbosity::Off => "off",
            Verbosity::Default => "default",
            Verbosity::Debug => "debug",
            Verbosity::Disasm => "disasm",
            Verbosity::Dump => "dump",
        };
        f.write_str(name)
    }
}

impl FromStr for Verbosity {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(Verbosity::Disabled),
            "off" => Ok(Verbosity::Off),
            "default" | "info" => Ok(Verbosity::Default),
            "debug" => Ok(Verbosity::Debug),
            "disasm" => Ok(Verbosity::Disasm),
            "dump" => Ok(Verbosity::Dump),
            other => Err(EmuError::InvalidConfig(format!("unknown verbosity '{other}'"))),
        }
    }
}

/// Install a console subscriber at the given verbosity
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(verbosity: Verbosity) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(verbosity.level_filter())
        .with_target(true)
        .try_init()
        .is_ok()
}
