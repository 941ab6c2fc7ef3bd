//! Architecture and byte-order tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EmuError;

/// Supported guest instruction-set architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestArch {
    X86,
    X8664,
    Arm,
    Arm64,
    CortexM,
    Mips,
}

impl GuestArch {
    /// Native word width in bits
    pub fn bits(&self) -> u32 {
        match self {
            GuestArch::X86 | GuestArch::Arm | GuestArch::CortexM | GuestArch::Mips => 32,
            GuestArch::X8664 | GuestArch::Arm64 => 64,
        }
    }

    /// Native pointer width in bytes
    pub fn pointer_size(&self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Byte orders this architecture can run in
    pub fn supported_endians(&self) -> &'static [Endian] {
        match self {
            GuestArch::X86 | GuestArch::X8664 | GuestArch::CortexM => &[Endian::Little],
            GuestArch::Arm | GuestArch::Arm64 | GuestArch::Mips => &[Endian::Little, Endian::Big],
        }
    }

    pub fn all() -> &'static [GuestArch] {
        &[
            GuestArch::X86,
            GuestArch::X8664,
            GuestArch::Arm,
            GuestArch::Arm64,
            GuestArch::CortexM,
            GuestArch::Mips,
        ]
    }
}

impl fmt::Display for GuestArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuestArch::X86 => "x86",
            GuestArch::X8664 => "x8664",
            GuestArch::Arm => "arm",
            GuestArch::Arm64 => "arm64",
            GuestArch::CortexM => "cortex_m",
            GuestArch::Mips => "mips",
        };
        f.write_str(name)
    }
}

impl FromStr for GuestArch {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "i386" => Ok(GuestArch::X86),
            "x8664" | "x86_64" | "amd64" => Ok(GuestArch::X8664),
            "arm" => Ok(GuestArch::Arm),
            "arm64" | "aarch64" => Ok(GuestArch::Arm64),
            "cortex_m" | "cortexm" => Ok(GuestArch::CortexM),
            "mips" | "mips32" => Ok(GuestArch::Mips),
            other => Err(EmuError::InvalidConfig(format!("unknown architecture '{other}'"))),
        }
    }
}

/// Guest byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Little => f.write_str("little endian"),
            Endian::Big => f.write_str("big endian"),
        }
    }
}

impl FromStr for Endian {
    type Err = EmuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "el" | "little" | "le" => Ok(Endian::Little),
            "eb" | "big" | "be" => Ok(Endian::Big),
            other => Err(EmuError::InvalidConfig(format!("unknown endianness '{other}'"))),
        }
    }
}

/// Optional CPU model selection
///
/// Models only narrow the engine configuration; a model from another ISA
/// family is rejected when the engine is first built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuModel {
    Arm926,
    Arm1176,
    CortexA7,
    CortexA15,
    CortexM0,
    CortexM3,
    CortexM4,
    CortexM7,
    CortexA53,
    CortexA72,
    Mips24Kc,
    Mips34Kf,
    Mips74Kf,
    X86Qemu32,
    X86Qemu64,
}

impl CpuModel {
    /// Whether the model can drive the given architecture
    pub fn fits(&self, arch: GuestArch) -> bool {
        use CpuModel::*;
        match self {
            Arm926 | Arm1176 | CortexA7 | CortexA15 => arch == GuestArch::Arm,
            CortexM0 | CortexM3 | CortexM4 | CortexM7 => arch == GuestArch::CortexM,
            CortexA53 | CortexA72 => arch == GuestArch::Arm64,
            Mips24Kc | Mips34Kf | Mips74Kf => arch == GuestArch::Mips,
            X86Qemu32 => arch == GuestArch::X86,
            X86Qemu64 => arch == GuestArch::X8664,
        }
    }
}
