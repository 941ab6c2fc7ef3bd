//! 汇编器（Assembler）
//!
//! keystone is an optional backend (`keystone` feature). Builds without it
//! still expose the type; constructing one fails with
//! [`EmuError::BackendUnavailable`].

use emu_core::{EmuError, Endian, GuestArch, Result};

#[cfg(feature = "keystone")]
use keystone_engine::{Arch as KsArch, Keystone, Mode as KsMode};

pub struct Assembler {
    #[cfg(feature = "keystone")]
    ks: Keystone,
    arch: GuestArch,
}

#[cfg(feature = "keystone")]
fn ks_mode(arch: GuestArch, endian: Endian, thumb: bool) -> Result<(KsArch, KsMode)> {
    let order = match endian {
        Endian::Little => KsMode::LITTLE_ENDIAN,
        Endian::Big => KsMode::BIG_ENDIAN,
    };
    match (arch, endian) {
        (GuestArch::X86, Endian::Little) => Ok((KsArch::X86, KsMode::MODE_32)),
        (GuestArch::X8664, Endian::Little) => Ok((KsArch::X86, KsMode::MODE_64)),
        (GuestArch::Arm, _) => {
            let isa = if thumb { KsMode::THUMB } else { KsMode::ARM };
            Ok((KsArch::ARM, isa | order))
        }
        (GuestArch::CortexM, Endian::Little) => Ok((KsArch::ARM, KsMode::ARM | KsMode::THUMB)),
        (GuestArch::Arm64, _) => Ok((KsArch::ARM64, order)),
        (GuestArch::Mips, _) => Ok((KsArch::MIPS, KsMode::MIPS32 | order)),
        (GuestArch::X86 | GuestArch::X8664 | GuestArch::CortexM, Endian::Big) => {
            Err(EmuError::UnsupportedArch {
                arch,
                endian,
                component: "assembler",
            })
        }
    }
}

impl Assembler {
    #[cfg(feature = "keystone")]
    pub fn new(arch: GuestArch, endian: Endian, thumb: bool) -> Result<Self> {
        let (ks_arch, mode) = ks_mode(arch, endian, thumb)?;
        let ks = Keystone::new(ks_arch, mode).map_err(|e| EmuError::Backend {
            backend: "keystone",
            message: format!("{e:?}"),
        })?;
        tracing::debug!("keystone ready for {} ({})", arch, endian);
        Ok(Self { ks, arch })
    }

    #[cfg(not(feature = "keystone"))]
    pub fn new(arch: GuestArch, endian: Endian, thumb: bool) -> Result<Self> {
        let _ = (arch, endian, thumb);
        Err(EmuError::BackendUnavailable { backend: "keystone" })
    }

    pub fn arch(&self) -> GuestArch {
        self.arch
    }

    /// Assemble `text` as if placed at `address`
    #[cfg(feature = "keystone")]
    pub fn assemble(&self, text: &str, address: u64) -> Result<Vec<u8>> {
        let out = self
            .ks
            .asm(text.to_string(), address)
            .map_err(|e| EmuError::Backend {
                backend: "keystone",
                message: format!("{e:?}"),
            })?;
        Ok(out.bytes)
    }

    #[cfg(not(feature = "keystone"))]
    pub fn assemble(&self, text: &str, address: u64) -> Result<Vec<u8>> {
        let _ = (text, address);
        Err(EmuError::BackendUnavailable { backend: "keystone" })
    }
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler").field("arch", &self.arch).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "keystone"))]
    #[test]
    fn test_backend_unavailable() {
        let err = Assembler::new(GuestArch::X86, Endian::Little, false).unwrap_err();
        assert_eq!(err, EmuError::BackendUnavailable { backend: "keystone" });
    }

    #[cfg(feature = "keystone")]
    #[test]
    fn test_assemble_x86() {
        let ks = Assembler::new(GuestArch::X86, Endian::Little, false).unwrap();
        assert_eq!(ks.assemble("ret", 0).unwrap(), vec![0xc3]);
    }
}
