//! 反汇编器（Disassembler）
//!
//! Thin wrapper over capstone. The capstone mode and byte order are picked
//! from a fixed per-ISA table; big-endian x86 and Cortex-M are rejected.

use std::fmt;

use capstone::prelude::*;
use emu_core::{EmuError, Endian, GuestArch, GuestMemory, Result};

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    pub address: u64,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
    pub op_str: String,
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self.bytes.iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "{:#010x}: {:<24} {} {}", self.address, hex.join(" "), self.mnemonic, self.op_str)
    }
}

pub struct Disassembler {
    cs: Capstone,
    arch: GuestArch,
}

fn cs_endian(endian: Endian) -> capstone::Endian {
    match endian {
        Endian::Little => capstone::Endian::Little,
        Endian::Big => capstone::Endian::Big,
    }
}

fn backend_err(e: capstone::Error) -> EmuError {
    EmuError::Backend {
        backend: "capstone",
        message: e.to_string(),
    }
}

impl Disassembler {
    pub fn new(arch: GuestArch, endian: Endian, thumb: bool) -> Result<Self> {
        let unsupported = EmuError::UnsupportedArch {
            arch,
            endian,
            component: "disassembler",
        };

        let cs = match (arch, endian) {
            (GuestArch::X86, Endian::Little) => Capstone::new()
                .x86()
                .mode(capstone::arch::x86::ArchMode::Mode32)
                .build(),
            (GuestArch::X8664, Endian::Little) => Capstone::new()
                .x86()
                .mode(capstone::arch::x86::ArchMode::Mode64)
                .build(),
            (GuestArch::Arm, _) => {
                let mode = if thumb {
                    capstone::arch::arm::ArchMode::Thumb
                } else {
                    capstone::arch::arm::ArchMode::Arm
                };
                Capstone::new()
                    .arm()
                    .mode(mode)
                    .endian(cs_endian(endian))
                    .build()
            }
            (GuestArch::CortexM, Endian::Little) => Capstone::new()
                .arm()
                .mode(capstone::arch::arm::ArchMode::Thumb)
                .extra_mode([capstone::arch::arm::ArchExtraMode::MClass].iter().copied())
                .build(),
            (GuestArch::Arm64, _) => Capstone::new()
                .arm64()
                .mode(capstone::arch::arm64::ArchMode::Arm)
                .endian(cs_endian(endian))
                .build(),
            (GuestArch::Mips, _) => Capstone::new()
                .mips()
                .mode(capstone::arch::mips::ArchMode::Mips32)
                .endian(cs_endian(endian))
                .build(),
            (GuestArch::X86 | GuestArch::X8664 | GuestArch::CortexM, Endian::Big) => {
                return Err(unsupported);
            }
        }
        .map_err(backend_err)?;

        tracing::debug!("capstone ready for {} ({})", arch, endian);
        Ok(Self { cs, arch })
    }

    pub fn arch(&self) -> GuestArch {
        self.arch
    }

    /// Decode every instruction in `code`, assumed to live at `address`
    pub fn disasm(&self, code: &[u8], address: u64) -> Result<Vec<Insn>> {
        let insns = self.cs.disasm_all(code, address).map_err(backend_err)?;
        Ok(insns
            .iter()
            .map(|i| Insn {
                address: i.address(),
                bytes: i.bytes().to_vec(),
                mnemonic: i.mnemonic().unwrap_or_default().to_string(),
                op_str: i.op_str().unwrap_or_default().to_string(),
            })
            .collect())
    }

    /// Decode the first instruction found at `address` in guest memory
    pub fn disasm_at(&self, mem: &dyn GuestMemory, address: u64, max_len: usize) -> Result<Option<Insn>> {
        let code = mem.read_bytes(address, max_len)?;
        Ok(self.disasm(&code, address)?.into_iter().next())
    }
}

impl fmt::Debug for Disassembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disassembler").field("arch", &self.arch).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x86_decode() {
        let cs = Disassembler::new(GuestArch::X86, Endian::Little, false).unwrap();
        // push ebp; mov ebp, esp; ret
        let insns = cs.disasm(&[0x55, 0x89, 0xe5, 0xc3], 0x1000).unwrap();
        let mnemonics: Vec<_> = insns.iter().map(|i| i.mnemonic.as_str()).collect();
        assert_eq!(mnemonics, ["push", "mov", "ret"]);
        assert_eq!(insns[1].address, 0x1001);
        assert_eq!(insns[1].op_str, "ebp, esp");
    }

    #[test]
    fn test_big_endian_x86_rejected() {
        let err = Disassembler::new(GuestArch::X8664, Endian::Big, false).unwrap_err();
        assert!(matches!(err, EmuError::UnsupportedArch { component: "disassembler", .. }));
    }

    #[test]
    fn test_mips_byte_order() {
        // addiu $sp, $sp, -8
        let le = Disassembler::new(GuestArch::Mips, Endian::Little, false).unwrap();
        let be = Disassembler::new(GuestArch::Mips, Endian::Big, false).unwrap();
        let a = le.disasm(&[0xf8, 0xff, 0xbd, 0x27], 0).unwrap();
        let b = be.disasm(&[0x27, 0xbd, 0xff, 0xf8], 0).unwrap();
        assert_eq!(a[0].mnemonic, "addiu");
        assert_eq!(a[0].mnemonic, b[0].mnemonic);
        assert_eq!(a[0].op_str, b[0].op_str);
    }
}
