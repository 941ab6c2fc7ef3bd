//! 例程参数（Routine parameters）
//!
//! A [`Params`] record is decoded once per intercepted call from the
//! routine's descriptor and owned by that call. Routines may replace a field
//! (typically a raw handle with the object it resolves to) so the post-call
//! trace shows what the call actually touched.

use std::fmt;

use emu_core::{EmuError, GuestMemory, Result};

use crate::handle::normalize_id;

/// How the raw bits of an argument are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Plain integer of the given byte width
    Int(u8),
    Bool,
    Handle,
    Pointer,
    /// Pointer the routine writes through
    OutPointer,
    /// Pointer to a null-terminated narrow string
    Str,
    /// Pointer to a null-terminated UTF-16 string
    WStr,
}

/// Windows SDK type names
pub mod types {
    use super::ParamKind;

    pub const BYTE: ParamKind = ParamKind::Int(1);
    pub const DWORD: ParamKind = ParamKind::Int(4);
    pub const REGSAM: ParamKind = ParamKind::Int(4);
    pub const TOKEN_INFORMATION_CLASS: ParamKind = ParamKind::Int(4);
    pub const BOOL: ParamKind = ParamKind::Bool;

    pub const HANDLE: ParamKind = ParamKind::Handle;
    pub const HKEY: ParamKind = ParamKind::Handle;
    pub const SC_HANDLE: ParamKind = ParamKind::Handle;

    pub const POINTER: ParamKind = ParamKind::Pointer;
    pub const LPVOID: ParamKind = ParamKind::Pointer;
    pub const LPBYTE: ParamKind = ParamKind::Pointer;
    pub const LPSTR: ParamKind = ParamKind::Pointer;
    pub const LPWSTR: ParamKind = ParamKind::Pointer;
    pub const PSID: ParamKind = ParamKind::Pointer;
    pub const PSID_IDENTIFIER_AUTHORITY: ParamKind = ParamKind::Pointer;
    pub const LPSECURITY_ATTRIBUTES: ParamKind = ParamKind::Pointer;
    pub const PFILETIME: ParamKind = ParamKind::Pointer;

    pub const LPDWORD: ParamKind = ParamKind::OutPointer;
    pub const PDWORD: ParamKind = ParamKind::OutPointer;
    pub const PHKEY: ParamKind = ParamKind::OutPointer;
    pub const PHANDLE: ParamKind = ParamKind::OutPointer;
    pub const PBOOL: ParamKind = ParamKind::OutPointer;
    pub const PPSID: ParamKind = ParamKind::OutPointer;

    pub const LPCSTR: ParamKind = ParamKind::Str;
    pub const LPCWSTR: ParamKind = ParamKind::WStr;
}

/// Decoded argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(u64),
    Bool(bool),
    Handle(u64),
    Pointer(u64),
    /// String argument; `None` for a null pointer
    Str(Option<String>),
    /// Replacement text set by the routine
    Resolved(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) | ParamValue::Handle(v) | ParamValue::Pointer(v) => write!(f, "{v:#x}"),
            ParamValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            ParamValue::Str(Some(s)) => write!(f, "\"{s}\""),
            ParamValue::Str(None) => f.write_str("0x0"),
            ParamValue::Resolved(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Bits as read from the argument slot
    pub raw: u64,
    pub value: ParamValue,
}

/// Ordered, typed arguments of one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    fields: Vec<Param>,
}

impl Params {
    /// Decode `raws` against a descriptor's parameter list
    pub fn decode(
        decl: &[(&'static str, ParamKind)],
        raws: &[u64],
        mem: &dyn GuestMemory,
    ) -> Result<Self> {
        let mut fields = Vec::with_capacity(decl.len());
        for (&(name, kind), &raw) in decl.iter().zip(raws) {
            let (raw, value) = match kind {
                ParamKind::Int(width) => {
                    let raw = raw & emu_arch::isa::width_mask(8 * width as u32);
                    (raw, ParamValue::Int(raw))
                }
                ParamKind::Bool => (raw, ParamValue::Bool(raw as u32 != 0)),
                ParamKind::Handle => {
                    let raw = normalize_id(raw);
                    (raw, ParamValue::Handle(raw))
                }
                ParamKind::Pointer | ParamKind::OutPointer => (raw, ParamValue::Pointer(raw)),
                ParamKind::Str => {
                    let s = if raw == 0 { None } else { Some(mem.read_cstring(raw)?) };
                    (raw, ParamValue::Str(s))
                }
                ParamKind::WStr => {
                    let s = if raw == 0 { None } else { Some(mem.read_wstring(raw)?) };
                    (raw, ParamValue::Str(s))
                }
            };
            fields.push(Param { name, kind, raw, value });
        }
        Ok(Self { fields })
    }

    fn field(&self, name: &str) -> Result<&Param> {
        self.fields
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EmuError::MissingParam(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|p| p.name == name)
    }

    /// Argument bits regardless of kind
    pub fn raw(&self, name: &str) -> Result<u64> {
        Ok(self.field(name)?.raw)
    }

    pub fn int(&self, name: &str) -> Result<u64> {
        let p = self.field(name)?;
        match p.kind {
            ParamKind::Int(_) | ParamKind::Bool => Ok(p.raw),
            _ => Err(EmuError::ParamType {
                name: name.to_string(),
                expected: "an integer",
            }),
        }
    }

    pub fn handle(&self, name: &str) -> Result<u64> {
        let p = self.field(name)?;
        match p.kind {
            ParamKind::Handle => Ok(p.raw),
            _ => Err(EmuError::ParamType {
                name: name.to_string(),
                expected: "a handle",
            }),
        }
    }

    pub fn ptr(&self, name: &str) -> Result<u64> {
        let p = self.field(name)?;
        match p.kind {
            ParamKind::Pointer | ParamKind::OutPointer | ParamKind::Str | ParamKind::WStr => Ok(p.raw),
            _ => Err(EmuError::ParamType {
                name: name.to_string(),
                expected: "a pointer",
            }),
        }
    }

    /// Decoded string; `None` when the guest passed a null pointer
    pub fn str(&self, name: &str) -> Result<Option<&str>> {
        match &self.field(name)?.value {
            ParamValue::Str(s) => Ok(s.as_deref()),
            _ => Err(EmuError::ParamType {
                name: name.to_string(),
                expected: "a string",
            }),
        }
    }

    pub fn value(&self, name: &str) -> Result<&ParamValue> {
        Ok(&self.field(name)?.value)
    }

    /// Replace the decoded value of `name`; the raw bits stay available
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let p = self
            .fields
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| EmuError::MissingParam(name.to_string()))?;
        p.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// `a = 0x1, b = "text"`
impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", p.name, p.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;
    use super::*;
    use emu_core::{Endian, GuestArch, SoftMemory};

    const DECL: &[(&str, ParamKind)] = &[
        ("hKey", HKEY),
        ("lpSubKey", LPCSTR),
        ("lpName", LPCWSTR),
        ("nCount", BYTE),
        ("phkResult", PHKEY),
    ];

    fn mem() -> SoftMemory {
        let mut mem = SoftMemory::new(GuestArch::X8664, Endian::Little);
        mem.map(0x1000, 0x1000, "data").unwrap();
        mem.write_cstring(0x1000, "Software").unwrap();
        mem.write_wstring(0x1100, "Wide").unwrap();
        mem
    }

    #[test]
    fn test_decode_by_kind() {
        let raws = [0xffff_ffff_8000_0002, 0x1000, 0x1100, 0x1_0000_0103, 0x2000];
        let params = Params::decode(DECL, &raws, &mem()).unwrap();
        assert_eq!(params.handle("hKey").unwrap(), 0x8000_0002);
        assert_eq!(params.str("lpSubKey").unwrap(), Some("Software"));
        assert_eq!(params.str("lpName").unwrap(), Some("Wide"));
        assert_eq!(params.int("nCount").unwrap(), 3);
        assert_eq!(params.ptr("phkResult").unwrap(), 0x2000);
    }

    #[test]
    fn test_null_string() {
        let params = Params::decode(DECL, &[0, 0, 0, 0, 0], &mem()).unwrap();
        assert_eq!(params.str("lpSubKey").unwrap(), None);
        assert_eq!(params.to_string().matches("0x0").count(), 5);
    }

    #[test]
    fn test_accessor_errors() {
        let params = Params::decode(DECL, &[0, 0, 0, 0, 0], &mem()).unwrap();
        assert_eq!(params.raw("missing"), Err(EmuError::MissingParam("missing".into())));
        assert!(matches!(params.int("hKey"), Err(EmuError::ParamType { .. })));
        assert!(matches!(params.str("phkResult"), Err(EmuError::ParamType { .. })));
    }

    #[test]
    fn test_set_shows_in_display() {
        let mut params = Params::decode(DECL, &[0x8000_0002, 0x1000, 0, 1, 0], &mem()).unwrap();
        params
            .set("hKey", ParamValue::Resolved("HKEY_LOCAL_MACHINE".into()))
            .unwrap();
        assert_eq!(params.raw("hKey").unwrap(), 0x8000_0002);
        assert_eq!(
            params.to_string(),
            "hKey = HKEY_LOCAL_MACHINE, lpSubKey = \"Software\", lpName = 0x0, nCount = 0x1, phkResult = 0x0"
        );
    }
}
