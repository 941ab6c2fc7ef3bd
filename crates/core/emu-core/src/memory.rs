//! Guest memory contract and a sparse software implementation
//!
//! The emulation core only relies on the pointer contract expressed by
//! [`GuestMemory`]: raw byte reads/writes plus width-aware pointer access.
//! Typed marshaling (pointers, narrow and wide strings) is layered on top as
//! provided trait methods so every memory backend gets them for free.

use std::collections::HashMap;

use crate::arch::{Endian, GuestArch};
use crate::error::{EmuError, Result};

/// Page granularity of [`SoftMemory`]
pub const PAGE_SIZE: u64 = 0x1000;

/// Upper bound on string reads, in characters
pub const MAX_STRING_LEN: usize = 0x8000;

/// Pointer contract consumed by the emulation core
pub trait GuestMemory {
    /// Read `buf.len()` bytes starting at `addr`
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `addr`
    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()>;

    /// Native pointer width in bytes
    fn pointer_size(&self) -> usize;

    /// Byte order used for multi-byte values
    fn endian(&self) -> Endian;

    /// Whether every byte of `addr..addr + len` is mapped
    fn is_mapped(&self, addr: u64, len: usize) -> bool;

    /// Read `len` bytes; the range is checked before any host allocation
    fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        if !self.is_mapped(addr, len) {
            return Err(EmuError::MemoryFault { addr, size: len });
        }
        let mut buf = vec![0u8; len];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    /// Read an unsigned integer of `width` bytes (native pointer width by default)
    fn read_ptr(&self, addr: u64, width: Option<usize>) -> Result<u64> {
        let width = check_width(width.unwrap_or_else(|| self.pointer_size()))?;
        let mut buf = [0u8; 8];
        self.read(addr, &mut buf[..width])?;
        Ok(unpack(&buf[..width], self.endian()))
    }

    /// Write the low `width` bytes of `value` (native pointer width by default)
    fn write_ptr(&mut self, addr: u64, value: u64, width: Option<usize>) -> Result<()> {
        let width = check_width(width.unwrap_or_else(|| self.pointer_size()))?;
        let bytes = pack(value, width, self.endian());
        self.write(addr, &bytes)
    }

    /// Read a null-terminated single-byte string
    fn read_cstring(&self, addr: u64) -> Result<String> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..MAX_STRING_LEN as u64 {
            self.read(addr + i, &mut byte)?;
            if byte[0] == 0 {
                break;
            }
            bytes.push(byte[0]);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a null-terminated UTF-16LE string
    fn read_wstring(&self, addr: u64) -> Result<String> {
        let mut units = Vec::new();
        let mut unit = [0u8; 2];
        for i in 0..MAX_STRING_LEN as u64 {
            self.read(addr + i * 2, &mut unit)?;
            let c = u16::from_le_bytes(unit);
            if c == 0 {
                break;
            }
            units.push(c);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Write `s` followed by a null byte; returns the number of bytes written
    fn write_cstring(&mut self, addr: u64, s: &str) -> Result<usize> {
        let data = encode_cstring(s);
        self.write(addr, &data)?;
        Ok(data.len())
    }

    /// Write `s` as UTF-16LE followed by a null code unit; returns bytes written
    fn write_wstring(&mut self, addr: u64, s: &str) -> Result<usize> {
        let data = encode_wstring(s);
        self.write(addr, &data)?;
        Ok(data.len())
    }
}

fn check_width(width: usize) -> Result<usize> {
    match width {
        1 | 2 | 4 | 8 => Ok(width),
        other => Err(EmuError::InvalidConfig(format!("unsupported integer width {other}"))),
    }
}

/// Decode an unsigned integer from up to eight bytes
pub fn unpack(bytes: &[u8], endian: Endian) -> u64 {
    let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
    match endian {
        Endian::Little => bytes.iter().rev().fold(0, fold),
        Endian::Big => bytes.iter().fold(0, fold),
    }
}

/// Encode the low `width` bytes of `value`
pub fn pack(value: u64, width: usize, endian: Endian) -> Vec<u8> {
    let le = value.to_le_bytes();
    let mut out = le[..width.min(8)].to_vec();
    if endian == Endian::Big {
        out.reverse();
    }
    out
}

/// Single-byte encoding with terminator
pub fn encode_cstring(s: &str) -> Vec<u8> {
    let mut data = s.as_bytes().to_vec();
    data.push(0);
    data
}

/// UTF-16LE encoding with terminator
pub fn encode_wstring(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Decode single-byte data up to the first null (or the end of the slice)
pub fn decode_cstring(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Decode UTF-16LE data up to the first null code unit (or the end of the slice)
pub fn decode_wstring(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&c| c != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

// ============================================================================
// 软件内存实现
// ============================================================================

/// A mapped region of [`SoftMemory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRegion {
    pub base: u64,
    pub size: u64,
    pub label: String,
}

impl MemRegion {
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }
}

/// Sparse, page-granular guest memory
///
/// Pages are allocated on first write and read as zeros until then. Any
/// access touching an unmapped page fails with [`EmuError::MemoryFault`]
/// before a single byte is transferred.
pub struct SoftMemory {
    pages: HashMap<u64, Box<[u8]>>,
    regions: Vec<MemRegion>,
    pointer_size: usize,
    endian: Endian,
}

impl SoftMemory {
    pub fn new(arch: GuestArch, endian: Endian) -> Self {
        Self {
            pages: HashMap::new(),
            regions: Vec::new(),
            pointer_size: arch.pointer_size(),
            endian,
        }
    }

    /// Map `size` bytes at `base`; both must be page aligned
    pub fn map(&mut self, base: u64, size: u64, label: impl Into<String>) -> Result<()> {
        if base % PAGE_SIZE != 0 || size == 0 || size % PAGE_SIZE != 0 {
            return Err(EmuError::InvalidConfig(format!(
                "mapping {base:#x}+{size:#x} is not page aligned"
            )));
        }
        let end = base
            .checked_add(size)
            .ok_or_else(|| EmuError::InvalidConfig(format!("mapping {base:#x}+{size:#x} overflows")))?;

        if self.regions.iter().any(|r| base < r.end() && r.base < end) {
            return Err(EmuError::InvalidConfig(format!(
                "mapping {base:#x}-{end:#x} overlaps an existing region"
            )));
        }

        self.regions.push(MemRegion {
            base,
            size,
            label: label.into(),
        });
        self.regions.sort_by_key(|r| r.base);
        tracing::trace!("mapped {:#x}-{:#x}", base, end);
        Ok(())
    }

    /// Unmap a region previously mapped with exactly this base and size
    pub fn unmap(&mut self, base: u64, size: u64) -> Result<()> {
        let idx = self
            .regions
            .iter()
            .position(|r| r.base == base && r.size == size)
            .ok_or(EmuError::MemoryFault {
                addr: base,
                size: size as usize,
            })?;
        self.regions.remove(idx);
        for page in (base / PAGE_SIZE)..((base + size) / PAGE_SIZE) {
            self.pages.remove(&page);
        }
        Ok(())
    }

    pub fn regions(&self) -> &[MemRegion] {
        &self.regions
    }

    fn chunks(addr: u64, len: usize) -> impl Iterator<Item = (u64, usize, usize, usize)> {
        let mut done = 0usize;
        std::iter::from_fn(move || {
            if done >= len {
                return None;
            }
            let cur = addr + done as u64;
            let page = cur / PAGE_SIZE;
            let off = (cur % PAGE_SIZE) as usize;
            let n = (PAGE_SIZE as usize - off).min(len - done);
            let item = (page, off, done, n);
            done += n;
            Some(item)
        })
    }
}

impl GuestMemory for SoftMemory {
    fn read(&self, addr: u64, buf: &mut [u8]) -> Result<()> {
        if !self.is_mapped(addr, buf.len()) {
            return Err(EmuError::MemoryFault {
                addr,
                size: buf.len(),
            });
        }
        for (page, off, done, n) in Self::chunks(addr, buf.len()) {
            match self.pages.get(&page) {
                Some(data) => buf[done..done + n].copy_from_slice(&data[off..off + n]),
                // never written
                None => buf[done..done + n].fill(0),
            }
        }
        Ok(())
    }

    fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        if !self.is_mapped(addr, data.len()) {
            return Err(EmuError::MemoryFault {
                addr,
                size: data.len(),
            });
        }
        for (page, off, done, n) in Self::chunks(addr, data.len()) {
            let dst = self
                .pages
                .entry(page)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice());
            dst[off..off + n].copy_from_slice(&data[done..done + n]);
        }
        Ok(())
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn is_mapped(&self, addr: u64, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        let Some(last) = addr.checked_add(len as u64 - 1) else {
            return false;
        };
        // walk region by region, not page by page
        let mut cursor = addr;
        loop {
            let Some(region) = self.regions.iter().find(|r| r.contains(cursor)) else {
                return false;
            };
            if region.end() > last {
                return true;
            }
            cursor = region.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem32() -> SoftMemory {
        let mut mem = SoftMemory::new(GuestArch::X86, Endian::Little);
        mem.map(0x1000, 0x2000, "test").unwrap();
        mem
    }

    #[test]
    fn test_unmapped_access_faults() {
        let mem = mem32();
        let mut buf = [0u8; 4];
        assert_eq!(
            mem.read(0x2ffe, &mut buf),
            Err(EmuError::MemoryFault { addr: 0x2ffe, size: 4 })
        );
        assert!(mem.read(0x2ffc, &mut buf).is_ok());
    }

    #[test]
    fn test_cross_page_write() {
        let mut mem = mem32();
        mem.write(0x1ffe, &[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.read_bytes(0x1ffe, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pointer_width_and_endian() {
        let mut mem = mem32();
        mem.write_ptr(0x1000, 0x1122_3344, None).unwrap();
        assert_eq!(mem.read_bytes(0x1000, 4).unwrap(), vec![0x44, 0x33, 0x22, 0x11]);
        assert_eq!(mem.read_ptr(0x1000, Some(2)).unwrap(), 0x3344);

        let mut be = SoftMemory::new(GuestArch::Mips, Endian::Big);
        be.map(0, 0x1000, "be").unwrap();
        be.write_ptr(0x10, 0xdead_beef, None).unwrap();
        assert_eq!(be.read_bytes(0x10, 4).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(be.read_ptr(0x10, None).unwrap(), 0xdead_beef);
    }

    #[test]
    fn test_write_ptr_truncates_to_width() {
        let mut mem = SoftMemory::new(GuestArch::X8664, Endian::Little);
        mem.map(0, 0x1000, "m").unwrap();
        mem.write_ptr(0x20, u64::MAX, None).unwrap();
        mem.write_ptr(0x20, 6, Some(4)).unwrap();
        assert_eq!(mem.read_ptr(0x20, None).unwrap(), 0xffff_ffff_0000_0006);
    }

    #[test]
    fn test_strings() {
        let mut mem = mem32();
        assert_eq!(mem.write_cstring(0x1100, "hello").unwrap(), 6);
        assert_eq!(mem.read_cstring(0x1100).unwrap(), "hello");
        assert_eq!(mem.write_wstring(0x1200, "héllo").unwrap(), 12);
        assert_eq!(mem.read_wstring(0x1200).unwrap(), "héllo");
    }

    #[test]
    fn test_overlapping_map_rejected() {
        let mut mem = mem32();
        assert!(mem.map(0x2000, 0x1000, "dup").is_err());
        assert!(mem.map(0x1234, 0x1000, "unaligned").is_err());
        mem.unmap(0x1000, 0x2000).unwrap();
        assert!(!mem.is_mapped(0x1000, 1));
    }

    #[test]
    fn test_oversized_read_faults_before_allocating() {
        let mut mem = mem32();
        mem.map(0x3000, 0x1000, "adjacent").unwrap();
        assert!(mem.is_mapped(0x1800, 0x2800));
        assert!(!mem.is_mapped(0x1800, 0x2801));
        assert!(!mem.is_mapped(u64::MAX, 2));

        assert_eq!(
            mem.read_bytes(0x1000, 0xffff_ffff),
            Err(EmuError::MemoryFault { addr: 0x1000, size: 0xffff_ffff })
        );
        assert!(mem.read_bytes(0x1000, usize::MAX).is_err());
    }

    #[test]
    fn test_decode_helpers() {
        assert_eq!(decode_cstring(b"abc\0def"), "abc");
        assert_eq!(decode_wstring(&encode_wstring("xy")), "xy");
        assert_eq!(pack(0x0102, 2, Endian::Big), vec![1, 2]);
        assert_eq!(unpack(&[1, 2], Endian::Big), 0x0102);
    }
}
