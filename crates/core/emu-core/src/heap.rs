//! Guest heap
//!
//! A first-fit chunk allocator over one mapped guest region. The heap only
//! hands out addresses; the bytes live in whatever [`GuestMemory`] backs the
//! region.
//!
//! [`GuestMemory`]: crate::memory::GuestMemory

use crate::error::{EmuError, Result};

/// Allocation granularity
pub const HEAP_ALIGN: u64 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    addr: u64,
    size: u64,
    in_use: bool,
}

/// First-fit allocator over `[start, start + size)`
#[derive(Debug, Clone)]
pub struct GuestHeap {
    start: u64,
    end: u64,
    chunks: Vec<Chunk>,
}

impl GuestHeap {
    pub fn new(start: u64, size: u64) -> Self {
        Self {
            start,
            end: start + size,
            chunks: vec![Chunk {
                addr: start,
                size,
                in_use: false,
            }],
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Allocate `size` bytes, rounded up to [`HEAP_ALIGN`]
    pub fn alloc(&mut self, size: usize) -> Result<u64> {
        let want = (size.max(1) as u64).div_ceil(HEAP_ALIGN) * HEAP_ALIGN;

        let idx = self
            .chunks
            .iter()
            .position(|c| !c.in_use && c.size >= want)
            .ok_or(EmuError::OutOfMemory { size })?;

        let chunk = self.chunks[idx];
        if chunk.size > want {
            self.chunks.insert(
                idx + 1,
                Chunk {
                    addr: chunk.addr + want,
                    size: chunk.size - want,
                    in_use: false,
                },
            );
        }
        self.chunks[idx] = Chunk {
            addr: chunk.addr,
            size: want,
            in_use: true,
        };

        tracing::trace!("heap alloc {:#x} bytes at {:#x}", want, chunk.addr);
        Ok(chunk.addr)
    }

    /// Release the chunk starting at `addr`; `false` if no live chunk starts there
    pub fn free(&mut self, addr: u64) -> bool {
        let Some(idx) = self.chunks.iter().position(|c| c.addr == addr && c.in_use) else {
            return false;
        };
        self.chunks[idx].in_use = false;

        // coalesce with the following, then the preceding free chunk
        if idx + 1 < self.chunks.len() && !self.chunks[idx + 1].in_use {
            let next = self.chunks.remove(idx + 1);
            self.chunks[idx].size += next.size;
        }
        if idx > 0 && !self.chunks[idx - 1].in_use {
            let cur = self.chunks.remove(idx);
            self.chunks[idx - 1].size += cur.size;
        }
        true
    }

    /// Size of the live chunk starting at `addr`
    pub fn size_of(&self, addr: u64) -> Option<usize> {
        self.chunks
            .iter()
            .find(|c| c.addr == addr && c.in_use)
            .map(|c| c.size as usize)
    }

    pub fn in_use(&self) -> usize {
        self.chunks.iter().filter(|c| c.in_use).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_aligned_and_disjoint() {
        let mut heap = GuestHeap::new(0x5000_0000, 0x1000);
        let a = heap.alloc(3).unwrap();
        let b = heap.alloc(0x11).unwrap();
        assert_eq!(a, 0x5000_0000);
        assert_eq!(b, 0x5000_0010);
        assert_eq!(heap.size_of(b), Some(0x20));
    }

    #[test]
    fn test_free_reuses_and_coalesces() {
        let mut heap = GuestHeap::new(0x1000, 0x100);
        let a = heap.alloc(0x40).unwrap();
        let b = heap.alloc(0x40).unwrap();
        assert!(heap.free(a));
        assert!(heap.free(b));
        assert!(!heap.free(b));
        assert_eq!(heap.in_use(), 0);
        // the whole region is one chunk again
        assert_eq!(heap.alloc(0x100).unwrap(), 0x1000);
    }

    #[test]
    fn test_exhaustion() {
        let mut heap = GuestHeap::new(0, 0x20);
        heap.alloc(0x20).unwrap();
        assert_eq!(heap.alloc(1), Err(EmuError::OutOfMemory { size: 1 }));
    }
}
