use log::trace;

use crate::allocator;
use crate::config::Config;
use crate::constants::*;
use crate::error::{Result, VmError};
use crate::memory::PhysicalStore;
use crate::scanner;
use crate::vm::Stats;

/// Low `offset_width` bits of `va`.
#[inline]
pub fn offset(va: u64, config: &Config) -> u64 {
    va & (config.page_size() - 1)
}

/// `va` without its offset bits; the virtual page number.
#[inline]
pub fn path(va: u64, config: &Config) -> u64 {
    va >> config.offset_width()
}

/// Table slot selected by `path` at `level`; level 0 is the root and takes
/// the most significant segment.
#[inline]
pub fn segment_at(path: u64, level: u32, config: &Config) -> u64 {
    let width = config.segment_width();
    let shift = width * (config.tables_depth() - 1 - level);
    (path >> shift) & ((1 << width) - 1)
}

/// Inverse of the decomposition: rebuild an address from its segments,
/// root first, and its offset.
pub fn compose(segments: &[u64], offset: u64, config: &Config) -> u64 {
    let path = segments
        .iter()
        .fold(0, |path, &segment| (path << config.segment_width()) | segment);
    (path << config.offset_width()) | offset
}

/// Physical cell `offset` of `frame`.
#[inline]
pub fn physical_address(frame: FrameIndex, offset: u64, config: &Config) -> u64 {
    frame * config.page_size() + offset
}

/// Represents the decomposed components of a Virtual Address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: u64,
    /// Virtual page number, also the page's identity on the swap disk.
    pub page: PageNumber,
    pub offset: u64,
}

impl VirtualAddress {
    /// Decompose a raw VA into its components
    pub fn from_raw(va: u64, config: &Config) -> Self {
        VirtualAddress {
            va,
            page: path(va, config),
            offset: offset(va, config),
        }
    }

    #[inline]
    pub fn segment(&self, level: u32, config: &Config) -> u64 {
        segment_at(self.page, level, config)
    }

    /// All table slots along the walk, root first.
    pub fn segments(&self, config: &Config) -> Vec<u64> {
        (0..config.tables_depth())
            .map(|level| self.segment(level, config))
            .collect()
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({:#x}) = (page={:#x}, offset={})", self.va, self.page, self.offset)
    }
}

/// Translate a virtual address to a physical address, faulting in every
/// missing table and the page itself.
///
/// Each missing entry gets a frame from [`allocator::allocate`]; frames
/// that will hold a table are zeroed before they are linked in. The page
/// frame is always asked to swap in its page, which is a no-op when it
/// is already resident.
pub fn translate<S: PhysicalStore>(
    va: &VirtualAddress,
    store: &mut S,
    config: &Config,
    stats: &mut Stats,
) -> Result<u64> {
    let depth = config.tables_depth();
    let mut frame = ROOT_FRAME;

    for level in 0..depth {
        let slot = va.segment(level, config);
        let mut entry = store.read_cell(frame, slot);

        if entry == EMPTY_ENTRY {
            let allocation = allocator::allocate(store, config, va.page)
                .ok_or(VmError::Exhaustion { address: va.va })?;
            stats.record_fault(allocation.strategy);

            if level + 1 < depth {
                scanner::clear_frame(store, allocation.frame);
            } else {
                stats.page_ins += 1;
            }
            entry = allocation.frame as Word;
            store.write_cell(frame, slot, entry);
        }

        trace!("{}: level {} slot {} -> frame {}", va, level, slot, entry);
        frame = entry as FrameIndex;
    }

    store.swap_in(frame, va.page);
    Ok(physical_address(frame, va.offset, config))
}
