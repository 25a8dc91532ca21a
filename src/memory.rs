use std::collections::HashMap;

use log::{debug, trace};

use crate::config::Config;
use crate::constants::*;

/// Backing store the translation unit runs on: a flat array of cells
/// grouped into frames, and a swap area keyed by virtual page number.
pub trait PhysicalStore {
    /// Cells per frame.
    fn page_size(&self) -> u64;

    fn read(&self, address: u64) -> Word;

    fn write(&mut self, address: u64, value: Word);

    /// Persist the content of `frame` as the image of `page`.
    fn swap_out(&mut self, frame: FrameIndex, page: PageNumber);

    /// Make `frame` hold the content of `page`: the saved image if there is
    /// one, a zero page otherwise. No-op when `page` is already resident in
    /// `frame`.
    fn swap_in(&mut self, frame: FrameIndex, page: PageNumber);

    /// Zero every frame and forget every saved and resident page.
    fn reset(&mut self);

    #[inline]
    fn read_cell(&self, frame: FrameIndex, index: u64) -> Word {
        self.read(frame * self.page_size() + index)
    }

    #[inline]
    fn write_cell(&mut self, frame: FrameIndex, index: u64, value: Word) {
        let address = frame * self.page_size() + index;
        self.write(address, value);
    }

    fn clear_frame(&mut self, frame: FrameIndex) {
        for index in 0..self.page_size() {
            self.write_cell(frame, index, 0);
        }
    }

    fn is_frame_empty(&self, frame: FrameIndex) -> bool {
        (0..self.page_size()).all(|index| self.read_cell(frame, index) == 0)
    }
}

/// Simulated RAM: `num_frames * page_size` words plus a paging disk.
pub struct PhysicalMemory {
    data: Box<[Word]>,
    page_size: u64,
    disk: SwapDisk,
    /// Page each frame currently holds, for frames that hold one.
    resident: HashMap<FrameIndex, PageNumber>,
}

impl PhysicalMemory {
    /// Create a physical memory for `config`, initialized to all zeros
    pub fn new(config: &Config) -> Self {
        PhysicalMemory {
            data: vec![0; config.ram_size() as usize].into_boxed_slice(),
            page_size: config.page_size(),
            disk: SwapDisk::new(),
            resident: HashMap::new(),
        }
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(&self, frame: FrameIndex) -> u64 {
        frame * self.page_size
    }

    pub fn num_frames(&self) -> u64 {
        self.data.len() as u64 / self.page_size
    }

    pub fn frame(&self, frame: FrameIndex) -> &[Word] {
        let start = self.frame_to_address(frame) as usize;
        &self.data[start..start + self.page_size as usize]
    }

    fn frame_mut(&mut self, frame: FrameIndex) -> &mut [Word] {
        let start = self.frame_to_address(frame) as usize;
        let end = start + self.page_size as usize;
        &mut self.data[start..end]
    }

    pub fn disk(&self) -> &SwapDisk {
        &self.disk
    }

    /// Page currently loaded into `frame`, if any.
    pub fn resident_page(&self, frame: FrameIndex) -> Option<PageNumber> {
        self.resident.get(&frame).copied()
    }
}

impl PhysicalStore for PhysicalMemory {
    #[inline]
    fn page_size(&self) -> u64 {
        self.page_size
    }

    #[inline]
    fn read(&self, address: u64) -> Word {
        self.data[address as usize]
    }

    #[inline]
    fn write(&mut self, address: u64, value: Word) {
        self.data[address as usize] = value;
    }

    fn swap_out(&mut self, frame: FrameIndex, page: PageNumber) {
        debug!("swap out: page {} from frame {}", page, frame);
        let image = self.frame(frame).to_vec();
        self.disk.store(page, image);
        self.resident.remove(&frame);
    }

    fn swap_in(&mut self, frame: FrameIndex, page: PageNumber) {
        if self.resident.get(&frame) == Some(&page) {
            trace!("swap in: page {} already resident in frame {}", page, frame);
            return;
        }

        match self.disk.take(page) {
            Some(image) => {
                debug!("swap in: page {} into frame {}", page, frame);
                self.frame_mut(frame).copy_from_slice(&image);
            }
            None => {
                debug!("swap in: fresh zero page {} into frame {}", page, frame);
                self.frame_mut(frame).fill(0);
            }
        }
        self.resident.insert(frame, page);
    }

    fn reset(&mut self) {
        debug!(
            "reset: dropping {} resident and {} swapped pages",
            self.resident.len(),
            self.disk.len()
        );
        self.data.fill(0);
        self.resident.clear();
        self.disk = SwapDisk::new();
    }

    // Frame-level overrides work on slices instead of per-cell addressing.

    fn clear_frame(&mut self, frame: FrameIndex) {
        self.resident.remove(&frame);
        self.frame_mut(frame).fill(0);
    }

    fn is_frame_empty(&self, frame: FrameIndex) -> bool {
        self.frame(frame).iter().all(|&cell| cell == 0)
    }
}

/// Paging disk - page images saved on eviction, keyed by page number
#[derive(Debug, Default)]
pub struct SwapDisk {
    blocks: HashMap<PageNumber, Box<[Word]>>,
    writes: u64,
}

impl SwapDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `image` as the content of `page`, replacing any older image
    pub fn store(&mut self, page: PageNumber, image: Vec<Word>) {
        self.blocks.insert(page, image.into_boxed_slice());
        self.writes += 1;
    }

    /// Remove and return the saved image of `page`
    pub fn take(&mut self, page: PageNumber) -> Option<Box<[Word]>> {
        self.blocks.remove(&page)
    }

    pub fn contains(&self, page: PageNumber) -> bool {
        self.blocks.contains_key(&page)
    }

    /// Number of pages currently held on disk
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total swap-outs performed
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> PhysicalMemory {
        PhysicalMemory::new(&Config::new(6, 2, 2, 8).unwrap())
    }

    #[test]
    fn test_pm_initialization() {
        let pm = small();
        assert_eq!(pm.num_frames(), 8);
        assert_eq!(pm.read(0), 0);
        assert_eq!(pm.read(31), 0);
        assert!(pm.disk().is_empty());
    }

    #[test]
    fn test_pm_read_write() {
        let mut pm = small();
        pm.write(9, 42);
        assert_eq!(pm.read(9), 42);

        pm.write(9, -7);
        assert_eq!(pm.read(9), -7);
    }

    #[test]
    fn test_cell_addressing() {
        let mut pm = small();
        pm.write_cell(3, 2, 11);
        assert_eq!(pm.read(3 * 4 + 2), 11);
        assert_eq!(pm.read_cell(3, 2), 11);
        assert_eq!(pm.frame(3), &[0, 0, 11, 0]);
    }

    #[test]
    fn test_frame_to_address() {
        let pm = small();
        assert_eq!(pm.frame_to_address(0), 0);
        assert_eq!(pm.frame_to_address(1), 4);
        assert_eq!(pm.frame_to_address(7), 28);
    }

    #[test]
    fn test_clear_and_empty() {
        let mut pm = small();
        assert!(pm.is_frame_empty(2));
        pm.write_cell(2, 3, 1);
        assert!(!pm.is_frame_empty(2));
        pm.clear_frame(2);
        assert!(pm.is_frame_empty(2));
    }

    #[test]
    fn test_swap_out_then_in_elsewhere() {
        let mut pm = small();
        for i in 0..4 {
            pm.write_cell(5, i, 10 + i as Word);
        }
        pm.swap_out(5, 9);
        assert!(pm.disk().contains(9));
        assert_eq!(pm.disk().len(), 1);
        assert_eq!(pm.disk().writes(), 1);

        pm.swap_in(2, 9);
        assert_eq!(pm.frame(2), &[10, 11, 12, 13]);
        assert!(!pm.disk().contains(9));
        assert_eq!(pm.resident_page(2), Some(9));
    }

    #[test]
    fn test_swap_in_unknown_page_is_zeroed() {
        let mut pm = small();
        pm.write_cell(4, 0, 99);
        pm.swap_in(4, 3);
        assert_eq!(pm.frame(4), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_swap_in_is_idempotent_when_resident() {
        let mut pm = small();
        pm.swap_in(4, 3);
        pm.write_cell(4, 1, 5);
        pm.swap_in(4, 3);
        assert_eq!(pm.read_cell(4, 1), 5);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut pm = small();
        pm.swap_in(4, 3);
        pm.write_cell(4, 0, 8);
        pm.write_cell(6, 1, 2);
        pm.swap_out(6, 11);
        pm.reset();

        assert_eq!(pm.resident_page(4), None);
        assert!(pm.disk().is_empty());
        assert!((0..pm.num_frames()).all(|f| pm.is_frame_empty(f)));

        // page 3 is no longer resident, so it comes back zeroed
        pm.write_cell(4, 0, 8);
        pm.swap_in(4, 3);
        assert_eq!(pm.read_cell(4, 0), 0);
    }

    #[test]
    fn test_clear_frame_forgets_resident_page() {
        let mut pm = small();
        pm.swap_in(4, 3);
        pm.clear_frame(4);
        assert_eq!(pm.resident_page(4), None);
    }
}
