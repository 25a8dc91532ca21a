use log::{debug, info};

use crate::allocator::Strategy;
use crate::config::Config;
use crate::constants::*;
use crate::error::{Result, VmError};
use crate::memory::{PhysicalMemory, PhysicalStore};
use crate::scanner::{self, Link, Mapping};
use crate::translation::{self, VirtualAddress};

/// Running counters over the lifetime of a [`VirtualMemory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub reads: u64,
    pub writes: u64,
    /// Accesses refused at the API boundary.
    pub rejected: u64,
    /// Missing table entries hit while walking.
    pub page_faults: u64,
    pub reclaims: u64,
    pub grows: u64,
    pub evictions: u64,
    /// Faults at the last level, i.e. pages brought into a frame.
    pub page_ins: u64,
}

impl Stats {
    pub(crate) fn record_fault(&mut self, strategy: Strategy) {
        self.page_faults += 1;
        match strategy {
            Strategy::Reclaim => self.reclaims += 1,
            Strategy::Grow => self.grows += 1,
            Strategy::Evict => self.evictions += 1,
        }
    }
}

/// A single flat virtual address space over a small pool of frames.
pub struct VirtualMemory<S: PhysicalStore = PhysicalMemory> {
    config: Config,
    store: S,
    stats: Stats,
}

impl VirtualMemory<PhysicalMemory> {
    /// Create a virtual memory backed by a zeroed [`PhysicalMemory`].
    pub fn new(config: Config) -> Self {
        let store = PhysicalMemory::new(&config);
        Self::with_store(config, store)
    }
}

impl<S: PhysicalStore> VirtualMemory<S> {
    /// Wrap an existing store. The store is reset first.
    pub fn with_store(config: Config, store: S) -> Self {
        let mut vm = VirtualMemory { config, store, stats: Stats::default() };
        vm.initialize();
        vm
    }

    /// Unmap everything. Frames, resident pages and swapped images are all
    /// dropped, so every page reads as zero afterwards.
    pub fn initialize(&mut self) {
        debug!(
            "initialize: {} frames of {} cells, {} levels",
            self.config.num_frames(),
            self.config.page_size(),
            self.config.tables_depth()
        );
        self.store.reset();
        scanner::clear_frame(&mut self.store, ROOT_FRAME);
    }

    fn check_range(&mut self, address: u64) -> Result<VirtualAddress> {
        let limit = self.config.virtual_memory_size();
        if address >= limit {
            self.stats.rejected += 1;
            info!("rejected access to {:#x}", address);
            return Err(VmError::OutOfRange { address, limit });
        }
        Ok(VirtualAddress::from_raw(address, &self.config))
    }

    /// Physical address backing `address`, faulting it in if needed.
    pub fn translate(&mut self, address: u64) -> Result<u64> {
        let va = self.check_range(address)?;
        translation::translate(&va, &mut self.store, &self.config, &mut self.stats)
    }

    pub fn read(&mut self, address: u64) -> Result<Word> {
        let physical = self.translate(address)?;
        self.stats.reads += 1;
        Ok(self.store.read(physical))
    }

    pub fn write(&mut self, address: u64, value: Word) -> Result<()> {
        let physical = self.translate(address)?;
        self.stats.writes += 1;
        self.store.write(physical, value);
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Pages currently resident, in tree order.
    pub fn mapped_pages(&self) -> Vec<Mapping> {
        scanner::mapped_pages(&self.store, &self.config)
    }

    /// Every live table entry.
    pub fn references(&self) -> Vec<Link> {
        scanner::references(&self.store, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn assert_no_aliasing<S: PhysicalStore>(vm: &VirtualMemory<S>) {
        let mut seen = HashSet::new();
        for link in vm.references() {
            assert_ne!(link.child, ROOT_FRAME, "root referenced from {:?}", link);
            assert!(link.child < vm.config().num_frames(), "bad frame in {:?}", link);
            assert!(link.depth < vm.config().tables_depth(), "too deep: {:?}", link);
            assert!(seen.insert(link.child), "frame {} referenced twice", link.child);
        }
    }

    // default layout with only enough frames for one full path
    fn minimal() -> VirtualMemory {
        VirtualMemory::new(Config::new(20, 4, 4, 5).unwrap())
    }

    #[test]
    fn test_write_then_read() {
        let mut vm = VirtualMemory::new(Config::default());
        vm.write(13, 3).unwrap();
        assert_eq!(vm.read(13), Ok(3));
        assert_eq!(vm.read(12), Ok(0));
    }

    #[test]
    fn test_unwritten_memory_reads_zero() {
        let mut vm = VirtualMemory::new(Config::default());
        assert_eq!(vm.read(0xabcde), Ok(0));
        assert_eq!(vm.read(0), Ok(0));
    }

    #[test]
    fn test_range_rejection() {
        let mut vm = VirtualMemory::new(Config::default());
        let limit = VIRTUAL_MEMORY_SIZE;

        assert_eq!(vm.read(limit), Err(VmError::OutOfRange { address: limit, limit }));
        assert_eq!(vm.write(limit, 1), Err(VmError::OutOfRange { address: limit, limit }));
        assert!(vm.read(u64::MAX).is_err());
        assert_eq!(vm.read(limit - 1), Ok(0));

        let stats = vm.stats();
        assert_eq!(stats.rejected, 3);
        assert_eq!(stats.reads, 1);
    }

    #[test]
    fn test_rejected_access_leaves_tree_untouched() {
        let mut vm = VirtualMemory::new(Config::default());
        assert!(vm.write(VIRTUAL_MEMORY_SIZE + 5, 1).is_err());
        assert!(vm.references().is_empty());
        assert_eq!(vm.stats().page_faults, 0);
    }

    #[test]
    fn test_round_trip_across_many_pages() {
        let mut vm = VirtualMemory::new(Config::default());
        let addresses: Vec<u64> = (0..200).map(|i| (i * 7919 + 13) % VIRTUAL_MEMORY_SIZE).collect();

        for (i, &address) in addresses.iter().enumerate() {
            vm.write(address, i as Word + 1).unwrap();
        }
        assert!(vm.stats().evictions > 0);

        for (i, &address) in addresses.iter().enumerate() {
            assert_eq!(vm.read(address), Ok(i as Word + 1), "address {:#x}", address);
        }
        assert_no_aliasing(&vm);
    }

    #[test]
    fn test_eviction_with_minimal_frames() {
        let mut vm = minimal();
        let pages = [0x00000, 0x81230, 0x40010, 0xfff00, 0x00010];

        for (i, &address) in pages.iter().enumerate() {
            vm.write(address, 100 + i as Word).unwrap();
            assert_no_aliasing(&vm);
        }
        assert_eq!(vm.mapped_pages().len(), 1);

        for (i, &address) in pages.iter().enumerate() {
            assert_eq!(vm.read(address), Ok(100 + i as Word));
            assert_no_aliasing(&vm);
        }
    }

    #[test]
    fn test_evicted_page_keeps_last_write() {
        let mut vm = minimal();
        vm.write(0x12340, 1).unwrap();
        vm.write(0x12340, 2).unwrap();
        vm.write(0x98760, 9).unwrap();
        assert!(vm.store().disk().contains(0x1234));

        vm.write(0x12341, 3).unwrap();
        assert_eq!(vm.read(0x12340), Ok(2));
        assert_eq!(vm.read(0x12341), Ok(3));
        assert_eq!(vm.read(0x98760), Ok(9));
    }

    #[test]
    fn test_same_page_values_survive_together() {
        let mut vm = minimal();
        for offset in 0..PAGE_SIZE {
            vm.write(0x55550 + offset, offset as Word * 3).unwrap();
        }
        vm.read(0xaaaa0).unwrap();
        for offset in 0..PAGE_SIZE {
            assert_eq!(vm.read(0x55550 + offset), Ok(offset as Word * 3));
        }
    }

    #[test]
    fn test_victim_tie_break_is_deterministic() {
        // 16 pages, 2 levels; root + 2 tables + 2 pages fill all frames
        let config = Config::new(6, 2, 2, 5).unwrap();
        let run = || {
            let mut vm = VirtualMemory::new(config);
            // pages 0b0001 and 0b0101 are both 2 away from 0b0011
            vm.write(0b0101_00, 5).unwrap();
            vm.write(0b0001_00, 1).unwrap();
            vm.write(0b0011_00, 3).unwrap();
            vm
        };

        let vm = run();
        // page 0b0001 sits under root slot 0, met before root slot 1
        assert!(vm.store().disk().contains(0b0001));
        assert!(!vm.store().disk().contains(0b0101));
        assert_eq!(run().mapped_pages(), vm.mapped_pages());
    }

    #[test]
    fn test_root_never_reused() {
        let mut vm = minimal();
        for i in 0..64u64 {
            vm.write((i * 0x3b1d3) % VIRTUAL_MEMORY_SIZE, i as Word).unwrap();
            assert!(vm.mapped_pages().iter().all(|m| m.frame != ROOT_FRAME));
            assert_no_aliasing(&vm);
        }
    }

    #[test]
    fn test_initialize_unmaps_everything() {
        let mut vm = VirtualMemory::new(Config::default());
        vm.write(0x100, 1).unwrap();
        vm.initialize();
        assert!(vm.mapped_pages().is_empty());
        assert_eq!(vm.read(0x100), Ok(0));

        // same result whichever frames get reused as tables first
        vm.write(0x100, 1).unwrap();
        vm.initialize();
        assert_eq!(vm.read(0x20000), Ok(0));
        assert_eq!(vm.read(0x100), Ok(0));
    }

    #[test]
    fn test_initialize_drops_swapped_pages() {
        let mut vm = minimal();
        vm.write(0x12340, 4).unwrap();
        vm.write(0x98760, 9).unwrap();
        assert!(!vm.store().disk().is_empty());

        vm.initialize();
        assert!(vm.store().disk().is_empty());
        assert_eq!(vm.read(0x12340), Ok(0));
        assert_eq!(vm.read(0x98760), Ok(0));
    }

    #[test]
    fn test_stats_track_faults() {
        let mut vm = VirtualMemory::new(Config::default());
        vm.write(0x10, 1).unwrap();
        vm.read(0x11).unwrap();

        let stats = vm.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.page_faults, 4);
        assert_eq!(stats.grows, 4);
        assert_eq!(stats.page_ins, 1);
        assert_eq!(stats.evictions, 0);
    }
}
