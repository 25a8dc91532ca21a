use crate::constants::*;
use crate::error::ConfigError;

/// Fixed deployment geometry of the translation unit.
///
/// Built only through [`Config::new`], so every accessor can rely on the
/// geometry being consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    virtual_address_width: u32,
    offset_width: u32,
    tables_depth: u32,
    num_frames: u64,
}

impl Config {
    pub fn new(
        virtual_address_width: u32,
        offset_width: u32,
        tables_depth: u32,
        num_frames: u64,
    ) -> Result<Self, ConfigError> {
        if tables_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if offset_width == 0 {
            return Err(ConfigError::ZeroOffsetWidth);
        }
        if virtual_address_width > MAX_ADDRESS_WIDTH {
            return Err(ConfigError::AddressTooWide {
                virtual_address_width,
                max: MAX_ADDRESS_WIDTH,
            });
        }
        if virtual_address_width <= offset_width {
            return Err(ConfigError::NoPathBits { virtual_address_width, offset_width });
        }

        let path_width = virtual_address_width - offset_width;
        if path_width % tables_depth != 0 {
            return Err(ConfigError::UnevenSegments { path_width, tables_depth });
        }
        let segment_width = path_width / tables_depth;
        if segment_width > offset_width {
            return Err(ConfigError::SegmentWiderThanPage { segment_width, offset_width });
        }

        let required = tables_depth as u64 + 1;
        if num_frames < required {
            return Err(ConfigError::TooFewFrames { num_frames, required });
        }
        let max = Word::MAX as u64 + 1;
        if num_frames > max {
            return Err(ConfigError::TooManyFrames { num_frames, max });
        }
        num_frames
            .checked_mul(1 << offset_width)
            .and_then(|cells| usize::try_from(cells).ok())
            .ok_or(ConfigError::MemoryTooLarge { num_frames, offset_width })?;

        Ok(Config { virtual_address_width, offset_width, tables_depth, num_frames })
    }

    #[inline]
    pub fn virtual_address_width(&self) -> u32 {
        self.virtual_address_width
    }

    #[inline]
    pub fn offset_width(&self) -> u32 {
        self.offset_width
    }

    #[inline]
    pub fn tables_depth(&self) -> u32 {
        self.tables_depth
    }

    #[inline]
    pub fn num_frames(&self) -> u64 {
        self.num_frames
    }

    /// Cells per frame.
    #[inline]
    pub fn page_size(&self) -> u64 {
        1 << self.offset_width
    }

    #[inline]
    pub fn virtual_memory_size(&self) -> u64 {
        1 << self.virtual_address_width
    }

    #[inline]
    pub fn num_pages(&self) -> u64 {
        self.virtual_memory_size() / self.page_size()
    }

    /// Bits of the path consumed by each level of the tree.
    #[inline]
    pub fn segment_width(&self) -> u32 {
        (self.virtual_address_width - self.offset_width) / self.tables_depth
    }

    /// Cells of physical memory.
    #[inline]
    pub fn ram_size(&self) -> u64 {
        self.num_frames * self.page_size()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            virtual_address_width: VIRTUAL_ADDRESS_WIDTH,
            offset_width: OFFSET_WIDTH,
            tables_depth: TABLES_DEPTH,
            num_frames: NUM_FRAMES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = Config::default();
        assert_eq!(config.page_size(), PAGE_SIZE);
        assert_eq!(config.virtual_memory_size(), VIRTUAL_MEMORY_SIZE);
        assert_eq!(config.num_pages(), NUM_PAGES);
        assert_eq!(config.num_frames(), 64);
        assert_eq!(config.segment_width(), 4);
        assert_eq!(config.ram_size(), RAM_SIZE);
        assert_eq!(
            Config::new(VIRTUAL_ADDRESS_WIDTH, OFFSET_WIDTH, TABLES_DEPTH, NUM_FRAMES),
            Ok(config)
        );
    }

    #[test]
    fn test_rejects_zero_depth() {
        assert_eq!(Config::new(20, 4, 0, 64), Err(ConfigError::ZeroDepth));
    }

    #[test]
    fn test_rejects_zero_offset() {
        assert_eq!(Config::new(20, 0, 4, 64), Err(ConfigError::ZeroOffsetWidth));
    }

    #[test]
    fn test_rejects_no_path_bits() {
        assert_eq!(
            Config::new(4, 4, 1, 64),
            Err(ConfigError::NoPathBits { virtual_address_width: 4, offset_width: 4 })
        );
    }

    #[test]
    fn test_rejects_wide_addresses() {
        assert!(matches!(Config::new(64, 16, 3, 64), Err(ConfigError::AddressTooWide { .. })));
    }

    #[test]
    fn test_rejects_uneven_segments() {
        assert_eq!(
            Config::new(20, 4, 3, 64),
            Err(ConfigError::UnevenSegments { path_width: 16, tables_depth: 3 })
        );
    }

    #[test]
    fn test_rejects_segment_wider_than_page() {
        // 16 path bits over 2 levels = 8-bit segments, but pages hold only 16 cells
        assert_eq!(
            Config::new(20, 4, 2, 64),
            Err(ConfigError::SegmentWiderThanPage { segment_width: 8, offset_width: 4 })
        );
    }

    #[test]
    fn test_rejects_too_few_frames() {
        assert_eq!(
            Config::new(20, 4, 4, 4),
            Err(ConfigError::TooFewFrames { num_frames: 4, required: 5 })
        );
        assert!(Config::new(20, 4, 4, 5).is_ok());
    }

    #[test]
    fn test_rejects_unaddressable_memory() {
        assert_eq!(
            Config::new(48, 47, 1, 1 << 31),
            Err(ConfigError::MemoryTooLarge { num_frames: 1 << 31, offset_width: 47 })
        );
        assert_eq!(
            Config::new(48, 40, 8, 1 << 30),
            Err(ConfigError::MemoryTooLarge { num_frames: 1 << 30, offset_width: 40 })
        );
        assert!(Config::new(48, 8, 40, 41).is_ok());
    }

    #[test]
    fn test_derived_sizes() {
        let config = Config::new(6, 2, 2, 8).unwrap();
        assert_eq!(config.page_size(), 4);
        assert_eq!(config.virtual_memory_size(), 64);
        assert_eq!(config.num_pages(), 16);
        assert_eq!(config.segment_width(), 2);
        assert_eq!(config.ram_size(), 32);
    }
}
