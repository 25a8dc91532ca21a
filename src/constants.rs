/// Data stored in a single physical cell. Table cells hold frame indices.
pub type Word = i32;

pub type FrameIndex = u64;
pub type PageNumber = u64;

pub const OFFSET_WIDTH: u32 = 4;
pub const PAGE_SIZE: u64 = 1 << OFFSET_WIDTH;

pub const PHYSICAL_ADDRESS_WIDTH: u32 = 10;
pub const RAM_SIZE: u64 = 1 << PHYSICAL_ADDRESS_WIDTH;

pub const VIRTUAL_ADDRESS_WIDTH: u32 = 20;
pub const VIRTUAL_MEMORY_SIZE: u64 = 1 << VIRTUAL_ADDRESS_WIDTH;

pub const TABLES_DEPTH: u32 = 4;

pub const NUM_FRAMES: u64 = RAM_SIZE / PAGE_SIZE;
pub const NUM_PAGES: u64 = VIRTUAL_MEMORY_SIZE / PAGE_SIZE;

/// Frame 0 always holds the root table.
pub const ROOT_FRAME: FrameIndex = 0;

/// Value of an unmapped table entry.
pub const EMPTY_ENTRY: Word = 0;

/// Widest virtual address the configuration layer accepts.
pub const MAX_ADDRESS_WIDTH: u32 = 48;

/// Output token for a failed access in trace results.
pub const FAILED_ACCESS: i64 = -1;
