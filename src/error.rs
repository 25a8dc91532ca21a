use std::fmt;

/// Rejected deployment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The tree needs at least one level.
    ZeroDepth,
    /// Pages must hold at least two cells.
    ZeroOffsetWidth,
    /// The offset leaves no bits for the path.
    NoPathBits { virtual_address_width: u32, offset_width: u32 },
    /// Address arithmetic is limited to this width.
    AddressTooWide { virtual_address_width: u32, max: u32 },
    /// The path bits cannot be cut into equal segments.
    UnevenSegments { path_width: u32, tables_depth: u32 },
    /// A table frame has fewer cells than a segment can select.
    SegmentWiderThanPage { segment_width: u32, offset_width: u32 },
    /// Not enough frames to hold the root plus one frame per level.
    TooFewFrames { num_frames: u64, required: u64 },
    /// Frame indices must fit in a table cell.
    TooManyFrames { num_frames: u64, max: u64 },
    /// `num_frames * 2^offset_width` cells cannot be addressed on this host.
    MemoryTooLarge { num_frames: u64, offset_width: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroDepth => write!(f, "tables depth must be at least 1"),
            ConfigError::ZeroOffsetWidth => write!(f, "offset width must be at least 1"),
            ConfigError::NoPathBits { virtual_address_width, offset_width } => write!(
                f,
                "virtual address width {} leaves no path bits after offset width {}",
                virtual_address_width, offset_width
            ),
            ConfigError::AddressTooWide { virtual_address_width, max } => write!(
                f,
                "virtual address width {} exceeds the supported maximum {}",
                virtual_address_width, max
            ),
            ConfigError::UnevenSegments { path_width, tables_depth } => write!(
                f,
                "{} path bits cannot be split into {} equal segments",
                path_width, tables_depth
            ),
            ConfigError::SegmentWiderThanPage { segment_width, offset_width } => write!(
                f,
                "segment width {} does not fit a table of 2^{} entries",
                segment_width, offset_width
            ),
            ConfigError::TooFewFrames { num_frames, required } => write!(
                f,
                "{} frames cannot hold a full translation path, need at least {}",
                num_frames, required
            ),
            ConfigError::TooManyFrames { num_frames, max } => write!(
                f,
                "{} frames exceed the {} a table entry can address",
                num_frames, max
            ),
            ConfigError::MemoryTooLarge { num_frames, offset_width } => write!(
                f,
                "{} frames of 2^{} cells do not fit in addressable memory",
                num_frames, offset_width
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure of a virtual memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The address lies outside the virtual address space.
    OutOfRange { address: u64, limit: u64 },
    /// No allocation strategy produced a frame.
    Exhaustion { address: u64 },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::OutOfRange { address, limit } => {
                write!(f, "virtual address {:#x} is outside [0, {:#x})", address, limit)
            }
            VmError::Exhaustion { address } => write!(
                f,
                "no frame can be freed to translate {:#x}; too few frames configured",
                address
            ),
        }
    }
}

impl std::error::Error for VmError {}

pub type Result<T, E = VmError> = std::result::Result<T, E>;
