pub mod allocator;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod memory;
pub mod scanner;
pub mod translation;
pub mod vm;

// Re-export commonly used items for convenience
pub use config::Config;
pub use constants::*;
pub use error::{ConfigError, VmError};
pub use memory::{PhysicalMemory, PhysicalStore};
pub use translation::VirtualAddress;
pub use vm::{Stats, VirtualMemory};
