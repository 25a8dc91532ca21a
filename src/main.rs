//! paged-vm - run a read/write trace through a simulated paged memory
//!
//! Usage: paged-vm [OPTIONS] <TRACE> [OUTPUT]
//!
//! Each trace line is `r <addr>` or `w <addr> <value>`. One result token
//! per command is written to OUTPUT (or stdout): the value read, `ok` for
//! a write, `-1` for a rejected access.

use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser};
use log::{debug, info};

use paged_vm::constants::*;
use paged_vm::io::{format_results, read_trace, run_batch, write_results};
use paged_vm::{Config, VirtualMemory};

/// Translate a trace of virtual memory accesses through a multi-level
/// page table with demand paging.
#[derive(Parser, Debug)]
#[command(version)]
struct Options {
    #[command(flatten)]
    logger: LogOptions,

    #[command(flatten)]
    geometry: Geometry,

    /// Trace file with one `r <addr>` or `w <addr> <value>` per line
    trace: PathBuf,

    /// Output file for results; stdout when omitted
    output: Option<PathBuf>,
}

/// Deployment geometry of the simulated memory
#[derive(Args, Debug)]
struct Geometry {
    /// Bits in a virtual address
    #[arg(long, default_value_t = VIRTUAL_ADDRESS_WIDTH)]
    address_width: u32,

    /// Bits of the page offset; pages hold 2^N words
    #[arg(long, default_value_t = OFFSET_WIDTH)]
    offset_width: u32,

    /// Levels in the page-table tree
    #[arg(long, default_value_t = TABLES_DEPTH)]
    depth: u32,

    /// Physical frames available, including the root table
    #[arg(long, default_value_t = NUM_FRAMES)]
    frames: u64,
}

impl Geometry {
    fn config(&self) -> Result<Config> {
        Config::new(self.address_width, self.offset_width, self.depth, self.frames)
            .context("Invalid memory geometry")
    }
}

/// Common logging / output options
#[derive(Args, Debug)]
struct LogOptions {
    /// Increase log verbosity. Pass multiple times for more log output.
    ///
    /// By default we only show error messages. Passing `-v` will show warnings,
    /// `-vv` adds info, `-vvv` for debug, and `-vvvv` for trace.
    #[arg(long = "verbose", short = 'v', action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Set fancier logging filters.
    ///
    /// This is equivalent to the `RUST_LOG` environment variable.
    /// For more info, see the `env_logger` crate documentation.
    #[arg(long = "log-filter", env = "PAGED_VM_LOG")]
    log_filter: Option<String>,

    /// Set log output target ("stderr", "stdout")
    #[arg(long, default_value = "stderr")]
    log_target: LogTarget,
}

impl LogOptions {
    /// Build & initialize a global logger using env_logger::Builder.
    fn init(&self) {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(self.verbosity_level())
            .parse_filters(self.log_filter.as_deref().unwrap_or(""))
            .target(self.log_target.into())
            .init();
    }

    /// Convert the -vvv.. count into a log level.
    fn verbosity_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Represents targets for log output.
#[derive(Debug, Clone, Copy)]
enum LogTarget {
    Stdout,
    Stderr,
}

impl FromStr for LogTarget {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(anyhow!("unknown log target {:?}", s)),
        }
    }
}

impl From<LogTarget> for env_logger::Target {
    fn from(t: LogTarget) -> Self {
        match t {
            LogTarget::Stdout => Self::Stdout,
            LogTarget::Stderr => Self::Stderr,
        }
    }
}

fn main() {
    let options = Options::parse();
    options.logger.init();

    if let Err(e) = run(&options) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(options: &Options) -> Result<()> {
    let config = options.geometry.config()?;
    info!(
        "{} frames x {} words, {}-bit addresses over {} levels",
        config.num_frames(),
        config.page_size(),
        config.virtual_address_width(),
        config.tables_depth()
    );

    let commands = read_trace(&options.trace)?;
    info!("{} commands from {}", commands.len(), options.trace.display());

    let mut vm = VirtualMemory::new(config);
    let results = run_batch(&mut vm, &commands);

    if log::log_enabled!(log::Level::Debug) {
        for link in vm.references() {
            debug!(
                "table: frame {}[{}] -> frame {} (level {})",
                link.parent, link.slot, link.child, link.depth
            );
        }
        for mapping in vm.mapped_pages() {
            debug!("resident: page {:#x} in frame {}", mapping.page, mapping.frame);
        }
        debug!("swapped out: {} pages", vm.store().disk().len());
    }

    let stats = vm.stats();
    info!(
        "reads={} writes={} rejected={} faults={} (reclaim={} grow={} evict={}) page-ins={}",
        stats.reads,
        stats.writes,
        stats.rejected,
        stats.page_faults,
        stats.reclaims,
        stats.grows,
        stats.evictions,
        stats.page_ins
    );

    match &options.output {
        Some(path) => {
            write_results(path, &results)?;
            info!("Results written to: {}", path.display());
        }
        None => println!("{}", format_results(&results)),
    }
    Ok(())
}
