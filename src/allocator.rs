//! Frame allocation for page faults.
//!
//! A fault needs one frame nobody in the tree points to. The strategies
//! below are tried in [`POLICY`] order. Each is a read-only proposal over
//! the current tree; only the first proposal that succeeds is claimed,
//! and claiming is the one step that mutates the tree or the swap area.

use std::fmt;

use log::debug;

use crate::config::Config;
use crate::constants::*;
use crate::memory::PhysicalStore;
use crate::scanner::{self, Mapping};

/// Ways of producing a free frame, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Reuse a table that no longer maps anything.
    Reclaim,
    /// Take the frame after the highest one in use.
    Grow,
    /// Swap out the page farthest from the faulting one.
    Evict,
}

pub const POLICY: [Strategy; 3] = [Strategy::Reclaim, Strategy::Grow, Strategy::Evict];

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Reclaim => "reclaim",
            Strategy::Grow => "grow",
            Strategy::Evict => "evict",
        };
        f.write_str(name)
    }
}

/// A frame a strategy is able to hand out, before it is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    EmptyTable(FrameIndex),
    Unused(FrameIndex),
    Victim(Mapping),
}

impl Candidate {
    pub fn frame(&self) -> FrameIndex {
        match *self {
            Candidate::EmptyTable(frame) | Candidate::Unused(frame) => frame,
            Candidate::Victim(mapping) => mapping.frame,
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Candidate::EmptyTable(_) => Strategy::Reclaim,
            Candidate::Unused(_) => Strategy::Grow,
            Candidate::Victim(_) => Strategy::Evict,
        }
    }
}

impl Strategy {
    /// What this strategy would hand out for a fault on `faulting_path`.
    pub fn propose<S: PhysicalStore>(
        self,
        store: &S,
        config: &Config,
        faulting_path: u64,
    ) -> Option<Candidate> {
        match self {
            Strategy::Reclaim => scanner::find_unused_allocated_frame(store, config, faulting_path)
                .map(Candidate::EmptyTable),
            Strategy::Grow => {
                let next = scanner::max_allocated_frame_index(store, config) + 1;
                (next < config.num_frames()).then_some(Candidate::Unused(next))
            }
            Strategy::Evict => {
                scanner::find_eviction_victim(store, config, faulting_path).map(Candidate::Victim)
            }
        }
    }
}

/// Frame handed out for a fault, and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub frame: FrameIndex,
    pub strategy: Strategy,
}

/// Detach `candidate` from the tree so its frame can be reused.
///
/// A victim is swapped out under its page number before its link is cut.
/// The frame's content is left as is.
pub fn claim<S: PhysicalStore>(store: &mut S, config: &Config, candidate: Candidate) -> Allocation {
    match candidate {
        Candidate::EmptyTable(frame) => {
            scanner::remove_all_references(store, config, frame);
        }
        Candidate::Unused(_) => {}
        Candidate::Victim(Mapping { page, frame }) => {
            store.swap_out(frame, page);
            scanner::remove_all_references(store, config, frame);
        }
    }
    Allocation { frame: candidate.frame(), strategy: candidate.strategy() }
}

/// Produce a frame no table entry refers to, for a fault on
/// `faulting_path`. `None` only if every strategy came up empty.
pub fn allocate<S: PhysicalStore>(
    store: &mut S,
    config: &Config,
    faulting_path: u64,
) -> Option<Allocation> {
    let candidate = POLICY
        .iter()
        .find_map(|strategy| strategy.propose(store, config, faulting_path))?;

    debug!(
        "fault on page {:#x}: {} frame {}",
        faulting_path,
        candidate.strategy(),
        candidate.frame()
    );
    Some(claim(store, config, candidate))
}
