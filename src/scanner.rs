//! Whole-tree traversals over the page-table tree rooted at frame 0.
//!
//! Every walk visits table cells depth-first in ascending slot order and
//! returns its result by value; no walk keeps state between calls. Only
//! [`remove_all_references`] writes to the store.

use log::{trace, warn};

use crate::config::Config;
use crate::constants::*;
use crate::memory::PhysicalStore;

/// A mapped page found in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub page: PageNumber,
    pub frame: FrameIndex,
}

/// One nonzero table entry: `parent[slot] == child`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub parent: FrameIndex,
    pub slot: u64,
    pub child: FrameIndex,
    /// Depth of `parent`; the root is at depth 0.
    pub depth: u32,
}

/// True iff every cell of `frame` is zero.
pub fn is_empty_frame<S: PhysicalStore>(store: &S, frame: FrameIndex) -> bool {
    store.is_frame_empty(frame)
}

pub fn clear_frame<S: PhysicalStore>(store: &mut S, frame: FrameIndex) {
    store.clear_frame(frame);
}

/// Mapped entries of a table frame as `(slot, child)` pairs, ascending.
fn children<S: PhysicalStore>(store: &S, frame: FrameIndex) -> Vec<(u64, FrameIndex)> {
    (0..store.page_size())
        .filter_map(|slot| match store.read_cell(frame, slot) {
            EMPTY_ENTRY => None,
            child => Some((slot, child as FrameIndex)),
        })
        .collect()
}

/// Path prefix selecting the node at `depth` on the way to `path`.
#[inline]
fn prefix_at(path: u64, depth: u32, config: &Config) -> u64 {
    let remaining = config.tables_depth() - depth;
    path >> (config.segment_width() * remaining)
}

#[inline]
fn extend(prefix: u64, slot: u64, config: &Config) -> u64 {
    (prefix << config.segment_width()) | slot
}

/// Ring distance between two page numbers.
pub fn cyclic_distance(a: PageNumber, b: PageNumber, num_pages: u64) -> u64 {
    let diff = a.abs_diff(b);
    diff.min(num_pages - diff)
}

/// Cut every table entry that points to `target`, returning how many were
/// cut.
///
/// The parent of `target` is unknown, so the whole tree is scanned. When
/// `target` is itself a table, its subtree is released first: mapped pages
/// below it are swapped out and its descendant tables are zeroed, so no
/// frame leaves the tree holding stale entries.
pub fn remove_all_references<S: PhysicalStore>(
    store: &mut S,
    config: &Config,
    target: FrameIndex,
) -> usize {
    remove_references_below(store, config, target, ROOT_FRAME, 0, 0)
}

fn remove_references_below<S: PhysicalStore>(
    store: &mut S,
    config: &Config,
    target: FrameIndex,
    frame: FrameIndex,
    depth: u32,
    prefix: u64,
) -> usize {
    let child_depth = depth + 1;
    let child_is_table = child_depth < config.tables_depth();
    let mut removed = 0;

    for (slot, child) in children(store, frame) {
        let child_prefix = extend(prefix, slot, config);
        if child == target {
            if child_is_table {
                let released = release_subtree(store, config, child, child_depth, child_prefix);
                if released > 0 {
                    warn!(
                        "detached table frame {} still had {} live descendants",
                        child, released
                    );
                }
            }
            trace!("unlink frame {} from frame {} slot {}", child, frame, slot);
            store.write_cell(frame, slot, EMPTY_ENTRY);
            removed += 1;
        } else if child_is_table {
            removed += remove_references_below(store, config, target, child, child_depth, child_prefix);
        }
    }
    removed
}

/// Empty the table `frame` at `depth`, swapping out pages and zeroing
/// tables below it. Returns the number of descendant frames released.
fn release_subtree<S: PhysicalStore>(
    store: &mut S,
    config: &Config,
    frame: FrameIndex,
    depth: u32,
    prefix: u64,
) -> usize {
    let child_depth = depth + 1;
    let mut released = 0;

    for (slot, child) in children(store, frame) {
        let child_prefix = extend(prefix, slot, config);
        if child_depth < config.tables_depth() {
            released += release_subtree(store, config, child, child_depth, child_prefix);
            store.clear_frame(child);
        } else {
            store.swap_out(child, child_prefix);
        }
        store.write_cell(frame, slot, EMPTY_ENTRY);
        released += 1;
    }
    released
}

/// A non-root table with no live entries that does not lie on the way to
/// `faulting_path`.
///
/// Tables on the faulting path are skipped: the walk is about to install
/// an entry in one of them.
pub fn find_unused_allocated_frame<S: PhysicalStore>(
    store: &S,
    config: &Config,
    faulting_path: u64,
) -> Option<FrameIndex> {
    find_unused_below(store, config, faulting_path, ROOT_FRAME, 0, 0)
}

fn find_unused_below<S: PhysicalStore>(
    store: &S,
    config: &Config,
    faulting_path: u64,
    frame: FrameIndex,
    depth: u32,
    prefix: u64,
) -> Option<FrameIndex> {
    let entries = children(store, frame);
    if entries.is_empty() {
        let on_path = prefix == prefix_at(faulting_path, depth, config);
        return (frame != ROOT_FRAME && !on_path).then_some(frame);
    }

    let child_depth = depth + 1;
    if child_depth == config.tables_depth() {
        return None;
    }
    entries.into_iter().find_map(|(slot, child)| {
        let child_prefix = extend(prefix, slot, config);
        find_unused_below(store, config, faulting_path, child, child_depth, child_prefix)
    })
}

/// Largest frame index referenced anywhere in the tree; 0 for an empty
/// tree.
pub fn max_allocated_frame_index<S: PhysicalStore>(store: &S, config: &Config) -> FrameIndex {
    max_below(store, config, ROOT_FRAME, 0)
}

fn max_below<S: PhysicalStore>(
    store: &S,
    config: &Config,
    frame: FrameIndex,
    depth: u32,
) -> FrameIndex {
    let child_depth = depth + 1;
    children(store, frame)
        .into_iter()
        .map(|(_, child)| {
            if child_depth < config.tables_depth() {
                child.max(max_below(store, config, child, child_depth))
            } else {
                child
            }
        })
        .fold(frame, FrameIndex::max)
}

/// The mapped page farthest from `faulting_path` on the page ring.
///
/// Ties keep the page met first in depth-first, ascending-slot order.
/// `None` when no page is mapped.
pub fn find_eviction_victim<S: PhysicalStore>(
    store: &S,
    config: &Config,
    faulting_path: u64,
) -> Option<Mapping> {
    let num_pages = config.num_pages();
    mapped_pages(store, config)
        .into_iter()
        .fold(None, |best: Option<(Mapping, u64)>, mapping| {
            let distance = cyclic_distance(mapping.page, faulting_path, num_pages);
            match best {
                Some((_, best_distance)) if best_distance >= distance => best,
                _ => Some((mapping, distance)),
            }
        })
        .map(|(mapping, _)| mapping)
}

/// Every mapped page, in depth-first ascending-slot order.
pub fn mapped_pages<S: PhysicalStore>(store: &S, config: &Config) -> Vec<Mapping> {
    pages_below(store, config, ROOT_FRAME, 0, 0)
}

fn pages_below<S: PhysicalStore>(
    store: &S,
    config: &Config,
    frame: FrameIndex,
    depth: u32,
    prefix: u64,
) -> Vec<Mapping> {
    let child_depth = depth + 1;
    children(store, frame)
        .into_iter()
        .flat_map(|(slot, child)| {
            let page = extend(prefix, slot, config);
            if child_depth < config.tables_depth() {
                pages_below(store, config, child, child_depth, page)
            } else {
                vec![Mapping { page, frame: child }]
            }
        })
        .collect()
}

/// Every nonzero table entry, grouped by parent table. Tables are visited
/// depth-first, lowest slot first.
pub fn references<S: PhysicalStore>(store: &S, config: &Config) -> Vec<Link> {
    let mut links = Vec::new();
    let mut stack = vec![(ROOT_FRAME, 0u32)];

    while let Some((frame, depth)) = stack.pop() {
        let entries = children(store, frame);
        if depth + 1 < config.tables_depth() {
            // reversed so the lowest slot is popped first
            stack.extend(entries.iter().rev().map(|&(_, child)| (child, depth + 1)));
        }
        links.extend(entries.into_iter().map(|(slot, child)| Link {
            parent: frame,
            slot,
            child,
            depth,
        }));
    }
    links
}
