//! # tagalloc - A Boundary-Tag Memory Allocator Library
//!
//! This crate provides an **explicit free-list allocator** with boundary tags
//! and immediate coalescing, managing a single contiguous heap area obtained
//! from a grow-only region (by default the program break, via `sbrk`).
//!
//! ## Overview
//!
//! The heap area is a gapless sequence of blocks. Each block is bracketed by
//! a header and a footer carrying its size; free blocks are additionally
//! threaded onto a doubly-linked list through their payload:
//!
//! ```text
//!   Heap Area Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                           HEAP AREA                                  │
//!   │                                                                      │
//!   │   ┌──────────┬──────────┬──────────┬──────────┬──────────┐           │
//!   │   │ A (used) │ B (free) │ C (used) │ D (free) │ E (used) │           │
//!   │   └──────────┴────┬─────┴──────────┴────┬─────┴──────────┘           │
//!   │                   │    ▲                │    ▲                       │
//!   │        head ──────┘    └──── prev/next ─┘    │                       │
//!   │                                              │                       │
//!   │   Physical order is tracked by boundary tags; the free list          │
//!   │   orders blocks by recency of freeing (LIFO).                        │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation: first-fit over the free list, splitting oversized blocks.
//!   Freeing: O(1) merge with free physical neighbors via the footers.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Block layout: boundary tags, link slots (internal)
//!   ├── region     - Region providers (SbrkRegion, BufferRegion)
//!   └── tag        - TagAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tagalloc::{SbrkRegion, TagAllocator};
//!
//! fn main() {
//!     let mut allocator = TagAllocator::new(SbrkRegion::new());
//!     allocator.init().expect("heap init");
//!
//!     unsafe {
//!         // Allocate 24 bytes and use them
//!         let ptr = allocator.allocate(24);
//!         ptr.write(42);
//!         println!("Value: {}", ptr.read());
//!
//!         // Resize, then release
//!         let ptr = allocator.reallocate(ptr, 64);
//!         allocator.deallocate(ptr);
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Immediate coalescing**: freed blocks merge with free neighbors at once
//! - **Explicit free list**: only free blocks are walked during placement
//! - **Constant-time list maintenance**: LIFO insertion, doubly-linked removal
//! - **Pluggable region**: `sbrk`-backed heap or a fixed in-process buffer
//! - **Heap checker**: `check_heap` asserts every structural invariant
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives
//! - **Memory is never returned**: the region only grows; merged blocks are
//!   reused, not released
//! - **First/best fit only**: no size-class segregation
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Allocation and deallocation require `unsafe` blocks, and the allocator
//! trusts that every pointer handed back to it came from a matching
//! `allocate` call.

pub mod align;
mod block;
mod region;
mod tag;

pub use block::{ALIGNMENT, MIN_BLOCK_SIZE};
pub use region::{BufferRegion, Region, SbrkRegion};
pub use tag::{InitError, SearchMode, TagAllocator, print_alloc};
