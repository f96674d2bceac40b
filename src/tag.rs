//! # Boundary-Tag Allocator
//!
//! A dynamic memory allocator over a grow-only [`Region`], built around an
//! explicit doubly-linked free list and boundary tags.
//!
//! ## How It Works
//!
//! The heap area is partitioned into blocks with no gaps between them. Every
//! block carries its size twice: in a header word at its base and in a footer
//! word at its end. The footer is the boundary tag that lets a block locate
//! its physical predecessor in O(1).
//!
//! ### Memory Layout Diagram
//!
//! ```text
//!                HEAP AREA (grows upward →)
//!
//!   ┌─────┬──────────────┬──────────────┬──────────────┐
//!   │ pad │   Block 1    │   Block 2    │   Block 3    │
//!   └─────┴──────────────┴──────────────┴──────────────┘
//!         ▲                             ▲
//!         heap_first                    heap_last
//!
//!   Each block:
//!   ┌────────┬──────────────────────────────┬────────┐
//!   │ header │           payload            │ footer │
//!   │ size|a │                              │  size  │
//!   └────────┴──────────────────────────────┴────────┘
//! ```
//!
//! ### Explicit Free List
//!
//! Free blocks are threaded onto a doubly-linked list through their first two
//! payload words. Insertion is LIFO: a freshly freed block becomes the new
//! head.
//!
//! ```text
//!   head ──► ┌──────────┐     ┌──────────┐     ┌──────────┐
//!            │ free, 64 │ ◄─► │ free, 32 │ ◄─► │ free, 96 │ ──► null
//!            └──────────┘     └──────────┘     └──────────┘
//!
//!   The list orders blocks by recency of freeing, not by address. The
//!   physical ordering of the heap is tracked separately by the boundary
//!   tags.
//! ```
//!
//! ### Allocation (Placement & Split)
//!
//! ```text
//!   STEP 1: Size the block
//!   ┌────────────────────────────────────────────────────────┐
//!   │  need = align!(header + size + footer)                 │
//!   │  need = max(need, MIN_BLOCK_SIZE)                      │
//!   └────────────────────────────────────────────────────────┘
//!
//!   STEP 2: Search the free list (first fit by default)
//!
//!   STEP 3a: Hit. Unlink the block; split when the remainder
//!            can stand on its own as a block:
//!
//!   ┌────────────────── free block, size 96 ─────────────────┐
//!   │                                                        │
//!   ├───── allocated, need = 32 ─────┬──── free, 64 ─────────┤
//!   │                                │ (pushed at list head) │
//!   └────────────────────────────────┴───────────────────────┘
//!
//!   STEP 3b: Miss. Grow the region by `need` bytes and write
//!            the new block's tags at the old region end.
//! ```
//!
//! ### Freeing (Immediate Coalescing)
//!
//! Freeing inspects both physical neighbors through the boundary tags and
//! merges with whichever ones are free, so no two adjacent free blocks ever
//! survive a call:
//!
//! ```text
//!   neighbors          action
//!   ─────────────────  ─────────────────────────────────────────────
//!   none free          mark free, push at list head
//!   next free          unlink next, absorb it, push merged block
//!   prev free          absorb into prev (prev keeps its list spot)
//!   both free          unlink next, absorb both into prev
//! ```
//!
//! ### Alignment Handling
//!
//! The region hands out an aligned base and [`TagAllocator::init`] burns
//! `ALIGNMENT - header` leading bytes, so every block base sits one header
//! short of an alignment boundary:
//!
//! ```text
//!   region base (aligned)
//!   │
//!   ▼
//!   ┌─────────┬────────┬───────────────────────────────┐
//!   │ padding │ header │ payload (ALIGNMENT-aligned)   │ ...
//!   └─────────┴────────┴───────────────────────────────┘
//!             ▲        ▲
//!             │        └── returned to the caller
//!             └── first block base
//! ```
//!
//! Block sizes are multiples of `ALIGNMENT`, so the property propagates to
//! every later block.
//!
//! ## Safety
//!
//! The allocator hands out raw pointers and trusts the pointers it receives
//! back. Callers must ensure:
//! - Pointers passed to `deallocate`/`reallocate` came from this allocator
//! - No pointer is freed twice or used after being freed
//! - Access is externally serialized; nothing here is thread-safe

use std::ptr;

use thiserror::Error;

use crate::ALIGNMENT;
use crate::block::{
  Block, FOOTER_SIZE, Footer, FreeBlock, HEADER_SIZE, MIN_BLOCK_SIZE,
  required_size,
};
use crate::region::Region;

/// Strategy for searching the free list during placement.
///
/// # Strategies
///
/// ```text
///   Free list: head ──► [96] ──► [48] ──► null     Request: need = 32
///
///   FIRST FIT: return the first block that fits
///   ┌────────────────────────────────────────────────────────────────┐
///   │  [96] ✓ MATCH (96 >= 32)                                       │
///   │                                                                │
///   │  Pros: stops early, cheap on average                           │
///   │  Cons: may leave a large split remainder behind                │
///   └────────────────────────────────────────────────────────────────┘
///
///   BEST FIT: scan everything, return the smallest adequate block
///   ┌────────────────────────────────────────────────────────────────┐
///   │  [96] candidate ──► [48] ✓ BEST (48 < 96)                      │
///   │                                                                │
///   │  Pros: minimizes leftover space per placement                  │
///   │  Cons: always walks the whole list                             │
///   └────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
  /// First Fit: returns the first free block large enough.
  ///
  /// - **Time Complexity**: O(free blocks) worst case, often faster
  /// - **Best For**: general-purpose use, when speed is priority
  #[default]
  FirstFit,

  /// Best Fit: returns the smallest free block that fits, stopping early on
  /// a perfect fit.
  ///
  /// - **Time Complexity**: always O(free blocks)
  /// - **Best For**: memory-constrained workloads
  BestFit,
}

/// Error returned by [`TagAllocator::init`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
  /// The region provider refused to grow by the leading padding.
  #[error("region provider refused to grow")]
  RegionExhausted,
}

/// Debug helper function that prints allocation information.
///
/// # Example Output
///
/// ```text
/// Allocated 64 bytes, payload address = 0x5555557a1040
/// ```
pub fn print_alloc(
  size: usize,
  addr: *mut u8,
) {
  println!("Allocated {} bytes, payload address = {:?}", size, addr);
}

/// An explicit free-list allocator with boundary-tag coalescing.
///
/// The allocator owns a [`Region`] and partitions everything the region hands
/// out into blocks. Three pieces of state track the heap:
///
/// ```text
///   ┌──────────────────────────────────────────────────────────┐
///   │                    TagAllocator                          │
///   │                                                          │
///   │  head ───────► most recently freed block (list entry)    │
///   │  heap_first ─► first physical block                      │
///   │  heap_last ──► last physical block                       │
///   └──────────────────────────────────────────────────────────┘
/// ```
///
/// All three are null until the first allocation after [`init`].
///
/// [`init`]: TagAllocator::init
///
/// # Thread Safety
///
/// This allocator is **NOT** thread-safe. For multi-threaded usage, external
/// synchronization (e.g., a `Mutex`) is required.
pub struct TagAllocator<R: Region> {
  /// Region the heap area is carved from. The allocator is its only user.
  region: R,

  /// Head of the explicit free list, or null when no block is free.
  head: *mut Block,

  /// First physical block on the heap, or null before the first allocation.
  heap_first: *mut Block,

  /// Last physical block on the heap, or null before the first allocation.
  /// Needed to know where the boundary-tag walk must stop.
  heap_last: *mut Block,

  /// Strategy used to search the free list. See [`SearchMode`].
  search_mode: SearchMode,
}

impl<R: Region> TagAllocator<R> {
  /// Creates an allocator over the given region with the default search mode
  /// (FirstFit). Call [`init`](TagAllocator::init) before allocating.
  pub fn new(region: R) -> Self {
    Self {
      region,
      head: ptr::null_mut(),
      heap_first: ptr::null_mut(),
      heap_last: ptr::null_mut(),
      search_mode: SearchMode::default(),
    }
  }

  /// Creates an allocator with the specified search mode.
  ///
  /// # Example
  ///
  /// ```rust,ignore
  /// use tagalloc::{BufferRegion, SearchMode, TagAllocator};
  ///
  /// let region = BufferRegion::new(4096);
  /// let allocator = TagAllocator::with_search_mode(region, SearchMode::BestFit);
  /// ```
  pub fn with_search_mode(
    region: R,
    search_mode: SearchMode,
  ) -> Self {
    Self {
      region,
      head: ptr::null_mut(),
      heap_first: ptr::null_mut(),
      heap_last: ptr::null_mut(),
      search_mode,
    }
  }

  /// Returns the current search mode of the allocator.
  pub fn search_mode(&self) -> SearchMode {
    self.search_mode
  }

  /// Sets the search mode for subsequent allocations.
  pub fn set_search_mode(
    &mut self,
    mode: SearchMode,
  ) {
    self.search_mode = mode;
  }

  /// Initializes the allocator.
  ///
  /// Burns `ALIGNMENT - header` leading bytes of the region so that the first
  /// block's payload lands on an alignment boundary, and resets the free list
  /// and the physical-block bounds.
  ///
  /// Calling `init` again abandons the current heap area and starts a fresh
  /// one further up the region.
  ///
  /// # Errors
  ///
  /// [`InitError::RegionExhausted`] when the region refuses the padding.
  pub fn init(&mut self) -> Result<(), InitError> {
    let padding = self.region.grow(ALIGNMENT - HEADER_SIZE);
    if padding.is_null() {
      return Err(InitError::RegionExhausted);
    }

    self.head = ptr::null_mut();
    self.heap_first = ptr::null_mut();
    self.heap_last = ptr::null_mut();

    Ok(())
  }

  /// Allocates a block with room for at least `size` payload bytes.
  ///
  /// The free list is searched first; only on a miss does the allocator grow
  /// the region. A found block larger than needed is split when the
  /// remainder can stand on its own as a block (at least `MIN_BLOCK_SIZE`
  /// bytes beyond the request), so no unusable sliver is ever created.
  ///
  /// # Arguments
  ///
  /// * `size` - Number of payload bytes. Zero is valid and yields a
  ///   minimum-size block.
  ///
  /// # Returns
  ///
  /// * An `ALIGNMENT`-aligned payload pointer
  /// * Null when the region is exhausted or the block size computation
  ///   overflows
  ///
  /// # Safety
  ///
  /// The caller must ensure [`init`](TagAllocator::init) has succeeded on
  /// this allocator and that no other code mutates the region underneath it.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    let Some(need) = required_size(size) else {
      return ptr::null_mut();
    };

    unsafe {
      let block = self.find_fit(need);
      if !block.is_null() {
        self.remove_free(block);

        let old_size = Block::size(block);
        if old_size - need > MIN_BLOCK_SIZE {
          self.split(block, need, old_size);
        } else {
          // Taking the whole block avoids leaving a sliver too small to
          // hold free-list links.
          Block::set_header(block, old_size, true);
        }

        return Block::payload(block);
      }

      // No fit: a new block is carved at the end of the heap.
      let base = self.region.grow(need);
      if base.is_null() {
        return ptr::null_mut();
      }

      let block = base as *mut Block;
      if self.heap_first.is_null() {
        self.heap_first = block;
      }
      self.heap_last = block;

      Block::set_header(block, need, true);
      Block::payload(block)
    }
  }

  /// Releases a block so future allocations can reuse it.
  ///
  /// The block is merged with whichever physical neighbors are free before
  /// it (or the surviving merged block) is made available again, so the heap
  /// never holds two adjacent free blocks.
  ///
  /// # Arguments
  ///
  /// * `payload` - Pointer returned by [`allocate`](TagAllocator::allocate).
  ///   Null is a no-op.
  ///
  /// # Safety
  ///
  /// `payload` must be null or a live pointer previously returned by this
  /// allocator; freeing a foreign pointer or freeing twice is undefined
  /// behavior.
  pub unsafe fn deallocate(
    &mut self,
    payload: *mut u8,
  ) {
    if payload.is_null() {
      return;
    }

    unsafe {
      let block = Block::from_payload(payload);

      // The boundary tags bound both probes: heap_first has no predecessor,
      // heap_last has no successor.
      let prev = if block == self.heap_first {
        ptr::null_mut()
      } else {
        let footer = (block as *mut u8).sub(FOOTER_SIZE) as *mut Footer;
        (block as *mut u8).sub((*footer).size) as *mut Block
      };

      let next = if block == self.heap_last {
        ptr::null_mut()
      } else {
        (block as *mut u8).add(Block::size(block)) as *mut Block
      };

      self.coalesce(prev, block, next);
    }
  }

  /// Resizes an allocation, moving it to a new block.
  ///
  /// A new block is allocated, `min(old capacity, size)` payload bytes are
  /// copied over, and the old block is freed. When the new allocation fails
  /// the original block is left untouched so the caller can recover.
  ///
  /// # Arguments
  ///
  /// * `payload` - Existing allocation, or null (then this is plain
  ///   [`allocate`](TagAllocator::allocate)).
  /// * `size` - New payload size. Zero frees the block and returns null.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](TagAllocator::deallocate) for `payload`.
  pub unsafe fn reallocate(
    &mut self,
    payload: *mut u8,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      if payload.is_null() {
        return self.allocate(size);
      }

      if size == 0 {
        self.deallocate(payload);
        return ptr::null_mut();
      }

      let new_payload = self.allocate(size);
      if new_payload.is_null() {
        return ptr::null_mut();
      }

      let block = Block::from_payload(payload);
      let copied = Block::payload_capacity(block).min(size);
      ptr::copy_nonoverlapping(payload, new_payload, copied);

      self.deallocate(payload);

      new_payload
    }
  }

  /// Allocates a zeroed array of `count` elements of `size` bytes each.
  ///
  /// # Returns
  ///
  /// * A payload pointer whose first `count * size` bytes are zero
  /// * Null when `count * size` overflows or the allocation fails
  ///
  /// # Safety
  ///
  /// Same contract as [`allocate`](TagAllocator::allocate).
  pub unsafe fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let Some(total) = count.checked_mul(size) else {
      return ptr::null_mut();
    };

    unsafe {
      let payload = self.allocate(total);
      if !payload.is_null() {
        ptr::write_bytes(payload, 0, total);
      }

      payload
    }
  }

  /// Walks the whole heap and the free list, asserting every structural
  /// invariant. A debugging and testing aid; panics on the first violation.
  ///
  /// Checked per block: header/footer agreement, size alignment and minimum,
  /// payload alignment, no two adjacent free blocks. Checked globally: the
  /// physical walk lands exactly on `heap_last`, every free block is on the
  /// free list exactly once, the list holds no allocated block, and its
  /// `prev` links mirror its `next` links.
  pub fn check_heap(&self) {
    unsafe {
      if self.heap_first.is_null() {
        assert!(self.heap_last.is_null(), "heap_last set on an empty heap");
        assert!(self.head.is_null(), "free list non-empty on an empty heap");
        return;
      }

      let mut walked_free = 0usize;
      let mut previous_free = false;
      let mut cursor = self.heap_first;

      loop {
        let size = Block::size(cursor);

        assert!(size >= MIN_BLOCK_SIZE, "block below minimum size");
        assert_eq!(size % ALIGNMENT, 0, "block size not aligned");

        let footer = (cursor as *mut u8).add(size - FOOTER_SIZE) as *mut Footer;
        assert_eq!((*footer).size, size, "header and footer disagree");

        assert_eq!(
          Block::payload(cursor) as usize % ALIGNMENT,
          0,
          "payload not aligned"
        );

        let free = !Block::is_allocated(cursor);
        assert!(!(free && previous_free), "adjacent free blocks not coalesced");

        if free {
          walked_free += 1;
          assert_eq!(
            self.free_list_occurrences(cursor),
            1,
            "free block not on the free list exactly once"
          );
        }

        previous_free = free;

        if cursor == self.heap_last {
          break;
        }
        cursor = (cursor as *mut u8).add(size) as *mut Block;
        assert!(cursor <= self.heap_last, "physical walk overran heap_last");
      }

      let mut listed = 0usize;
      let mut list_prev: *mut Block = ptr::null_mut();
      let mut current = self.head;

      while !current.is_null() {
        assert!(
          !Block::is_allocated(current),
          "allocated block on the free list"
        );
        assert_eq!(
          (*(current as *mut FreeBlock)).prev,
          list_prev,
          "free-list prev link out of sync"
        );

        listed += 1;
        list_prev = current;
        current = (*(current as *mut FreeBlock)).next;
      }

      assert_eq!(listed, walked_free, "free list does not match the heap walk");
    }
  }

  /// Searches the free list for a block of at least `need` bytes using the
  /// configured [`SearchMode`]. Returns null when nothing fits.
  unsafe fn find_fit(
    &self,
    need: usize,
  ) -> *mut Block {
    unsafe {
      match self.search_mode {
        SearchMode::FirstFit => self.find_fit_first_fit(need),
        SearchMode::BestFit => self.find_fit_best_fit(need),
      }
    }
  }

  /// First Fit: the first free block that is large enough wins.
  unsafe fn find_fit_first_fit(
    &self,
    need: usize,
  ) -> *mut Block {
    unsafe {
      let mut current = self.head;

      while !current.is_null() {
        if Block::size(current) >= need {
          return current;
        }
        current = (*(current as *mut FreeBlock)).next;
      }

      ptr::null_mut()
    }
  }

  /// Best Fit: the smallest free block that is large enough wins, with an
  /// early return on a perfect fit.
  unsafe fn find_fit_best_fit(
    &self,
    need: usize,
  ) -> *mut Block {
    unsafe {
      let mut best: *mut Block = ptr::null_mut();
      let mut best_size = usize::MAX;
      let mut current = self.head;

      while !current.is_null() {
        let size = Block::size(current);
        if size >= need && size < best_size {
          best = current;
          best_size = size;

          if size == need {
            return best;
          }
        }
        current = (*(current as *mut FreeBlock)).next;
      }

      best
    }
  }

  /// Splits `block` into an allocated front of `need` bytes and a free tail
  /// of `old_size - need` bytes, pushing the tail at the free-list head.
  ///
  /// ```text
  ///   ┌──────────────── old_size ────────────────┐
  ///   ├──── need (allocated) ────┬─ tail (free) ─┤
  ///   └──────────────────────────┴───────────────┘
  /// ```
  unsafe fn split(
    &mut self,
    block: *mut Block,
    need: usize,
    old_size: usize,
  ) {
    unsafe {
      let tail = (block as *mut u8).add(need) as *mut Block;

      if block == self.heap_last {
        self.heap_last = tail;
      }

      Block::set_header(block, need, true);
      Block::set_header(tail, old_size - need, false);
      self.push_free(tail);
    }
  }

  /// Merges a block being freed with whichever physical neighbors are free.
  ///
  /// `prev`/`next` are the physical neighbors, or null at the heap bounds.
  /// Exactly one of four cases applies; the surviving block's tags are
  /// rewritten once with the merged size, and `heap_last` follows the
  /// surviving block whenever the absorbed span included it.
  unsafe fn coalesce(
    &mut self,
    prev: *mut Block,
    block: *mut Block,
    next: *mut Block,
  ) {
    unsafe {
      let prev_free = !prev.is_null() && !Block::is_allocated(prev);
      let next_free = !next.is_null() && !Block::is_allocated(next);

      match (prev_free, next_free) {
        (false, false) => {
          Block::set_header(block, Block::size(block), false);
          self.push_free(block);
        }
        (false, true) => {
          self.remove_free(next);
          if next == self.heap_last {
            self.heap_last = block;
          }
          Block::set_header(block, Block::size(block) + Block::size(next), false);
          self.push_free(block);
        }
        (true, false) => {
          // prev is already on the free list and keeps its position there.
          if block == self.heap_last {
            self.heap_last = prev;
          }
          Block::set_header(prev, Block::size(prev) + Block::size(block), false);
        }
        (true, true) => {
          self.remove_free(next);
          if next == self.heap_last {
            self.heap_last = prev;
          }
          Block::set_header(
            prev,
            Block::size(prev) + Block::size(block) + Block::size(next),
            false,
          );
        }
      }
    }
  }

  /// Pushes a free block at the head of the free list. O(1).
  unsafe fn push_free(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let free = block as *mut FreeBlock;
      (*free).prev = ptr::null_mut();
      (*free).next = self.head;

      if !self.head.is_null() {
        (*(self.head as *mut FreeBlock)).prev = block;
      }

      self.head = block;
    }
  }

  /// Unlinks a block from the free list by patching its neighbors. O(1).
  unsafe fn remove_free(
    &mut self,
    block: *mut Block,
  ) {
    unsafe {
      let free = block as *mut FreeBlock;
      let prev = (*free).prev;
      let next = (*free).next;

      if prev.is_null() {
        self.head = next;
      } else {
        (*(prev as *mut FreeBlock)).next = next;
      }

      if !next.is_null() {
        (*(next as *mut FreeBlock)).prev = prev;
      }
    }
  }

  /// Counts how many times `block` occurs on the free list.
  unsafe fn free_list_occurrences(
    &self,
    block: *mut Block,
  ) -> usize {
    unsafe {
      let mut count = 0;
      let mut current = self.head;

      while !current.is_null() {
        if current == block {
          count += 1;
        }
        current = (*(current as *mut FreeBlock)).next;
      }

      count
    }
  }
}
