//! Region providers.
//!
//! A region is the single contiguous byte span an allocator carves its blocks
//! from. It only ever grows; the allocator asks for more bytes and receives
//! the old end of the span back:
//!
//! ```text
//!   Before grow(n):   [ bytes handed out so far ]│← end
//!   After grow(n):    [ bytes handed out so far ][ n new bytes ]│← new end
//!                                                ▲
//!                                                └── returned address
//! ```
//!
//! Two providers ship with the crate:
//!
//! - [`SbrkRegion`] extends the program's data segment with `sbrk(2)`, the
//!   classic heap source.
//! - [`BufferRegion`] bumps through a fixed-capacity buffer it owns. It makes
//!   the allocator fully deterministic, which is what the tests and benches
//!   are built on.

use std::alloc::{self, Layout};
use std::ptr;

use libc::{c_void, intptr_t, sbrk};

use crate::ALIGNMENT;

/// A grow-only contiguous byte region.
///
/// Contract:
///
/// - `grow(bytes)` extends the region by exactly `bytes` and returns the old
///   end, or null when the region is exhausted.
/// - The first address ever returned is [`ALIGNMENT`]-aligned.
/// - Previously returned addresses stay valid; the region never shrinks.
/// - Successive grows are physically contiguous as long as the allocator is
///   the region's only user.
pub trait Region {
  /// Grows the region by `bytes` and returns the old end, or null on
  /// exhaustion.
  fn grow(&mut self, bytes: usize) -> *mut u8;
}

/// Region backed by the program break, grown with `sbrk(2)`.
///
/// The first grow advances the break to an [`ALIGNMENT`] boundary before
/// carving, so the region hands out an aligned base. After that the break
/// moves by exactly the requested amount, keeping grows contiguous.
#[derive(Debug, Default)]
pub struct SbrkRegion {
  aligned: bool,
}

impl SbrkRegion {
  /// Creates an sbrk-backed region. No system call is made until the first
  /// grow.
  pub const fn new() -> Self {
    Self { aligned: false }
  }
}

impl Region for SbrkRegion {
  fn grow(&mut self, bytes: usize) -> *mut u8 {
    // sbrk takes a signed increment
    if bytes > isize::MAX as usize {
      return ptr::null_mut();
    }

    unsafe {
      if !self.aligned {
        let brk = sbrk(0) as usize;
        let pad = crate::align_to!(brk, ALIGNMENT) - brk;

        if pad != 0 && sbrk(pad as intptr_t) == usize::MAX as *mut c_void {
          return ptr::null_mut();
        }

        self.aligned = true;
      }

      let old = sbrk(bytes as intptr_t);
      if old == usize::MAX as *mut c_void {
        // sbrk returns (void*)-1 on failure
        return ptr::null_mut();
      }

      old as *mut u8
    }
  }
}

/// Region backed by a fixed-capacity, [`ALIGNMENT`]-aligned buffer.
///
/// The buffer is allocated once up front; `grow` bumps through it and reports
/// exhaustion once the capacity is spent. The capacity is rounded up to the
/// alignment on creation.
#[derive(Debug)]
pub struct BufferRegion {
  base: *mut u8,
  capacity: usize,
  brk: usize,
}

impl BufferRegion {
  /// Creates a region of (at least) `capacity` bytes. A capacity of zero, or
  /// a failed buffer allocation, yields a region that is exhausted from the
  /// start.
  pub fn new(capacity: usize) -> Self {
    let capacity = crate::align!(capacity);

    let base = match Layout::from_size_align(capacity, ALIGNMENT) {
      Ok(layout) if capacity > 0 => unsafe { alloc::alloc(layout) },
      _ => ptr::null_mut(),
    };

    let capacity = if base.is_null() { 0 } else { capacity };

    Self { base, capacity, brk: 0 }
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }

  /// Total bytes this region can hand out.
  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

impl Region for BufferRegion {
  fn grow(&mut self, bytes: usize) -> *mut u8 {
    if bytes > self.capacity - self.brk {
      return ptr::null_mut();
    }

    let old = self.base.wrapping_add(self.brk);
    self.brk += bytes;

    old
  }
}

impl Drop for BufferRegion {
  fn drop(&mut self) {
    if self.base.is_null() {
      return;
    }

    if let Ok(layout) = Layout::from_size_align(self.capacity, ALIGNMENT) {
      unsafe { alloc::dealloc(self.base, layout) };
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn buffer_region_base_is_aligned() {
    let mut region = BufferRegion::new(64);

    let base = region.grow(16);
    assert!(!base.is_null());
    assert_eq!(base as usize % ALIGNMENT, 0);
  }

  #[test]
  fn buffer_region_grows_contiguously() {
    let mut region = BufferRegion::new(128);

    let first = region.grow(16);
    let second = region.grow(32);
    let third = region.grow(16);

    assert_eq!(second, first.wrapping_add(16));
    assert_eq!(third, first.wrapping_add(48));
    assert_eq!(region.used(), 64);
  }

  #[test]
  fn buffer_region_reports_exhaustion() {
    let mut region = BufferRegion::new(32);

    assert!(!region.grow(32).is_null());
    assert!(region.grow(1).is_null());

    // exhaustion is not sticky for a request that still fits
    assert!(!region.grow(0).is_null());
  }

  #[test]
  fn buffer_region_rounds_capacity_up() {
    let region = BufferRegion::new(1);
    assert_eq!(region.capacity(), ALIGNMENT);
  }

  #[test]
  fn zero_capacity_region_is_always_exhausted() {
    let mut region = BufferRegion::new(0);

    assert_eq!(region.capacity(), 0);
    assert!(region.grow(1).is_null());
  }

  #[test]
  #[serial]
  fn sbrk_region_hands_out_aligned_monotonic_spans() {
    let mut region = SbrkRegion::new();

    let first = region.grow(64);
    assert!(!first.is_null());
    assert_eq!(first as usize % ALIGNMENT, 0);

    let second = region.grow(64);
    assert!(!second.is_null());
    assert!(second as usize > first as usize);
  }
}
