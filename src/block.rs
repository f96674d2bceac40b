//! On-heap block layout.
//!
//! Every block starts with a one-word header and ends with a one-word footer,
//! both encoding the block's total size. The header additionally carries the
//! allocated flag in bit 0, which is always free because block sizes are
//! multiples of [`ALIGNMENT`].
//!
//! ```text
//!   ┌──────────┬──────────────────────────────────────────────┬──────────┐
//!   │  header  │                  payload                     │  footer  │
//!   │ size | a │   user bytes, or prev/next when free         │   size   │
//!   └──────────┴──────────────────────────────────────────────┴──────────┘
//!   ▲          ▲
//!   │          └── address handed to the caller (ALIGNMENT-aligned)
//!   └── block base
//! ```
//!
//! The footer is the boundary tag: reading the word just below a block's base
//! yields the previous physical block's size, which is what makes coalescing
//! with the left neighbor O(1).

use std::mem;

/// Required alignment of every payload address, two machine words.
pub const ALIGNMENT: usize = 2 * mem::size_of::<usize>();

/// Bytes occupied by a block header.
pub(crate) const HEADER_SIZE: usize = mem::size_of::<Block>();

/// Bytes occupied by a block footer.
pub(crate) const FOOTER_SIZE: usize = mem::size_of::<Footer>();

/// Smallest size any block may have: enough room for the header, the two
/// free-list links that occupy the payload while the block is free, and the
/// footer, rounded up to the alignment.
pub const MIN_BLOCK_SIZE: usize =
  crate::align!(mem::size_of::<FreeBlock>() + mem::size_of::<Footer>());

/// A block's header word. The rest of the block follows it in memory; all
/// access goes through the raw-pointer helpers below.
#[repr(C)]
pub(crate) struct Block {
  /// Total block size with the allocated flag in bit 0.
  header: usize,
}

/// View of a free block: the same header word, followed by the free-list
/// links stored in the first two payload words.
///
/// This interpretation is only valid while the header's allocated bit is
/// clear. Code obtains it by casting a `*mut Block` on demand and never keeps
/// the cast across an allocation-state transition.
#[repr(C)]
pub(crate) struct FreeBlock {
  /// The header word occupies the same slot in both interpretations; only
  /// the links are ever accessed through this view.
  _header: usize,
  pub prev: *mut Block,
  pub next: *mut Block,
}

/// A block's footer word.
#[repr(C)]
pub(crate) struct Footer {
  pub size: usize,
}

impl Block {
  /// Writes both boundary tags of a block: the header with the given size
  /// and allocation state, and the footer with the same size.
  ///
  /// # Safety
  ///
  /// `block` must point at the base of a span of at least `size` writable
  /// bytes, and `size` must be a multiple of [`ALIGNMENT`].
  pub(crate) unsafe fn set_header(
    block: *mut Block,
    size: usize,
    allocated: bool,
  ) {
    debug_assert_eq!(size % ALIGNMENT, 0);
    unsafe {
      (*block).header = size | usize::from(allocated);

      let footer = (block as *mut u8).add(size - FOOTER_SIZE) as *mut Footer;
      (*footer).size = size;
    }
  }

  /// Extracts a block's total size from its header.
  ///
  /// # Safety
  ///
  /// `block` must point at a block with a written header.
  pub(crate) unsafe fn size(block: *const Block) -> usize {
    unsafe { (*block).header & !1 }
  }

  /// Extracts a block's allocation state from its header.
  ///
  /// # Safety
  ///
  /// `block` must point at a block with a written header.
  pub(crate) unsafe fn is_allocated(block: *const Block) -> bool {
    unsafe { (*block).header & 1 != 0 }
  }

  /// Returns the payload address of a block, the pointer handed to callers.
  ///
  /// # Safety
  ///
  /// `block` must point at the base of a block.
  pub(crate) unsafe fn payload(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(HEADER_SIZE) }
  }

  /// Recovers the block base from a payload pointer. Inverse of [`payload`].
  ///
  /// [`payload`]: Block::payload
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by [`Block::payload`].
  pub(crate) unsafe fn from_payload(payload: *mut u8) -> *mut Block {
    unsafe { payload.sub(HEADER_SIZE) as *mut Block }
  }

  /// Number of user bytes an allocated block can hold.
  ///
  /// # Safety
  ///
  /// `block` must point at a block with a written header.
  pub(crate) unsafe fn payload_capacity(block: *const Block) -> usize {
    unsafe { Self::size(block) - HEADER_SIZE - FOOTER_SIZE }
  }
}

/// Computes the total block size needed to satisfy a payload of
/// `payload_len` bytes: header plus payload plus footer, rounded up to
/// [`ALIGNMENT`] and clamped below to [`MIN_BLOCK_SIZE`].
///
/// Returns `None` when the arithmetic overflows `usize`.
pub(crate) fn required_size(payload_len: usize) -> Option<usize> {
  let total = payload_len
    .checked_add(HEADER_SIZE + FOOTER_SIZE)?
    .checked_add(ALIGNMENT - 1)?
    & !(ALIGNMENT - 1);

  Some(total.max(MIN_BLOCK_SIZE))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(align(16))]
  struct AlignedArea([u8; 256]);

  fn area() -> AlignedArea {
    AlignedArea([0; 256])
  }

  #[test]
  fn header_and_footer_agree_after_set() {
    let mut area = area();
    let block = area.0.as_mut_ptr() as *mut Block;

    unsafe {
      Block::set_header(block, 3 * ALIGNMENT, true);

      assert_eq!(Block::size(block), 3 * ALIGNMENT);
      assert!(Block::is_allocated(block));

      let footer =
        (block as *mut u8).add(3 * ALIGNMENT - FOOTER_SIZE) as *mut Footer;
      assert_eq!((*footer).size, 3 * ALIGNMENT);
    }
  }

  #[test]
  fn allocated_bit_does_not_disturb_size() {
    let mut area = area();
    let block = area.0.as_mut_ptr() as *mut Block;

    unsafe {
      Block::set_header(block, MIN_BLOCK_SIZE, true);
      assert_eq!(Block::size(block), MIN_BLOCK_SIZE);

      Block::set_header(block, MIN_BLOCK_SIZE, false);
      assert_eq!(Block::size(block), MIN_BLOCK_SIZE);
      assert!(!Block::is_allocated(block));
    }
  }

  #[test]
  fn payload_round_trips_through_from_payload() {
    let mut area = area();
    let block = area.0.as_mut_ptr() as *mut Block;

    unsafe {
      let payload = Block::payload(block);
      assert_eq!(payload, (block as *mut u8).add(HEADER_SIZE));
      assert_eq!(Block::from_payload(payload), block);
    }
  }

  #[test]
  fn payload_capacity_excludes_both_tags() {
    let mut area = area();
    let block = area.0.as_mut_ptr() as *mut Block;

    unsafe {
      Block::set_header(block, 4 * ALIGNMENT, true);
      assert_eq!(
        Block::payload_capacity(block),
        4 * ALIGNMENT - HEADER_SIZE - FOOTER_SIZE
      );
    }
  }

  #[test]
  fn minimum_block_holds_links_and_tags() {
    assert!(MIN_BLOCK_SIZE >= mem::size_of::<FreeBlock>() + FOOTER_SIZE);
    assert_eq!(MIN_BLOCK_SIZE % ALIGNMENT, 0);
  }

  #[test]
  fn required_size_is_aligned_and_clamped() {
    for len in 0..128usize {
      let size = required_size(len).unwrap();
      assert_eq!(size % ALIGNMENT, 0);
      assert!(size >= MIN_BLOCK_SIZE);
      assert!(size >= len + HEADER_SIZE + FOOTER_SIZE);
    }
  }

  #[cfg(target_pointer_width = "64")]
  #[test]
  fn required_size_matches_sixty_four_bit_layout() {
    // header 8 + payload + footer 8, rounded to 16, minimum 32
    assert_eq!(required_size(0), Some(32));
    assert_eq!(required_size(8), Some(32));
    assert_eq!(required_size(16), Some(32));
    assert_eq!(required_size(17), Some(48));
    assert_eq!(required_size(24), Some(48));
  }

  #[test]
  fn required_size_rejects_overflow() {
    assert_eq!(required_size(usize::MAX), None);
    assert_eq!(required_size(usize::MAX - HEADER_SIZE - FOOTER_SIZE), None);
  }
}
