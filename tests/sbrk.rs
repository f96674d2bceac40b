//! Integration tests against the real program break.
//!
//! These tests share the process-wide break, so they are serialized and keep
//! to access patterns that stay valid even if other code moves the break
//! between allocations: fresh allocator per test, frees only on single-block
//! heaps.

use serial_test::serial;
use tagalloc::{ALIGNMENT, SbrkRegion, TagAllocator};

fn sbrk_allocator() -> TagAllocator<SbrkRegion> {
  let mut allocator = TagAllocator::new(SbrkRegion::new());
  allocator.init().expect("sbrk refused the init padding");
  allocator
}

#[test]
#[serial]
fn basic_allocation_and_write_read() {
  let mut allocator = sbrk_allocator();

  unsafe {
    let ptr_u64 = allocator.allocate(8) as *mut u64;
    assert!(!ptr_u64.is_null());

    ptr_u64.write(0xDEADBEEFDEADBEEF);
    assert_eq!(ptr_u64.read(), 0xDEADBEEFDEADBEEF);

    let count = 8usize;
    let ptr_u16 = allocator.allocate(count * 2) as *mut u16;
    assert!(!ptr_u16.is_null());

    for i in 0..count {
      ptr_u16.add(i).write((i as u16) + 1);
    }

    // The first allocation must not be corrupted by the second.
    assert_eq!(ptr_u64.read(), 0xDEADBEEFDEADBEEF);

    for i in 0..count {
      assert_eq!((i as u16) + 1, ptr_u16.add(i).read());
    }
  }
}

#[test]
#[serial]
fn payloads_from_the_break_are_aligned() {
  let mut allocator = sbrk_allocator();

  unsafe {
    for size in [0usize, 1, 8, 13, 24, 64, 100, 4096] {
      let ptr = allocator.allocate(size);
      assert!(!ptr.is_null());

      assert_eq!(
        ptr as usize % ALIGNMENT,
        0,
        "allocation of {} bytes must be {}-byte aligned, got {:p}",
        size,
        ALIGNMENT,
        ptr
      );
    }
  }
}

#[test]
#[serial]
fn allocations_are_monotonic_and_distinct() {
  let mut allocator = sbrk_allocator();
  let mut addrs = Vec::with_capacity(4);

  unsafe {
    for size in [8usize, 32, 64, 128] {
      let ptr = allocator.allocate(size);
      assert!(!ptr.is_null());
      addrs.push(ptr as usize);
    }
  }

  // Fresh blocks come from the growing break, so addresses never go back.
  for w in addrs.windows(2) {
    assert!(
      w[1] > w[0],
      "addresses should be monotonic, got {:#x} then {:#x}",
      w[0],
      w[1]
    );
  }
}

#[test]
#[serial]
fn single_block_free_and_reuse() {
  let mut allocator = sbrk_allocator();

  unsafe {
    let p = allocator.allocate(24);
    assert!(!p.is_null());

    p.write(0x5A);
    assert_eq!(p.read(), 0x5A);

    allocator.deallocate(p);

    // The freed block satisfies the next request without growing the break.
    let q = allocator.allocate(24);
    assert_eq!(q, p);
  }
}

#[test]
#[serial]
fn deallocate_null_is_noop() {
  let mut allocator = sbrk_allocator();

  unsafe {
    allocator.deallocate(std::ptr::null_mut());
  }
}

#[test]
#[serial]
fn zeroed_allocation_from_the_break() {
  let mut allocator = sbrk_allocator();

  unsafe {
    let p = allocator.allocate_zeroed(4, 8);
    assert!(!p.is_null());

    for i in 0..32 {
      assert_eq!(p.add(i).read(), 0, "byte {} not zeroed", i);
    }
  }
}

#[test]
#[serial]
fn large_block_allocation_and_integrity() {
  let mut allocator = sbrk_allocator();

  unsafe {
    let count = 4096usize;
    let ptr = allocator.allocate(count * 4) as *mut u32;
    assert!(!ptr.is_null());

    for i in 0..count {
      ptr.add(i).write((i as u32) ^ 0xA5A5_A5A5);
    }

    for i in 0..count {
      assert_eq!(ptr.add(i).read(), (i as u32) ^ 0xA5A5_A5A5);
    }
  }
}
