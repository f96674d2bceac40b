use std::io::Read;
use std::ptr;

use libc::sbrk;
use tagalloc::{SbrkRegion, TagAllocator, print_alloc};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations change the program
/// break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  let mut allocator = TagAllocator::new(SbrkRegion::new());
  allocator.init().expect("sbrk refused the init padding");

  unsafe {
    // Initial heap state
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate 24 bytes. The block carries a header and a footer and is
    //    rounded up to the heap alignment, so the break moves by more than
    //    the request.
    // --------------------------------------------------------------------
    let first = allocator.allocate(24);
    println!("\n[1] Allocate 24 bytes");
    print_alloc(24, first);

    ptr::write_bytes(first, 0xAB, 24);
    println!("[1] Initialized first block with 0xAB");

    print_program_break("after first alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate two more blocks so the heap has three physical neighbors.
    // --------------------------------------------------------------------
    let second = allocator.allocate(24);
    let third = allocator.allocate(24);
    println!("\n[2] Allocate two more 24-byte blocks");
    print_alloc(24, second);
    print_alloc(24, third);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the middle block, then the first one. Freeing the first block
    //    coalesces it with the already-free middle block: the two become
    //    one free block spanning both.
    // --------------------------------------------------------------------
    allocator.deallocate(second);
    println!("\n[3] Deallocated second (middle) block at {:?}", second);

    allocator.deallocate(first);
    println!("[3] Deallocated first block at {:?}", first);
    println!("[3] first+second now form a single free block");

    allocator.check_heap();
    println!("[3] check_heap passed");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Allocate 8 bytes. First fit takes the merged free block and splits
    //    it: the low part is returned, the tail stays free.
    // --------------------------------------------------------------------
    let fourth = allocator.allocate(8);
    println!("\n[4] Allocate 8 bytes (reuses the merged free block)");
    print_alloc(8, fourth);

    println!(
      "[4] fourth == first? {}",
      if fourth == first {
        "Yes, the freed span was reused"
      } else {
        "No, it was placed somewhere else"
      }
    );

    print_program_break("after reuse (break should not have moved)");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Grow the 8-byte allocation to 64 bytes. The payload moves to a new
    //    block; its first bytes are preserved.
    // --------------------------------------------------------------------
    fourth.write(0x42);
    let resized = allocator.reallocate(fourth, 64);
    println!("\n[5] Reallocate 8 -> 64 bytes");
    print_alloc(64, resized);
    println!("[5] First byte survived the move: 0x{:X}", resized.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Zeroed allocation.
    // --------------------------------------------------------------------
    let zeroed = allocator.allocate_zeroed(4, 8);
    println!("\n[6] allocate_zeroed(4, 8) -> 32 zero bytes");
    print_alloc(32, zeroed);
    println!(
      "[6] zeroed[0..4] = {:?}",
      [
        zeroed.read(),
        zeroed.add(1).read(),
        zeroed.add(2).read(),
        zeroed.add(3).read()
      ]
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) End of demo. The region never shrinks; the OS reclaims everything
    //    when the process exits.
    // --------------------------------------------------------------------
    allocator.deallocate(resized);
    allocator.deallocate(third);
    allocator.deallocate(zeroed);
    allocator.check_heap();

    println!(
      "\n[7] All blocks freed, heap checked. Process will exit and the OS will reclaim all memory."
    );
  }
}
