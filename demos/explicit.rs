use std::io::Read;
use std::ptr;

use libc::sbrk;
use tagalloc::{ExplicitAllocator, FitStrategy, SbrkHeap};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how the heap evolves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_report(allocator: &ExplicitAllocator<SbrkHeap>, label: &str) {
  let report = allocator.check(false);
  println!(
    "[{}] heap = {} bytes, {} blocks ({} free, {} listed), clean = {}",
    label,
    allocator.heap_size(),
    report.blocks,
    report.free_blocks,
    report.list_nodes,
    report.is_clean(),
  );
}

fn main() {
  // An explicit-free-list allocator over the real program break. It lays
  // down its prologue/epilogue sentinels and a first 4 KiB chunk up
  // front, then recycles freed blocks LIFO before ever growing again.
  let mut allocator = ExplicitAllocator::with_strategy(SbrkHeap, FitStrategy::First)
    .expect("sbrk refused the initial chunk");

  unsafe {
    print_program_break("start");
    print_report(&allocator, "start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate 100 bytes and write into them.
    // --------------------------------------------------------------------
    let first = allocator.allocate(100);
    println!("\n[1] allocate(100) = {first:?}");
    ptr::write_bytes(first, 0xAB, 100);
    println!("[1] Filled with 0xAB, first byte = 0x{:X}", first.read());
    println!("[1] Address % 8 = {} (always 0)", first as usize % 8);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) A second allocation lands right after the first; both were carved
    //    out of the same initial chunk, so the program break is unchanged.
    // --------------------------------------------------------------------
    let second = allocator.allocate(100);
    println!("\n[2] allocate(100) = {second:?}");
    println!(
      "[2] Distance from first = {} bytes (100 rounded up + 8 tag bytes)",
      second as usize - first as usize
    );
    print_program_break("after two allocations");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the first block, then allocate 90 bytes. The free list is
    //    LIFO, so the just-freed block is first in line and gets reused.
    // --------------------------------------------------------------------
    allocator.free(first);
    println!("\n[3] free(first)");
    let third = allocator.allocate(90);
    println!(
      "[3] allocate(90) = {:?}: {}",
      third,
      if third == first {
        "reused the freed block"
      } else {
        "allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Resize the survivor. 100 -> 50 fits in place; 100 -> 400 moves
    //    the payload and preserves its bytes.
    // --------------------------------------------------------------------
    let shrunk = allocator.resize(second, 50);
    println!("\n[4] resize(second, 50) = {shrunk:?} (in place: {})", shrunk == second);

    ptr::write_bytes(shrunk, 0xCD, 50);
    let moved = allocator.resize(shrunk, 400);
    println!(
      "[4] resize(-, 400) = {:?} (moved: {}), first byte still 0x{:X}",
      moved,
      moved != shrunk,
      moved.read()
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Free both survivors. Physical neighbours merge as they go, so
    //    the whole heap collapses back into a handful of free blocks.
    // --------------------------------------------------------------------
    allocator.free(third);
    allocator.free(moved);
    println!("\n[5] Freed everything");
    print_report(&allocator, "after frees");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Allocate past the initial chunk to force the growth primitive.
    //    Watch the program break move this time.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    let big = allocator.allocate(64 * 1024);
    println!("\n[6] allocate(64 KiB) = {big:?}");
    print_program_break("after large alloc");
    print_report(&allocator, "after growth");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) End of demo. The heap never shrinks; the OS reclaims everything
    //    when the process exits.
    // --------------------------------------------------------------------
    allocator.free(big);
    print_report(&allocator, "end");
    println!("\n[7] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
