use crate::block::Block;
use crate::heap::Region;
use crate::list::FreeList;

/// Placement policy: which free block satisfies a request. A pure search
/// over the free list, so swapping the strategy changes nothing else.
/// Exactly one strategy is active per allocator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitStrategy {
  /// First list node large enough. Cheap, fragmentation in the middle.
  #[default]
  First,
  /// Resume from the node after the previous allocation point, wrapping
  /// to the list head. Amortizes well for streaming workloads; the rover
  /// must be relocated when the node it rests on leaves the list.
  Next,
  /// Smallest node large enough, ties broken by first encountered.
  /// Always a full scan.
  Best,
}

impl FitStrategy {
  /// Searches the free list for a block of at least `size` bytes. `rover`
  /// is the next-fit resume point maintained by the allocator; the other
  /// strategies ignore it.
  pub unsafe fn find(
    self,
    list: &FreeList,
    region: &Region,
    rover: Option<Block>,
    size: usize,
  ) -> Option<Block> {
    unsafe {
      match self {
        Self::First => list.iter(region).find(|block| block.size() >= size),
        Self::Next => Self::next_fit(list, region, rover, size),
        Self::Best => list
          .iter(region)
          .filter(|block| block.size() >= size)
          .min_by_key(|block| block.size()),
      }
    }
  }

  unsafe fn next_fit(
    list: &FreeList,
    region: &Region,
    rover: Option<Block>,
    size: usize,
  ) -> Option<Block> {
    unsafe {
      let Some(rover) = rover else {
        return list.iter(region).find(|block| block.size() >= size);
      };

      // Rover to tail first.
      let mut cursor = Some(rover);
      while let Some(block) = cursor {
        if block.size() >= size {
          return Some(block);
        }
        cursor = list.next_of(block, region);
      }

      // Wrap: head up to (not including) the rover.
      list
        .iter(region)
        .take_while(|block| *block != rover)
        .find(|block| block.size() >= size)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::{DSIZE, WSIZE};
  use crate::header::{Header, HeaderFlags};
  use crate::heap::{ArenaHeap, GrowHeap};

  // Root cell plus free blocks of the given sizes, inserted in order so
  // the LAST size ends up at the list head.
  fn list_of(
    arena: &mut ArenaHeap,
    sizes: &[usize],
  ) -> (FreeList, Region, Vec<Block>) {
    let len = 2 * DSIZE + sizes.iter().sum::<usize>() + DSIZE;
    let base = arena.grow(len).unwrap();
    let region = Region::new(base, len);
    let list = FreeList::new(unsafe { base.add(WSIZE) });

    unsafe {
      *list.root().cast::<i32>() = 0;

      let mut blocks = Vec::new();
      let mut payload = base.add(2 * DSIZE);
      for &size in sizes {
        let block = Block::from_payload_unchecked(payload);
        block.set_header(Header::pack(size, HeaderFlags::empty()));
        block.set_tags(Header::pack(size, HeaderFlags::empty()));
        list.clear_node(block);
        list.insert_front(block, &region);
        blocks.push(block);
        payload = payload.add(size);
      }
      (list, region, blocks)
    }
  }

  #[test]
  fn test_first_fit_takes_first_large_enough() {
    let mut arena = ArenaHeap::new(512);
    // Head order after LIFO insertion: 48, 64, 32.
    let (list, region, blocks) = list_of(&mut arena, &[32, 64, 48]);

    unsafe {
      let found = FitStrategy::First.find(&list, &region, None, 40).unwrap();
      assert_eq!(blocks[2], found); // the 48-byte head
      let found = FitStrategy::First.find(&list, &region, None, 56).unwrap();
      assert_eq!(blocks[1], found); // the 64-byte block
      assert!(FitStrategy::First.find(&list, &region, None, 80).is_none());
    }
  }

  #[test]
  fn test_best_fit_prefers_tightest() {
    let mut arena = ArenaHeap::new(512);
    let (list, region, blocks) = list_of(&mut arena, &[32, 64, 48]);

    unsafe {
      // 40 bytes fits 48 and 64; best fit must pick 48, never 64.
      let found = FitStrategy::Best.find(&list, &region, None, 40).unwrap();
      assert_eq!(blocks[2], found);
      assert_eq!(48, found.size());

      // Exact fit wins outright.
      let found = FitStrategy::Best.find(&list, &region, None, 32).unwrap();
      assert_eq!(blocks[0], found);
    }
  }

  #[test]
  fn test_best_fit_tie_breaks_on_first_encountered() {
    let mut arena = ArenaHeap::new(512);
    // Two equal candidates; list head order is 32b, 32a, 64.
    let (list, region, blocks) = list_of(&mut arena, &[64, 32, 32]);

    unsafe {
      let found = FitStrategy::Best.find(&list, &region, None, 24).unwrap();
      assert_eq!(blocks[2], found);
    }
  }

  #[test]
  fn test_next_fit_resumes_and_wraps() {
    let mut arena = ArenaHeap::new(512);
    // Head order: 48, 64, 32.
    let (list, region, blocks) = list_of(&mut arena, &[32, 64, 48]);

    unsafe {
      // Rover parked on the 64-byte node: a 24-byte request matches it
      // before the 48 at the head is ever looked at.
      let rover = Some(blocks[1]);
      let found = FitStrategy::Next.find(&list, &region, rover, 24).unwrap();
      assert_eq!(blocks[1], found);

      // Rover on the tail 32-byte node: a 40-byte request fails there,
      // wraps, and lands on the 48 at the head.
      let rover = Some(blocks[0]);
      let found = FitStrategy::Next.find(&list, &region, rover, 40).unwrap();
      assert_eq!(blocks[2], found);

      // Nothing anywhere is big enough.
      assert!(FitStrategy::Next.find(&list, &region, rover, 100).is_none());
    }
  }

  #[test]
  fn test_next_fit_without_rover_scans_from_head() {
    let mut arena = ArenaHeap::new(512);
    let (list, region, blocks) = list_of(&mut arena, &[32, 64, 48]);

    unsafe {
      let found = FitStrategy::Next.find(&list, &region, None, 40).unwrap();
      assert_eq!(blocks[2], found);
    }
  }
}
