use crate::align::WSIZE;
use crate::block::Block;
use crate::heap::Region;

/// Intrusive doubly linked list over free blocks, threaded through their
/// payloads. Links are stored as signed 32-bit byte offsets **relative to
/// the cell holding them**, halving per-node overhead compared to absolute
/// addresses and keeping the minimum block size at 16.
///
/// ```text
///   root cell            free block A           free block B
///   ┌────────┐           ┌──────┬──────┐        ┌──────┬──────┐
///   │ +off A │──────────▶│ prev │ next │───────▶│ prev │ next │──▶ 0
///   └────────┘           │ ▼    │      │        │ ▼    │      │
///        ▲───────────────┴─root │      │   ┌────┴─ A   │      │
///                               └──────┼───┘           └──────┘
/// ```
///
/// The head node's `prev` resolves to the root cell itself; every other
/// `prev` resolves to the predecessor node. A zero `next` (or a zero root
/// cell) means "end of list". `0` can never be a real link because no cell
/// links to itself.
///
/// Insertion is LIFO: the most recently freed or split-off block becomes
/// the head.
#[derive(Debug, Clone, Copy)]
pub struct FreeList {
  root: *mut u8,
}

/// Byte offset of the `prev` link inside a free block's payload.
const PREV_OFF: usize = 0;
/// Byte offset of the `next` link inside a free block's payload.
const NEXT_OFF: usize = WSIZE;

fn offset_between(from: *const u8, to: *const u8) -> i32 {
  (to as isize - from as isize) as i32
}

unsafe fn read_offset(cell: *mut u8) -> i32 {
  unsafe { *cell.cast::<i32>() }
}

unsafe fn write_offset(cell: *mut u8, value: i32) {
  unsafe { *cell.cast::<i32>() = value };
}

impl FreeList {
  /// Takes ownership of an existing root cell. The cell must hold 0 (an
  /// empty list) or a valid head offset.
  pub fn new(root: *mut u8) -> Self {
    Self { root }
  }

  pub fn root(&self) -> *mut u8 {
    self.root
  }

  /// Resolves a stored offset relative to `from`, bounds-checked against
  /// the heap extent. All link arithmetic funnels through here; a zero
  /// offset and an out-of-range target both come back as `None`.
  pub unsafe fn resolve(&self, from: *mut u8, offset: i32, region: &Region) -> Option<*mut u8> {
    if offset == 0 {
      return None;
    }
    let target = from.wrapping_offset(offset as isize);
    if target != self.root && !region.contains(target) {
      return None;
    }
    Some(target)
  }

  pub unsafe fn is_empty(&self) -> bool {
    unsafe { read_offset(self.root) == 0 }
  }

  pub unsafe fn head(&self, region: &Region) -> Option<Block> {
    let offset = unsafe { read_offset(self.root) };
    unsafe { self.resolve(self.root, offset, region) }.map(Block::from_payload_unchecked)
  }

  /// Resolves a node's `prev` link to the cell it names: the root cell
  /// for the head node, the predecessor's payload otherwise.
  pub unsafe fn prev_target(&self, node: Block, region: &Region) -> Option<*mut u8> {
    let cell = unsafe { node.payload().add(PREV_OFF) };
    let offset = unsafe { read_offset(cell) };
    unsafe { self.resolve(cell, offset, region) }
  }

  /// The list successor of a node, or `None` at the tail.
  pub unsafe fn next_of(&self, node: Block, region: &Region) -> Option<Block> {
    let cell = unsafe { node.payload().add(NEXT_OFF) };
    let offset = unsafe { read_offset(cell) };
    unsafe { self.resolve(cell, offset, region) }.map(Block::from_payload_unchecked)
  }

  /// Zeroes a block's embedded links. Done on every free before the block
  /// enters the list, so no stale offsets survive a reuse.
  pub unsafe fn clear_node(&self, node: Block) {
    unsafe {
      write_offset(node.payload().add(PREV_OFF), 0);
      write_offset(node.payload().add(NEXT_OFF), 0);
    }
  }

  /// Pushes a free block to the head of the list. O(1).
  pub unsafe fn insert_front(&self, node: Block, region: &Region) {
    let payload = node.payload();
    unsafe {
      let old_offset = read_offset(self.root);

      write_offset(payload.add(PREV_OFF), offset_between(payload, self.root));

      if let Some(old_head) = self.resolve(self.root, old_offset, region) {
        write_offset(payload.add(NEXT_OFF), offset_between(payload, old_head));
        write_offset(old_head.add(PREV_OFF), offset_between(old_head, payload));
      } else {
        write_offset(payload.add(NEXT_OFF), 0);
      }

      write_offset(self.root, offset_between(self.root, payload));
    }
  }

  /// Splices a free block out of the list using its own stored offsets.
  /// O(1); the caller always holds the block, so no traversal happens.
  ///
  /// The head node's logical predecessor is the root cell rather than
  /// another node, so the two cases rewrite different cells but are
  /// otherwise symmetric. Removing the last node resets the root cell to
  /// the empty sentinel.
  ///
  /// Calling this on an allocated block is a usage error: it is reported
  /// and the list is left untouched.
  pub unsafe fn remove(&self, node: Block, region: &Region) {
    if node.is_allocated() {
      log::error!(
        "free-list remove on allocated block at {:p}",
        node.payload()
      );
      debug_assert!(false, "free-list remove on allocated block");
      return;
    }

    let payload = node.payload();
    unsafe {
      let prev_cell = payload.add(PREV_OFF);
      let next_cell = payload.add(NEXT_OFF);
      let prev_offset = read_offset(prev_cell);
      let next_offset = read_offset(next_cell);

      let Some(pred) = self.resolve(prev_cell, prev_offset, region) else {
        log::error!("free-list node at {payload:p} has no predecessor link");
        debug_assert!(false, "unlinked node passed to remove");
        return;
      };
      let successor = self.resolve(next_cell, next_offset, region);

      if pred == self.root {
        // Head node: the root cell takes over the successor link.
        match successor {
          Some(next) => {
            write_offset(self.root, offset_between(self.root, next));
            write_offset(next.add(PREV_OFF), offset_between(next, self.root));
          }
          None => write_offset(self.root, 0),
        }
      } else {
        // Interior or tail node: splice the two neighbouring nodes.
        match successor {
          Some(next) => {
            write_offset(pred.add(NEXT_OFF), offset_between(pred, next));
            write_offset(next.add(PREV_OFF), offset_between(next, pred));
          }
          None => write_offset(pred.add(NEXT_OFF), 0),
        }
      }

      self.clear_node(node);
    }
  }

  /// Iterates the list head to tail. The step cap makes a corrupt cyclic
  /// list terminate instead of spinning; the checker relies on that.
  pub unsafe fn iter<'a>(&'a self, region: &'a Region) -> Iter<'a> {
    Iter {
      list: self,
      region,
      current: unsafe { self.head(region) },
      remaining: region.len() / crate::align::MIN_BLOCK + 1,
    }
  }
}

pub struct Iter<'a> {
  list: &'a FreeList,
  region: &'a Region,
  current: Option<Block>,
  remaining: usize,
}

impl Iterator for Iter<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;

    let node = self.current?;
    self.current = unsafe { self.list.next_of(node, self.region) };
    Some(node)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::{DSIZE, MIN_BLOCK};
  use crate::header::{Header, HeaderFlags};
  use crate::heap::{ArenaHeap, GrowHeap};

  // A root cell followed by `count` minimum-size free blocks, none of them
  // linked yet. List tests do not need the blocks to be physical
  // neighbours of anything.
  fn scratch_list(arena: &mut ArenaHeap, count: usize) -> (FreeList, Region, Vec<Block>) {
    let len = 2 * DSIZE + count * MIN_BLOCK;
    let base = arena.grow(len).unwrap();
    let region = Region::new(base, len);
    let list = FreeList::new(unsafe { base.add(WSIZE) });
    unsafe {
      write_offset(list.root(), 0);

      let mut blocks = Vec::new();
      for i in 0..count {
        // Headers sit one word before each 8-aligned payload.
        let block = Block::from_payload_unchecked(base.add(2 * DSIZE + i * MIN_BLOCK));
        block.set_header(Header::pack(MIN_BLOCK, HeaderFlags::empty()));
        block.set_tags(Header::pack(MIN_BLOCK, HeaderFlags::empty()));
        list.clear_node(block);
        blocks.push(block);
      }
      (list, region, blocks)
    }
  }

  // Walks next links from the head, then prev links back from the tail,
  // and requires both directions to agree.
  fn collect_checked(list: &FreeList, region: &Region) -> Vec<Block> {
    unsafe {
      let forward: Vec<Block> = list.iter(region).collect();

      let mut backward = Vec::new();
      if let Some(tail) = forward.last() {
        let mut cursor = *tail;
        loop {
          backward.push(cursor);
          let prev_cell = cursor.payload();
          let offset = read_offset(prev_cell);
          let pred = list.resolve(prev_cell, offset, region).unwrap();
          if pred == list.root() {
            break;
          }
          cursor = Block::from_payload_unchecked(pred);
        }
      }
      backward.reverse();
      assert_eq!(forward, backward, "forward and backward walks disagree");

      forward
    }
  }

  #[test]
  fn test_insert_is_lifo() {
    let mut arena = ArenaHeap::new(256);
    let (list, region, blocks) = scratch_list(&mut arena, 3);

    unsafe {
      for block in &blocks {
        list.insert_front(*block, &region);
      }
      let order = collect_checked(&list, &region);
      assert_eq!(vec![blocks[2], blocks[1], blocks[0]], order);
      assert_eq!(Some(blocks[2]), list.head(&region));
    }
  }

  #[test]
  fn test_remove_head_interior_tail() {
    let mut arena = ArenaHeap::new(256);
    let (list, region, blocks) = scratch_list(&mut arena, 3);

    unsafe {
      for block in &blocks {
        list.insert_front(*block, &region);
      }
      // List is [2, 1, 0]; remove the interior node.
      list.remove(blocks[1], &region);
      assert_eq!(vec![blocks[2], blocks[0]], collect_checked(&list, &region));

      // Remove the head.
      list.remove(blocks[2], &region);
      assert_eq!(vec![blocks[0]], collect_checked(&list, &region));

      // Remove the last node; the root cell must read empty again.
      list.remove(blocks[0], &region);
      assert!(list.is_empty());
      assert!(list.head(&region).is_none());
    }
  }

  #[test]
  fn test_exhaustive_small_list_orders() {
    // Every removal order over every list size up to 4 keeps the list
    // bidirectionally consistent and drains back to the empty sentinel.
    fn permutations(items: Vec<usize>) -> Vec<Vec<usize>> {
      if items.len() <= 1 {
        return vec![items];
      }
      let mut all = Vec::new();
      for (i, &chosen) in items.iter().enumerate() {
        let mut rest = items.clone();
        rest.remove(i);
        for mut tail in permutations(rest) {
          tail.insert(0, chosen);
          all.push(tail);
        }
      }
      all
    }

    for count in 1..=4 {
      for order in permutations((0..count).collect()) {
        let mut arena = ArenaHeap::new(256);
        let (list, region, blocks) = scratch_list(&mut arena, count);

        unsafe {
          for block in &blocks {
            list.insert_front(*block, &region);
          }

          let mut live: Vec<Block> = blocks.iter().rev().copied().collect();
          for &victim in &order {
            list.remove(blocks[victim], &region);
            live.retain(|b| *b != blocks[victim]);
            assert_eq!(live, collect_checked(&list, &region));
          }
          assert!(list.is_empty());
        }
      }
    }
  }

  #[test]
  fn test_reinsert_after_drain() {
    let mut arena = ArenaHeap::new(256);
    let (list, region, blocks) = scratch_list(&mut arena, 2);

    unsafe {
      list.insert_front(blocks[0], &region);
      list.remove(blocks[0], &region);
      assert!(list.is_empty());

      list.insert_front(blocks[1], &region);
      list.insert_front(blocks[0], &region);
      assert_eq!(
        vec![blocks[0], blocks[1]],
        collect_checked(&list, &region)
      );
    }
  }

  #[test]
  fn test_resolve_rejects_out_of_range() {
    let mut arena = ArenaHeap::new(256);
    let (list, region, blocks) = scratch_list(&mut arena, 1);

    unsafe {
      assert!(list.resolve(blocks[0].payload(), 0, &region).is_none());
      assert!(
        list
          .resolve(blocks[0].payload(), 1 << 20, &region)
          .is_none()
      );
    }
  }
}
