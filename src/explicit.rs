use std::ptr;

use crate::align::{CHUNK, DSIZE, MIN_BLOCK, WSIZE, adjust_request};
use crate::block::Block;
use crate::fit::FitStrategy;
use crate::header::{Header, HeaderFlags};
use crate::heap::{AllocError, GrowHeap, Region};
use crate::list::FreeList;

/// Boundary-tag allocator over an explicit, offset-encoded free list.
///
/// Owns a growth primitive and the byte range it has handed out so far.
/// All bookkeeping lives inside that range: boundary tags at both ends of
/// every block, free-list links inside free payloads, and one root cell in
/// the heap preamble. The struct itself carries only the extent, the
/// strategy selector and the next-fit rover, so independent instances
/// coexist and tests can tear one down by dropping it.
///
/// Single-threaded by contract: every operation touches the shared free
/// list, so callers wanting concurrency wrap the whole instance in a
/// mutex rather than expecting interior locking.
pub struct ExplicitAllocator<G: GrowHeap> {
  growth: G,
  pub(crate) region: Region,
  pub(crate) list: FreeList,
  /// Payload of the prologue sentinel; physical block scans start here.
  pub(crate) first_block: *mut u8,
  strategy: FitStrategy,
  /// Next-fit resume point. Always a node currently in the list, or
  /// `None`; relocated whenever its node is unlinked.
  rover: Option<Block>,
  chunk: usize,
}

// Raw pointers into memory the allocator owns through `growth`; moving the
// allocator to another thread moves exclusive access with it.
unsafe impl<G: GrowHeap + Send> Send for ExplicitAllocator<G> {}

impl<G: GrowHeap> ExplicitAllocator<G> {
  /// Creates an allocator with the default first-fit strategy.
  pub fn new(growth: G) -> Result<Self, AllocError> {
    Self::with_strategy(growth, FitStrategy::default())
  }

  /// Creates an allocator with the given fit strategy. The strategy is
  /// fixed for the lifetime of the instance.
  ///
  /// Lays down the heap preamble (an alignment pad, the free-list root
  /// cell, the prologue sentinel, the epilogue sentinel) and pre-extends
  /// by one chunk so the first allocation stays off the growth primitive.
  pub fn with_strategy(mut growth: G, strategy: FitStrategy) -> Result<Self, AllocError> {
    let preamble = 6 * WSIZE;
    let base = growth.grow(preamble)?;

    let mut this = Self {
      growth,
      region: Region::new(base, preamble),
      list: FreeList::new(unsafe { base.add(WSIZE) }),
      first_block: unsafe { base.add(4 * WSIZE) },
      strategy,
      rover: None,
      chunk: CHUNK,
    };

    unsafe {
      let word = |i: usize| base.add(i * WSIZE).cast::<u32>();
      *word(0) = 0; // alignment padding
      *word(1) = 0; // free-list root cell, empty
      *word(2) = 0; // padding so the prologue payload is 8-aligned
      *word(3) = Header::pack(DSIZE, HeaderFlags::ALLOCATED).word(); // prologue header
      *word(4) = Header::pack(DSIZE, HeaderFlags::ALLOCATED).word(); // prologue footer
      *word(5) = Header::pack(0, HeaderFlags::ALLOCATED).word(); // epilogue

      let fresh = this.extend(this.chunk)?;
      this.list.insert_front(fresh, &this.region);
    }

    Ok(this)
  }

  pub fn strategy(&self) -> FitStrategy {
    self.strategy
  }

  /// Total bytes obtained from the growth primitive so far.
  pub fn heap_size(&self) -> usize {
    self.region.len()
  }

  /// Allocates at least `size` writable bytes and returns their 8-aligned
  /// address, or null when `size == 0`, when `size` is too large to carry
  /// its block overhead, or when the growth primitive is exhausted. On
  /// failure the heap is left exactly as it was.
  ///
  /// # Safety
  ///
  /// The returned region is valid until passed to [`free`](Self::free) or
  /// grown away by [`resize`](Self::resize); the caller must not touch
  /// bytes beyond `size`.
  pub unsafe fn allocate(&mut self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let Some(asize) = adjust_request(size) else {
      log::debug!("allocate({size}): size exceeds the representable block range");
      return ptr::null_mut();
    };
    unsafe {
      if let Some(found) = self
        .strategy
        .find(&self.list, &self.region, self.rover, asize)
      {
        if self.strategy == FitStrategy::Next {
          self.rover = self.list.next_of(found, &self.region);
        }
        self.unlink(found);
        self.place(found, asize);
        return found.payload();
      }

      // No fit: grow by at least a chunk, merge with the trailing free
      // block if there is one, and place in the merged result.
      match self.extend(asize.max(self.chunk)) {
        Ok(fresh) => {
          let merged = self.coalesce(fresh);
          self.place(merged, asize);
          merged.payload()
        }
        Err(err) => {
          log::debug!("allocate({size}): {err}");
          ptr::null_mut()
        }
      }
    }
  }

  /// Returns a block to the allocator. Null is a no-op; a pointer that
  /// never came from this allocator is reported and otherwise ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer previously returned by
  /// [`allocate`](Self::allocate) or [`resize`](Self::resize) of this
  /// instance. Double frees corrupt the free list (the advisory checker
  /// catches them after the fact, not at call time).
  pub unsafe fn free(&mut self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    let Some(block) = Block::from_payload(ptr, &self.region) else {
      log::error!("free of {ptr:p}, which is not a heap payload");
      return;
    };

    unsafe {
      let freed = block.header().freed();
      block.set_tags(freed);
      self.list.clear_node(block);

      let merged = self.coalesce(block);
      self.list.insert_front(merged, &self.region);
    }
  }

  /// Resizes an allocation to at least `size` bytes.
  ///
  /// Null behaves as `allocate(size)`; `size == 0` behaves as `free` and
  /// returns null. When the adjusted size still fits the block's recorded
  /// size the same pointer comes back unchanged; otherwise the payload
  /// moves to a fresh block and the first `min(old, new)` payload bytes
  /// are preserved. Returns null (old block intact) on exhaustion.
  ///
  /// # Safety
  ///
  /// Same contract as [`free`](Self::free) for `ptr`.
  pub unsafe fn resize(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
    unsafe {
      if ptr.is_null() {
        return self.allocate(size);
      }
      if size == 0 {
        self.free(ptr);
        return ptr::null_mut();
      }
      let Some(block) = Block::from_payload(ptr, &self.region) else {
        log::error!("resize of {ptr:p}, which is not a heap payload");
        return ptr::null_mut();
      };

      let old_payload = block.payload_size();
      if adjust_request(size).is_some_and(|asize| asize <= block.size()) {
        // Fits in place. No shrink-split; the slack stays with the block.
        return ptr;
      }

      // An unrepresentable size falls through here and fails the
      // allocation, leaving the old block intact.
      let new_ptr = self.allocate(size);
      if new_ptr.is_null() {
        return ptr::null_mut();
      }
      let copy = old_payload.min(size);
      ptr::copy_nonoverlapping(ptr, new_ptr, copy);
      self.free(ptr);
      new_ptr
    }
  }

  /// Requests at least `min_increment` bytes from the growth primitive
  /// and shapes the grown area into one free block whose header overwrites
  /// the old epilogue, with a fresh epilogue past its end. The block is
  /// not yet in the free list. Nothing is written on failure.
  unsafe fn extend(&mut self, min_increment: usize) -> Result<Block, AllocError> {
    let size = crate::align!(min_increment);
    let grown = self.growth.grow(size)?;
    debug_assert_eq!(
      grown,
      self.region.limit(),
      "growth primitive must extend contiguously"
    );
    self.region.push_limit(size);

    // The old epilogue header becomes the new block's header, so the
    // payload starts exactly at the grown area's base.
    let block = Block::from_payload_unchecked(grown);
    unsafe {
      let header = Header::pack(size, HeaderFlags::empty());
      block.set_header(header);
      block.set_tags(header);
      block.next().set_header(Header::pack(0, HeaderFlags::ALLOCATED));
      self.list.clear_node(block);
    }

    log::debug!(
      "extended heap by {size} bytes, limit now {:p}",
      self.region.limit()
    );
    Ok(block)
  }

  /// Removes a node from the free list, relocating the rover first if it
  /// rests on that node.
  unsafe fn unlink(&mut self, node: Block) {
    unsafe {
      if self.rover == Some(node) {
        self.rover = self.list.next_of(node, &self.region);
      }
      self.list.remove(node, &self.region);
    }
  }

  /// Merges a free block with its free physical neighbours. The argument
  /// must not be in the free list; the merged result is not inserted
  /// either, so this serves both the free path and the placement split.
  /// A pinned neighbour is left alone as if it were allocated.
  ///
  /// Returns the surviving block, which is the predecessor's address
  /// whenever the predecessor took part in the merge.
  unsafe fn coalesce(&mut self, block: Block) -> Block {
    unsafe {
      let prev_footer = block.prev_footer();
      let next = block.next();
      let next_header = next.header();

      // The prologue and epilogue sentinels read as allocated, so the
      // boundary cases fall out of the same two tests.
      let prev_free = !prev_footer.is_allocated() && !prev_footer.is_pinned();
      let next_free = !next_header.is_allocated() && !next_header.is_pinned();

      let mut size = block.size();
      match (prev_free, next_free) {
        (false, false) => block,
        (false, true) => {
          self.unlink(next);
          size += next.size();
          let header = Header::pack(size, HeaderFlags::empty());
          block.set_header(header);
          block.set_tags(header);
          block
        }
        (true, false) => {
          let prev = block.prev();
          self.unlink(prev);
          size += prev.size();
          let header = Header::pack(size, HeaderFlags::empty());
          prev.set_header(header);
          prev.set_tags(header);
          prev
        }
        (true, true) => {
          let prev = block.prev();
          self.unlink(prev);
          self.unlink(next);
          size += prev.size() + next.size();
          let header = Header::pack(size, HeaderFlags::empty());
          prev.set_header(header);
          prev.set_tags(header);
          prev
        }
      }
    }
  }

  /// Carves an allocated block of `asize` bytes out of a free block that
  /// has already been unlinked. A remainder of at least [`MIN_BLOCK`]
  /// becomes a fresh free block, merged with its own successor (the
  /// extend path can leave a free one there) and pushed onto the list;
  /// anything smaller stays inside the allocation.
  unsafe fn place(&mut self, block: Block, asize: usize) {
    unsafe {
      let size = block.size();

      if size - asize >= MIN_BLOCK {
        let header = Header::pack(asize, HeaderFlags::ALLOCATED);
        block.set_header(header);
        block.set_tags(header);

        let remainder = block.next();
        let rem_header = Header::pack(size - asize, HeaderFlags::empty());
        remainder.set_header(rem_header);
        remainder.set_tags(rem_header);
        self.list.clear_node(remainder);

        let merged = self.coalesce(remainder);
        self.list.insert_front(merged, &self.region);
      } else {
        let header = Header::pack(size, HeaderFlags::ALLOCATED);
        block.set_header(header);
        block.set_tags(header);
      }
    }
  }
}
