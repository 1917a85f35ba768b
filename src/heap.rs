use libc::{c_void, intptr_t, sbrk};
use thiserror::Error;

use crate::align::DSIZE;

/// Recoverable allocation failures. Surfaced from the public allocator
/// entry points as a null pointer, never as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
  #[error("out of memory: growth primitive refused {requested} more bytes")]
  OutOfMemory { requested: usize },
}

/// The external heap-growth primitive: hand out at least `increment` more
/// bytes, contiguous with everything handed out before, or fail without
/// side effects.
///
/// Implementations never reclaim memory; the heap only grows upward.
pub trait GrowHeap {
  /// Extends the heap by `increment` bytes and returns the base address of
  /// the newly grown area.
  ///
  /// `increment` is expected to be a multiple of 8; the first call's
  /// returned base must be 8-byte aligned so every later base is too.
  fn grow(&mut self, increment: usize) -> Result<*mut u8, AllocError>;
}

/// Grows the real program break via `sbrk(2)`.
///
/// The process data segment is the arena, so there is no configurable
/// ceiling; the kernel decides when to refuse.
pub struct SbrkHeap;

impl GrowHeap for SbrkHeap {
  fn grow(&mut self, increment: usize) -> Result<*mut u8, AllocError> {
    // An increment past intptr_t::MAX would go negative through the cast
    // and shrink the break instead of growing it.
    if increment > intptr_t::MAX as usize {
      return Err(AllocError::OutOfMemory { requested: increment });
    }

    let address = unsafe { sbrk(increment as intptr_t) };

    if address == usize::MAX as *mut c_void {
      return Err(AllocError::OutOfMemory { requested: increment });
    }

    Ok(address as *mut u8)
  }
}

/// A bounded in-process arena simulating a virtual memory region with a
/// fixed maximum size. Deterministic, so tests run against this instead of
/// the program break.
pub struct ArenaHeap {
  // u64 storage guarantees the 8-byte base alignment the block layout
  // relies on.
  storage: Box<[u64]>,
  used: usize,
}

impl ArenaHeap {
  /// Creates an arena capped at `capacity` bytes (rounded up to 8).
  pub fn new(capacity: usize) -> Self {
    let words = capacity.div_ceil(DSIZE);
    Self {
      storage: vec![0u64; words].into_boxed_slice(),
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.storage.len() * DSIZE
  }

  pub fn used(&self) -> usize {
    self.used
  }
}

impl GrowHeap for ArenaHeap {
  fn grow(&mut self, increment: usize) -> Result<*mut u8, AllocError> {
    if increment > self.capacity() - self.used {
      return Err(AllocError::OutOfMemory { requested: increment });
    }

    let base = unsafe { self.storage.as_mut_ptr().cast::<u8>().add(self.used) };
    self.used += increment;

    Ok(base)
  }
}

/// The tracked extent of the managed byte range `[base, limit)`. Every
/// address computed from stored offsets is validated against this before
/// it is dereferenced.
#[derive(Debug, Clone, Copy)]
pub struct Region {
  base: *mut u8,
  limit: *mut u8,
}

impl Region {
  pub fn new(base: *mut u8, len: usize) -> Self {
    Self {
      base,
      limit: unsafe { base.add(len) },
    }
  }

  pub fn base(&self) -> *mut u8 {
    self.base
  }

  pub fn limit(&self) -> *mut u8 {
    self.limit
  }

  pub fn len(&self) -> usize {
    self.limit as usize - self.base as usize
  }

  pub fn is_empty(&self) -> bool {
    self.base == self.limit
  }

  /// Extends the tracked extent past a successful growth-primitive call.
  pub fn push_limit(&mut self, len: usize) {
    self.limit = unsafe { self.limit.add(len) };
  }

  pub fn contains(&self, address: *const u8) -> bool {
    (self.base as *const u8..self.limit as *const u8).contains(&address)
  }
}
