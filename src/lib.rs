//! # tagalloc - An Explicit-Free-List Memory Allocator Library
//!
//! This crate provides a **boundary-tag allocator** with an explicit,
//! offset-encoded free list. It manages one contiguous, monotonically
//! growable byte region and exposes allocate/free/resize with C-malloc
//! semantics, keeping every scrap of bookkeeping inside the heap itself.
//!
//! ## Overview
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                            HEAP REGION                               │
//!   │                                                                      │
//!   │   ┌────┬──────┬────┬──────────┬─────────┬─────────┬───────┬──────┐   │
//!   │   │pad │ root │pad │ prologue │ block 1 │ block 2 │  ...  │ epi- │   │
//!   │   │    │ cell │    │ sentinel │         │         │       │logue │   │
//!   │   └────┴──────┴────┴──────────┴─────────┴─────────┴───────┴──────┘   │
//!   │          │                                                    ▲      │
//!   │          │ offset of first free block                grows ───┘      │
//!   │          ▼ (0 = list empty)                          upward only     │
//!   │        free list threads through free payloads                       │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every block carries its size and state at both ends:
//!
//! ```text
//!   Allocated block:                     Free block:
//!   ┌────────┬─────────────┬────────┐    ┌────────┬──────┬──────┬───┬────────┐
//!   │ header │   payload   │ footer │    │ header │ prev │ next │...│ footer │
//!   │ size|a │             │ size|a │    │ size|f │ i32  │ i32  │   │ size|f │
//!   └────────┴─────────────┴────────┘    └────────┴──────┴──────┴───┴────────┘
//!            ▲                                    ▲
//!            └── 8-aligned pointer                └── links are signed byte
//!                returned to the caller               offsets from the cell
//!                                                     holding them
//! ```
//!
//! The boundary tags make both physical neighbours reachable by pure
//! address arithmetic, which is what lets freed blocks merge with their
//! neighbours (coalescing) in constant time. The free list is LIFO: the
//! most recently freed or split-off block is tried first.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macro and layout constants
//!   ├── header     - Packed boundary-tag codec (size + flag bits)
//!   ├── block      - Bounds-aware view over one block
//!   ├── heap       - Growth primitive (sbrk or bounded arena)
//!   ├── list       - Offset-encoded intrusive free list
//!   ├── fit        - First-fit / next-fit / best-fit strategies
//!   ├── explicit   - The allocator itself
//!   └── check      - Advisory heap consistency checker
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{ArenaHeap, ExplicitAllocator};
//!
//! // A deterministic 64 KiB arena; use SbrkHeap for the real heap.
//! let mut allocator = ExplicitAllocator::new(ArenaHeap::new(64 * 1024)).unwrap();
//!
//! unsafe {
//!     let ptr = allocator.allocate(100);
//!     assert!(!ptr.is_null());
//!     ptr.write_bytes(0x42, 100);
//!
//!     let bigger = allocator.resize(ptr, 200);
//!     assert_eq!(0x42, bigger.read());
//!
//!     allocator.free(bigger);
//! }
//!
//! assert!(allocator.check(false).is_clean());
//! ```
//!
//! ## Features
//!
//! - **Boundary tags**: traversal in both directions, no external metadata
//! - **Offset-encoded free list**: 4-byte links instead of 8-byte pointers,
//!   keeping the minimum block at 16 bytes
//! - **Immediate coalescing**: no two adjacent free blocks ever persist
//! - **Pluggable fit strategy**: first, next (rover) or best fit per instance
//! - **Advisory checker**: full structural scan on demand, reports via `log`
//!
//! ## Limitations
//!
//! - **Single-threaded only**: wrap the whole allocator in a mutex if you
//!   must share it; there is no internal locking to rely on
//! - **Monotonic heap**: memory is reused in place but never returned to
//!   the growth primitive
//! - **No in-place shrink**: resizing down keeps the block's full span
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Allocation, deallocation and resizing require `unsafe` blocks; the
//! checker and constructors are safe.

pub mod align;
pub mod block;
pub mod check;
pub mod explicit;
pub mod fit;
pub mod header;
pub mod heap;
pub mod list;

pub use check::{CheckReport, Corruption};
pub use explicit::ExplicitAllocator;
pub use fit::FitStrategy;
pub use heap::{AllocError, ArenaHeap, GrowHeap, SbrkHeap};
