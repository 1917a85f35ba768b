use std::fmt;

use bitflags::bitflags;

use crate::align::DSIZE;

bitflags! {
  /// Flag bits packed into the low bits of a boundary tag. The size mask
  /// keeps these bits free because block sizes are multiples of 8.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct HeaderFlags: u32 {
    /// Block is currently handed out to a caller.
    const ALLOCATED = 0b001;
    /// Block must not be absorbed by coalescing yet.
    const PINNED = 0b010;
  }
}

/// A packed boundary tag: block size in the high bits, [`HeaderFlags`] in
/// the low three. Written at both ends of a block so neighbours can be
/// reached in either direction without external metadata.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Header(u32);

const SIZE_MASK: u32 = !(DSIZE as u32 - 1);

impl Header {
  pub fn pack(size: usize, flags: HeaderFlags) -> Self {
    debug_assert_eq!(0, size % DSIZE, "block size must be 8-byte aligned");
    Self((size as u32 & SIZE_MASK) | flags.bits())
  }

  pub fn from_word(word: u32) -> Self {
    Self(word)
  }

  pub fn word(self) -> u32 {
    self.0
  }

  /// Full block size in bytes, header and footer included.
  pub fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub fn flags(self) -> HeaderFlags {
    HeaderFlags::from_bits_truncate(self.0 & !SIZE_MASK)
  }

  pub fn is_allocated(self) -> bool {
    self.flags().contains(HeaderFlags::ALLOCATED)
  }

  pub fn is_pinned(self) -> bool {
    self.flags().contains(HeaderFlags::PINNED)
  }

  /// Same size and pin state, allocation bit set.
  pub fn allocated(self) -> Self {
    Self::pack(self.size(), self.flags() | HeaderFlags::ALLOCATED)
  }

  /// Same size and pin state, allocation bit cleared.
  pub fn freed(self) -> Self {
    Self::pack(self.size(), self.flags() - HeaderFlags::ALLOCATED)
  }

  pub fn pinned(self) -> Self {
    Self::pack(self.size(), self.flags() | HeaderFlags::PINNED)
  }

  pub fn unpinned(self) -> Self {
    Self::pack(self.size(), self.flags() - HeaderFlags::PINNED)
  }
}

impl fmt::Debug for Header {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Header[{}:{}{}]",
      self.size(),
      if self.is_allocated() { 'a' } else { 'f' },
      if self.is_pinned() { "+p" } else { "" },
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pack_round_trip() {
    let header = Header::pack(4096, HeaderFlags::ALLOCATED);
    assert_eq!(4096, header.size());
    assert!(header.is_allocated());
    assert!(!header.is_pinned());
  }

  #[test]
  fn test_size_masks_flag_bits() {
    let header = Header::pack(24, HeaderFlags::ALLOCATED | HeaderFlags::PINNED);
    assert_eq!(24, header.size());
    assert_eq!(24 | 0b011, header.word());
  }

  #[test]
  fn test_free_and_allocate_preserve_size() {
    let header = Header::pack(64, HeaderFlags::empty());
    assert!(!header.is_allocated());
    assert!(header.allocated().is_allocated());
    assert_eq!(64, header.allocated().size());
    assert_eq!(header, header.allocated().freed());
  }

  #[test]
  fn test_pin_round_trip() {
    let header = Header::pack(32, HeaderFlags::ALLOCATED);
    assert!(header.pinned().is_pinned());
    assert!(header.pinned().is_allocated());
    assert_eq!(header, header.pinned().unpinned());
  }

  #[test]
  fn test_zero_size_epilogue() {
    let epilogue = Header::pack(0, HeaderFlags::ALLOCATED);
    assert_eq!(0, epilogue.size());
    assert!(epilogue.is_allocated());
  }
}
