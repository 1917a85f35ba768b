/// Word and header/footer size in bytes.
pub const WSIZE: usize = 4;

/// Double word size in bytes; every block size is a multiple of this.
pub const DSIZE: usize = 8;

/// Smallest legal block: header + footer + room for the two free-list
/// offsets that live in a free block's payload.
pub const MIN_BLOCK: usize = 16;

/// Default heap expansion unit. Growing by at least this much amortizes
/// calls into the growth primitive.
pub const CHUNK: usize = 1 << 12;

/// Rounds the given size up to the next multiple of 8.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(0), 0);
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(8), 8);
/// assert_eq!(align!(13), 16);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::DSIZE - 1) & !($crate::align::DSIZE - 1)
  };
}

/// Adjusts a requested payload size to a full block size: payload plus
/// header/footer overhead, rounded to alignment, floored at [`MIN_BLOCK`].
///
/// `None` when overhead plus round-up would not fit in `usize`; the
/// allocator turns that into an allocation failure.
pub fn adjust_request(size: usize) -> Option<usize> {
  if size <= DSIZE {
    return Some(MIN_BLOCK);
  }
  // align!(size + DSIZE) without the wrap: one checked add covers both
  // the tag overhead and the round-up bias.
  let padded = size.checked_add(2 * DSIZE - 1)?;
  Some(padded & !(DSIZE - 1))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (DSIZE * i + 1)..=(DSIZE * (i + 1));

      let expected_alignment = DSIZE * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_adjust_request_floor() {
    for size in 1..=DSIZE {
      assert_eq!(Some(MIN_BLOCK), adjust_request(size));
    }
  }

  #[test]
  fn test_adjust_request_overhead() {
    // 9 bytes of payload + 8 bytes of tags, rounded up.
    assert_eq!(Some(24), adjust_request(9));
    assert_eq!(Some(24), adjust_request(16));
    assert_eq!(Some(32), adjust_request(17));
    assert_eq!(Some(112), adjust_request(100));
  }

  #[test]
  fn test_adjust_request_rejects_unrepresentable() {
    assert_eq!(None, adjust_request(usize::MAX));
    assert_eq!(None, adjust_request(usize::MAX - DSIZE));
    assert_eq!(None, adjust_request(usize::MAX - (2 * DSIZE - 2)));
    // The largest representable request rounds to the top block size.
    let top = usize::MAX - (2 * DSIZE - 1);
    assert_eq!(Some(usize::MAX & !(DSIZE - 1)), adjust_request(top));
  }

  #[test]
  fn test_adjusted_is_aligned() {
    for size in 1..512 {
      let adjusted = adjust_request(size).unwrap();
      assert_eq!(0, adjusted % DSIZE);
      assert!(adjusted >= MIN_BLOCK);
      assert!(adjusted >= size + DSIZE || size <= DSIZE);
    }
  }
}
