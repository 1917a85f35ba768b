use crate::align::{DSIZE, WSIZE};
use crate::header::Header;
use crate::heap::Region;

/// View over one block, addressed by its payload pointer. All boundary-tag
/// arithmetic funnels through here so the rest of the crate never touches
/// raw byte offsets.
///
/// Layout, sizes in bytes:
///
/// ```text
///   header (4) | payload (size - 8) | footer (4)
///              ^
///              Block address = payload address, 8-aligned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block(*mut u8);

impl Block {
  /// Wraps a payload pointer without validation. For internal use where
  /// the address was derived from an already-trusted block.
  pub fn from_payload_unchecked(payload: *mut u8) -> Self {
    Self(payload)
  }

  /// Wraps a caller-supplied payload pointer, validating alignment and
  /// that the block's header lies inside the tracked heap extent.
  pub fn from_payload(payload: *mut u8, region: &Region) -> Option<Self> {
    if payload.is_null() || payload as usize % DSIZE != 0 {
      return None;
    }
    if !region.contains(unsafe { payload.sub(WSIZE) }) {
      return None;
    }
    Some(Self(payload))
  }

  pub fn payload(self) -> *mut u8 {
    self.0
  }

  pub fn header_ptr(self) -> *mut u32 {
    unsafe { self.0.sub(WSIZE).cast() }
  }

  pub fn footer_ptr(self) -> *mut u32 {
    unsafe { self.0.add(self.size() - DSIZE).cast() }
  }

  pub unsafe fn header(self) -> Header {
    Header::from_word(unsafe { *self.header_ptr() })
  }

  pub unsafe fn footer(self) -> Header {
    Header::from_word(unsafe { *self.footer_ptr() })
  }

  pub fn size(self) -> usize {
    unsafe { self.header() }.size()
  }

  pub fn is_allocated(self) -> bool {
    unsafe { self.header() }.is_allocated()
  }

  /// Usable payload bytes, i.e. block size minus the two boundary tags.
  pub fn payload_size(self) -> usize {
    self.size() - DSIZE
  }

  /// Writes the header only. Used when the footer position is about to
  /// move (the size is changing) and will be rewritten separately.
  pub unsafe fn set_header(self, header: Header) {
    unsafe { *self.header_ptr() = header.word() };
  }

  /// Writes the same tag at both ends of the block. The header must
  /// already record the final size so the footer lands on the last word.
  pub unsafe fn set_tags(self, header: Header) {
    unsafe {
      *self.header_ptr() = header.word();
      *self.footer_ptr() = header.word();
    }
  }

  /// The physically following block (the epilogue counts as a block).
  pub unsafe fn next(self) -> Block {
    Block(unsafe { self.0.add(self.size()) })
  }

  /// The physically preceding block, found through its footer.
  pub unsafe fn prev(self) -> Block {
    let prev_size = Header::from_word(unsafe { *self.0.sub(DSIZE).cast::<u32>() }).size();
    Block(unsafe { self.0.sub(prev_size) })
  }

  /// Header of the physically preceding block's footer, without forming a
  /// possibly out-of-range payload pointer first.
  pub unsafe fn prev_footer(self) -> Header {
    Header::from_word(unsafe { *self.0.sub(DSIZE).cast::<u32>() })
  }
}
