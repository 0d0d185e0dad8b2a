use core::ptr::NonNull;

use bitpool_bits::{
  WORD_BITS,
  WORD_BYTES,
  Word,
};
use bitpool_sys::math::{
  align_up,
  is_aligned,
};
use getset::CloneGetters;

/// Every slot is padded to a multiple of this.
pub const SLOT_ROUND: usize = 8;

/// Padded slot size for a `(size, align)` class.
pub const fn slot_size_for(size: usize, align: usize) -> usize {
  let raw = if size > align { size } else { align };
  let raw = if raw == 0 { 1 } else { raw };
  match align_up(raw, SLOT_ROUND) {
    Some(padded) => padded,
    None => usize::MAX & !(SLOT_ROUND - 1),
  }
}

/// Total bytes of a chunk region holding `slots` slots: one use-count word,
/// `slots / WORD_BITS` bitmap words, then the slot array.
pub const fn region_bytes(slots: usize, slot_size: usize) -> usize {
  WORD_BYTES * (slots / WORD_BITS + 1) + slots * slot_size
}

/// Inclusive first/last slot addresses of one live chunk.
///
/// The region layout, from low to high address, is
/// `[use_count][bitmap words][slots]` with the bitmap in reverse memory
/// order: the word immediately below `first` covers slots `0..WORD_BITS`,
/// the next one down the following group, and so on. All pointer
/// arithmetic across the three sub-regions lives here; the other modules
/// only ever see decoded word pointers and bit positions.
#[derive(Clone, Copy, Debug, CloneGetters)]
pub struct Span {
  #[getset(get_clone = "pub")]
  first: NonNull<u8>,
  #[getset(get_clone = "pub")]
  last: NonNull<u8>,
}

impl Span {
  pub fn contains(&self, ptr: NonNull<u8>) -> bool {
    self.first <= ptr && ptr <= self.last
  }

  pub fn slots(&self, slot_size: usize) -> usize {
    (self.last.as_ptr() as usize - self.first.as_ptr() as usize) / slot_size + 1
  }

  pub fn words(&self, slot_size: usize) -> usize {
    self.slots(slot_size) / WORD_BITS
  }

  /// Slot index of a pointer inside this chunk.
  pub fn slot_index(&self, ptr: NonNull<u8>, slot_size: usize) -> usize {
    debug_assert!(self.contains(ptr));
    (ptr.as_ptr() as usize - self.first.as_ptr() as usize) / slot_size
  }

  /// Address of slot `index`.
  ///
  /// # Safety
  ///
  /// `index` must be below `self.slots(slot_size)`.
  pub unsafe fn slot_at(&self, index: usize, slot_size: usize) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(self.first.as_ptr().add(index * slot_size)) }
  }

  /// Bitmap word `k`, counting down from the slot base: word 0 governs
  /// slots `0..WORD_BITS`.
  ///
  /// # Safety
  ///
  /// `k` must be below `self.words(slot_size)` of this chunk.
  pub unsafe fn bitmap_word(&self, k: usize) -> *mut Word {
    unsafe { (self.first.as_ptr() as *mut Word).sub(k + 1) }
  }

  /// The use-count word, one word below the last bitmap word. This is also
  /// the base address of the whole region.
  ///
  /// # Safety
  ///
  /// The chunk must be live (formatted and not yet released).
  pub unsafe fn use_count(&self, slot_size: usize) -> *mut Word {
    unsafe { (self.first.as_ptr() as *mut Word).sub(self.words(slot_size) + 1) }
  }

  /// Bit offset from the first slot of the slots governed by `word`.
  /// Inverse of `bitmap_word`.
  pub fn word_offset(&self, word: *mut Word) -> usize {
    ((self.first.as_ptr() as usize - word as usize) / WORD_BYTES - 1) * WORD_BITS
  }

  pub fn region_bytes(&self, slot_size: usize) -> usize {
    region_bytes(self.slots(slot_size), slot_size)
  }
}

/// Formats a raw region into a chunk: zeroes the use-count, sets every
/// bitmap bit (1 = free), and returns the slot span.
///
/// # Safety
///
/// `region` must be word-aligned and valid for
/// `region_bytes(slots, slot_size)` bytes; `slots` must be a non-zero
/// multiple of `WORD_BITS`.
pub unsafe fn format(region: NonNull<u8>, slots: usize, slot_size: usize) -> Span {
  debug_assert!(slots > 0 && slots % WORD_BITS == 0);
  debug_assert!(is_aligned(region.as_ptr() as usize, WORD_BYTES) == Some(true));

  let words = slots / WORD_BITS;
  let head = region.as_ptr() as *mut Word;

  unsafe {
    *head = 0;
    for i in 0..words {
      *head.add(1 + i) = !0;
    }

    let first = head.add(1 + words) as *mut u8;
    let last = first.add((slots - 1) * slot_size);
    Span {
      first: NonNull::new_unchecked(first),
      last: NonNull::new_unchecked(last),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunk(slots: usize, slot_size: usize) -> (Vec<Word>, Span) {
    let words = region_bytes(slots, slot_size).div_ceil(WORD_BYTES);
    let mut backing = vec![0 as Word; words];
    let region = NonNull::new(backing.as_mut_ptr() as *mut u8).unwrap();
    let span = unsafe { format(region, slots, slot_size) };
    (backing, span)
  }

  #[test]
  fn test_slot_size_for() {
    assert_eq!(slot_size_for(1, 1), 8);
    assert_eq!(slot_size_for(8, 8), 8);
    assert_eq!(slot_size_for(9, 8), 16);
    assert_eq!(slot_size_for(4, 16), 16);
    assert_eq!(slot_size_for(24, 8), 24);
    assert_eq!(slot_size_for(0, 1), 8);
  }

  #[test]
  fn test_region_bytes() {
    let slots = WORD_BITS;
    assert_eq!(region_bytes(slots, 8), WORD_BYTES * 2 + slots * 8);

    let slots = 4 * WORD_BITS;
    assert_eq!(region_bytes(slots, 16), WORD_BYTES * 5 + slots * 16);
  }

  #[test]
  fn test_format_fresh_chunk() {
    let slots = 2 * WORD_BITS;
    let (backing, span) = chunk(slots, 8);

    assert_eq!(span.slots(8), slots);
    assert_eq!(span.words(8), 2);
    assert_eq!(backing[0], 0);
    assert_eq!(backing[1], !0);
    assert_eq!(backing[2], !0);
  }

  #[test]
  fn test_addressing_is_symmetric() {
    let slots = 2 * WORD_BITS;
    let slot_size = 16;
    let (_backing, span) = chunk(slots, slot_size);

    // Word 0 sits immediately below the slot base, word 1 below it.
    let word0 = unsafe { span.bitmap_word(0) };
    let word1 = unsafe { span.bitmap_word(1) };
    assert_eq!(word0 as usize, span.first().as_ptr() as usize - WORD_BYTES);
    assert_eq!(word1 as usize, word0 as usize - WORD_BYTES);
    assert_eq!(span.word_offset(word0), 0);
    assert_eq!(span.word_offset(word1), WORD_BITS);

    // The use-count word is the region base, below the whole bitmap.
    let use_count = unsafe { span.use_count(slot_size) };
    assert_eq!(use_count as usize, word1 as usize - WORD_BYTES);
  }

  #[test]
  fn test_slot_round_trip() {
    let slots = WORD_BITS;
    let slot_size = 24;
    let (_backing, span) = chunk(slots, slot_size);

    for index in [0, 1, WORD_BITS / 2, WORD_BITS - 1] {
      let ptr = unsafe { span.slot_at(index, slot_size) };
      assert!(span.contains(ptr));
      assert_eq!(span.slot_index(ptr, slot_size), index);
    }

    assert_eq!(unsafe { span.slot_at(0, slot_size) }, span.first());
    assert_eq!(
      unsafe { span.slot_at(slots - 1, slot_size) },
      span.last()
    );
  }

  #[test]
  fn test_contains_bounds() {
    let (_backing, span) = chunk(WORD_BITS, 8);

    assert!(span.contains(span.first()));
    assert!(span.contains(span.last()));

    let below = unsafe { NonNull::new_unchecked(span.first().as_ptr().sub(1)) };
    let above = unsafe { NonNull::new_unchecked(span.last().as_ptr().add(1)) };
    assert!(!span.contains(below));
    assert!(!span.contains(above));
  }
}
