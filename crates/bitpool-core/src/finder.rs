use bitpool_bits::{
  WORD_BITS,
  Word,
};

use crate::layout::Span;

/// A chunk with at least one free slot, located by `first_fit`.
pub struct Hit {
  pub index: usize,
  pub word: *mut Word,
  pub offset: usize,
}

/// Scans the registry in order for the first chunk with a free slot.
///
/// A chunk whose use-count says it is full is skipped without touching its
/// bitmap. Within a chunk, words are scanned from the slot-base-adjacent
/// word outward, so the lowest-address free slot group wins.
pub fn first_fit(spans: &[Span], slot_size: usize) -> Option<Hit> {
  for (index, span) in spans.iter().enumerate() {
    if unsafe { *span.use_count(slot_size) } == span.slots(slot_size) {
      continue;
    }

    for k in 0..span.words(slot_size) {
      let word = unsafe { span.bitmap_word(k) };
      if unsafe { *word } != 0 {
        return Some(Hit {
          index,
          word,
          offset: k * WORD_BITS,
        });
      }
    }
  }

  None
}
