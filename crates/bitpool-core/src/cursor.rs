use core::ptr;

use bitpool_bits::Word;

use crate::layout::Span;

/// Index reported while the cursor is finished. Deliberately compares
/// greater than every live chunk index.
pub const FINISHED: usize = usize::MAX;

/// Rover over the bitmap words of the live chunks.
///
/// Walks one chunk's bitmap from the word adjacent to the slot base
/// downwards in memory (slot addresses count up while the word address
/// counts down), then re-seats on the next registry entry. A null `curr`
/// is the finished state; `word()` must never be dereferenced once
/// `finished()` reports true.
pub struct Cursor {
  index: usize,
  curr: *mut Word,
  last: *mut Word,
}

impl Cursor {
  pub const fn new() -> Self {
    Self {
      index: FINISHED,
      curr: ptr::null_mut(),
      last: ptr::null_mut(),
    }
  }

  pub fn finished(&self) -> bool {
    self.curr.is_null()
  }

  pub fn finish(&mut self) {
    self.index = FINISHED;
    self.curr = ptr::null_mut();
    self.last = ptr::null_mut();
  }

  pub fn index(&self) -> usize {
    self.index
  }

  /// The word under the cursor. Only dereferenceable while not finished.
  pub fn word(&self) -> *mut Word {
    self.curr
  }

  /// Seats the cursor on the first bitmap word of chunk `index`.
  pub fn reset(&mut self, spans: &[Span], index: usize, slot_size: usize) {
    debug_assert!(index < spans.len());

    let span = &spans[index];
    self.index = index;
    self.curr = unsafe { span.bitmap_word(0) };
    self.last = unsafe { span.bitmap_word(span.words(slot_size) - 1) };
  }

  /// Steps to the next bitmap word, crossing into the next chunk when the
  /// current one is exhausted and finishing past the last chunk.
  pub fn advance(&mut self, spans: &[Span], slot_size: usize) {
    debug_assert!(!self.finished());

    if self.curr == self.last {
      let next = self.index + 1;
      if next == spans.len() {
        self.finish();
      } else {
        self.reset(spans, next, slot_size);
      }
    } else {
      self.curr = unsafe { self.curr.sub(1) };
    }
  }

  /// Bit offset from the current chunk's first slot of the slots governed
  /// by the cursor word.
  pub fn offset(&self, spans: &[Span]) -> usize {
    debug_assert!(!self.finished());
    spans[self.index].word_offset(self.curr)
  }
}
