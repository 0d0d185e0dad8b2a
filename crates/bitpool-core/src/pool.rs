use core::{
  cell::UnsafeCell,
  cmp,
  ptr::NonNull,
};

use alloc::vec::Vec;

use bitpool_bits::{
  self as bits,
  WORD_BITS,
};

use crate::{
  PoolResult,
  cursor::Cursor,
  finder,
  freelist::FREE_LIST,
  layout::{
    self,
    Span,
  },
  sync::Lock,
};

struct State {
  spans: Vec<Span>,
  cursor: Cursor,
  last_dealloc: usize,
  grow: usize,
}

/// One allocator instance for a single slot size class.
///
/// Serves one slot per call out of bitmap-tracked chunks. Chunk sizes
/// double with every refill; a chunk whose last slot is returned leaves
/// the registry and is donated to the process-wide free list. Everything
/// behind `state` is guarded by the instance lock, which is always taken
/// before the free-list lock and never the other way around.
pub struct Pool {
  slot_size: usize,
  lock: Lock,
  state: UnsafeCell<State>,
}

unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

impl Pool {
  pub const fn new(slot_size: usize) -> Self {
    Self {
      slot_size,
      lock: Lock::new(),
      state: UnsafeCell::new(State {
        spans: Vec::new(),
        cursor: Cursor::new(),
        last_dealloc: 0,
        grow: WORD_BITS,
      }),
    }
  }

  pub const fn slot_size(&self) -> usize {
    self.slot_size
  }

  pub fn chunks(&self) -> usize {
    let _guard = self.lock.acquire();
    unsafe { &*self.state.get() }.spans.len()
  }

  pub fn owns(&self, ptr: NonNull<u8>) -> bool {
    let _guard = self.lock.acquire();
    let state = unsafe { &*self.state.get() };
    state.spans.iter().any(|span| span.contains(ptr))
  }

  /// Hands out one free slot.
  ///
  /// Fast path: resume at the cursor and skip exhausted words. Once the
  /// cursor runs off the registry, fall back to a first-fit scan, and if
  /// that also misses, grow the pool by one chunk and restart on it.
  /// Amortised O(1) along a run of allocations in one chunk.
  pub fn allocate_one(&self) -> PoolResult<NonNull<u8>> {
    let _guard = self.lock.acquire();
    let state = unsafe { &mut *self.state.get() };

    // The && short-circuit carries the cursor contract: the word under
    // the cursor is only dereferenceable while not finished.
    while !state.cursor.finished() && unsafe { *state.cursor.word() } == 0 {
      state.cursor.advance(&state.spans, self.slot_size);
    }

    if state.cursor.finished() {
      match finder::first_fit(&state.spans, self.slot_size) {
        Some(hit) => {
          let bit = bits::scan_forward(unsafe { *hit.word });
          unsafe { bits::bit_allocate(&mut *hit.word, bit) };
          state.cursor.reset(&state.spans, hit.index, self.slot_size);

          let span = state.spans[hit.index];
          let ret = unsafe { span.slot_at(hit.offset + bit as usize, self.slot_size) };
          unsafe { *span.use_count(self.slot_size) += 1 };
          return Ok(ret);
        }
        None => {
          self.refill(state)?;
          state.cursor.reset(&state.spans, state.spans.len() - 1, self.slot_size);
        }
      }
    }

    let bit = bits::scan_forward(unsafe { *state.cursor.word() });
    unsafe { bits::bit_allocate(&mut *state.cursor.word(), bit) };

    let span = state.spans[state.cursor.index()];
    let offset = state.cursor.offset(&state.spans);
    let ret = unsafe { span.slot_at(offset + bit as usize, self.slot_size) };
    unsafe { *span.use_count(self.slot_size) += 1 };
    Ok(ret)
  }

  /// Returns one slot to its chunk.
  ///
  /// The chunk is located through the last-dealloc hint first, then by a
  /// linear registry scan. A chunk left with no used slots is unlinked
  /// and donated to the free list, halving the growth target.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by `allocate_one` on this pool and not
  /// deallocated since.
  pub unsafe fn deallocate_one(&self, ptr: NonNull<u8>) {
    let _guard = self.lock.acquire();
    let state = unsafe { &mut *self.state.get() };

    let index = if state
      .spans
      .get(state.last_dealloc)
      .is_some_and(|span| span.contains(ptr))
    {
      state.last_dealloc
    } else {
      match state.spans.iter().position(|span| span.contains(ptr)) {
        Some(found) => {
          state.last_dealloc = found;
          found
        }
        None => {
          debug_assert!(false, "deallocate_one: pointer not owned by this pool");
          return;
        }
      }
    };

    let span = state.spans[index];
    let slot = span.slot_index(ptr, self.slot_size);
    let word = unsafe { span.bitmap_word(slot / WORD_BITS) };
    unsafe { bits::bit_free(&mut *word, (slot % WORD_BITS) as u32) };

    let use_count = unsafe { span.use_count(self.slot_size) };
    debug_assert!(unsafe { *use_count } > 0, "deallocate_one: double free");
    unsafe { *use_count -= 1 };

    if unsafe { *use_count } == 0 {
      state.grow = cmp::max(state.grow / 2, WORD_BITS);

      // The head word doubles as the size tag while the region sits in
      // the cache; `format` zeroes it again on reuse.
      unsafe { *use_count = span.region_bytes(self.slot_size) };
      unsafe { FREE_LIST.insert(NonNull::new_unchecked(use_count)) };
      state.spans.remove(index);

      // A finished cursor reports usize::MAX here, so it is re-seated
      // (or kept finished) exactly like one parked at or past the
      // erased chunk.
      if state.cursor.index() >= index {
        if index == 0 {
          state.cursor.finish();
        } else {
          state.cursor.reset(&state.spans, index - 1, self.slot_size);
        }
      }

      if state.last_dealloc >= state.spans.len() {
        state.last_dealloc = if index == 0 { 0 } else { index - 1 };
      }
    }
  }

  fn refill(&self, state: &mut State) -> PoolResult<()> {
    debug_assert!(finder::first_fit(&state.spans, self.slot_size).is_none());

    let slots = state.grow;
    let bytes = layout::region_bytes(slots, self.slot_size);

    let region = FREE_LIST.get(bytes)?;
    let span = unsafe { layout::format(region, slots, self.slot_size) };

    state.spans.push(span);
    state.grow = slots * 2;
    Ok(())
  }
}
