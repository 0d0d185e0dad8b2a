use core::{
  cell::UnsafeCell,
  ptr::NonNull,
};

use alloc::vec::Vec;

use bitpool_bits::Word;
use bitpool_sys::GLOBAL_SYSTEM;

use crate::{
  PoolResult,
  sync::Lock,
};

pub const CACHE_CAPACITY: usize = 64;
pub const MAX_WASTAGE_PERCENT: usize = 36;

/// Process-wide bounded cache of fully-empty chunk regions.
///
/// Entries point at a region's head word, which holds the region's total
/// byte size for as long as the region sits in the cache (the pool zeroes
/// it again when the region is reborn as a chunk). The vector is kept
/// sorted ascending on that stored size; overflow evicts whichever of the
/// newcomer and the largest entry loses the comparison.
pub struct FreeList {
  lock: Lock,
  entries: UnsafeCell<Vec<NonNull<Word>>>,
}

unsafe impl Send for FreeList {}
unsafe impl Sync for FreeList {}

pub static FREE_LIST: FreeList = FreeList::new();

impl FreeList {
  pub const fn new() -> Self {
    Self {
      lock: Lock::new(),
      entries: UnsafeCell::new(Vec::new()),
    }
  }

  fn should_give(block: usize, required: usize) -> bool {
    block >= required && (block - required) * 100 / block < MAX_WASTAGE_PERCENT
  }

  /// Donates an empty region to the cache, or straight to the raw
  /// allocator when the cache is full of smaller regions.
  ///
  /// # Safety
  ///
  /// `addr` must point at the size-tagged head word of a region acquired
  /// through `get`, with no live references into the region.
  pub unsafe fn insert(&self, addr: NonNull<Word>) {
    let _guard = self.lock.acquire();
    let entries = unsafe { &mut *self.entries.get() };

    if entries.len() >= CACHE_CAPACITY {
      if let Some(&back) = entries.last() {
        if unsafe { *addr.as_ptr() >= *back.as_ptr() } {
          let _ = unsafe { GLOBAL_SYSTEM.dealloc(addr.cast()) };
          return;
        }

        let _ = unsafe { GLOBAL_SYSTEM.dealloc(back.cast()) };
        entries.pop();
      }
    }

    let key = unsafe { *addr.as_ptr() };
    let at = entries.partition_point(|entry| unsafe { *entry.as_ptr() } < key);
    entries.insert(at, addr);
  }

  /// Hands out a cached region of at least `required` bytes if one exists
  /// and wastes less than `MAX_WASTAGE_PERCENT` of itself, else asks the
  /// raw allocator for exactly `required` bytes.
  pub fn get(&self, required: usize) -> PoolResult<NonNull<u8>> {
    let _guard = self.lock.acquire();
    let entries = unsafe { &mut *self.entries.get() };

    let at = entries.partition_point(|entry| unsafe { *entry.as_ptr() } < required);
    if at < entries.len() {
      let candidate = entries[at];
      let block = unsafe { *candidate.as_ptr() };
      if Self::should_give(block, required) {
        entries.remove(at);
        return Ok(candidate.cast());
      }
    }

    Ok(unsafe { GLOBAL_SYSTEM.alloc(required) }?)
  }

  /// Drains the cache, releasing every region to the raw allocator.
  pub fn clear(&self) {
    let _guard = self.lock.acquire();
    let entries = unsafe { &mut *self.entries.get() };

    for entry in entries.drain(..) {
      let _ = unsafe { GLOBAL_SYSTEM.dealloc(entry.cast()) };
    }
  }

  pub fn len(&self) -> usize {
    let _guard = self.lock.acquire();
    unsafe { &*self.entries.get() }.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  #[cfg(test)]
  fn keys(&self) -> Vec<Word> {
    let _guard = self.lock.acquire();
    let entries = unsafe { &*self.entries.get() };
    entries.iter().map(|entry| unsafe { *entry.as_ptr() }).collect()
  }
}
