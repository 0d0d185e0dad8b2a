#![cfg_attr(not(test), no_std)]

//! Bitmap-based fixed-size object allocator.
//!
//! `BitmapAlloc<T>` is a zero-sized handle onto a process-wide pool for
//! `T`'s size class. Single-object requests come out of bitmap-tracked
//! chunks with amortised O(1) allocation; anything else goes straight to
//! the raw allocator. Fully-emptied chunks are parked in a bounded
//! process-wide cache instead of being returned to the system.

use core::{
  cmp,
  fmt,
  marker::PhantomData,
  mem,
  ptr::NonNull,
};

use bitpool_core::{
  classes::pool_for,
  pool::Pool,
};
use bitpool_sys::GLOBAL_SYSTEM;

pub use bitpool_core::{
  PoolError,
  PoolResult,
  set_single_threaded,
};

pub struct BitmapAlloc<T> {
  _marker: PhantomData<T>,
}

impl<T> BitmapAlloc<T> {
  pub const fn new() -> Self {
    Self {
      _marker: PhantomData,
    }
  }

  /// The shared pool behind every handle of this size class.
  pub fn pool(&self) -> &'static Pool {
    pool_for(mem::size_of::<T>(), mem::align_of::<T>())
  }

  /// Hands out room for `n` objects.
  ///
  /// `n == 1` is the pooled fast path. Larger counts bypass the pools and
  /// go to the raw allocator; `n == 0` yields a dangling, well-aligned
  /// pointer that must not be dereferenced.
  pub fn allocate(&self, n: usize) -> PoolResult<NonNull<T>> {
    if n == 1 {
      return self.pool().allocate_one().map(NonNull::cast);
    }

    if n == 0 {
      return Ok(NonNull::dangling());
    }

    let bytes = n
      .checked_mul(mem::size_of::<T>())
      .ok_or(PoolError::OutOfMemory)?;
    Ok(unsafe { GLOBAL_SYSTEM.alloc(bytes) }?.cast())
  }

  /// Returns an allocation made by `allocate(n)`.
  ///
  /// # Safety
  ///
  /// `ptr` must come from `allocate` with the same `n` on a handle of
  /// this size class, and must not have been deallocated since.
  pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
    if n == 1 {
      unsafe { self.pool().deallocate_one(ptr.cast()) };
    } else if n > 1 {
      let _ = unsafe { GLOBAL_SYSTEM.dealloc(ptr.cast()) };
    }
  }

  pub fn max_size(&self) -> usize {
    usize::MAX / cmp::max(mem::size_of::<T>(), 1)
  }
}

impl<T> Clone for BitmapAlloc<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for BitmapAlloc<T> {}

impl<T> Default for BitmapAlloc<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for BitmapAlloc<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BitmapAlloc").finish()
  }
}

// Handles of one size class are interchangeable, so comparison ignores
// the element type entirely.
impl<T, U> PartialEq<BitmapAlloc<U>> for BitmapAlloc<T> {
  fn eq(&self, _: &BitmapAlloc<U>) -> bool {
    true
  }
}

impl<T> Eq for BitmapAlloc<T> {}
