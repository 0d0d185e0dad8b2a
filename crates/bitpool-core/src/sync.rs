use spin::{
  Mutex,
  MutexGuard,
  Once,
};

static MODE: Once<bool> = Once::new();

/// Opts the process out of locking. Must run before the first pool or
/// free-list operation; once any lock has been taken the mode is sealed
/// and this call has no effect.
///
/// # Safety
///
/// The caller vouches that the process never touches a pool from more
/// than one thread.
pub unsafe fn set_single_threaded() {
  MODE.call_once(|| false);
}

pub(crate) fn threads_enabled() -> bool {
  *MODE.call_once(|| true)
}

/// Mutex honouring the process-wide thread mode: acquisition is a no-op
/// once `set_single_threaded` has sealed the mode to off.
pub struct Lock {
  inner: Mutex<()>,
}

pub struct LockGuard<'lock> {
  _guard: Option<MutexGuard<'lock, ()>>,
}

impl Lock {
  pub const fn new() -> Self {
    Self {
      inner: Mutex::new(()),
    }
  }

  pub fn acquire(&self) -> LockGuard<'_> {
    let guard = threads_enabled().then(|| self.inner.lock());
    LockGuard { _guard: guard }
  }
}
