#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod classes;
pub mod cursor;
pub mod finder;
pub mod freelist;
pub mod layout;
pub mod pool;
pub mod sync;

use bitpool_sys::SysError;

#[derive(Debug, PartialEq)]
pub enum PoolError {
  OutOfMemory,
}

impl From<SysError> for PoolError {
  fn from(_: SysError) -> Self {
    PoolError::OutOfMemory
  }
}

pub type PoolResult<T> = Result<T, PoolError>;

pub use pool::Pool;
pub use sync::set_single_threaded;

pub mod prelude {
  pub use super::{
    Pool,
    PoolError,
    PoolResult,
    classes::pool_for,
    layout::slot_size_for,
    set_single_threaded,
  };
}
