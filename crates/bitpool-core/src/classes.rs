use alloc::{
  boxed::Box,
  vec::Vec,
};

use spin::Mutex;

use crate::{
  layout,
  pool::Pool,
};

static POOLS: Mutex<Vec<(usize, &'static Pool)>> = Mutex::new(Vec::new());

/// Process-wide pool for a `(size, align)` class. Every caller asking for
/// the same padded slot size shares one instance, which is what makes all
/// handles of a size class interchangeable.
pub fn pool_for(size: usize, align: usize) -> &'static Pool {
  let slot_size = layout::slot_size_for(size, align);
  let mut table = POOLS.lock();

  if let Some(&(_, pool)) = table.iter().find(|(slot, _)| *slot == slot_size) {
    return pool;
  }

  let pool: &'static Pool = Box::leak(Box::new(Pool::new(slot_size)));
  table.push((slot_size, pool));
  pool
}
