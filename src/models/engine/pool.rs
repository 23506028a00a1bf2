//! Free-list object pool for per-frame gameplay objects.

/// Objects that can be recycled through a [`Pool`].
pub trait Poolable: Default {
    /// Puts the object back into its idle state before it is stored.
    fn reset(&mut self);
}

/// A typed free list with explicit acquire/release.
///
/// Acquiring from an empty pool constructs a new object.
#[derive(Debug)]
pub struct Pool<T: Poolable> {
    free: Vec<T>,
    allocated: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            allocated: 0,
        }
    }

    /// Pre-fills the pool with `count` idle objects.
    pub fn with_capacity(count: usize) -> Self {
        let mut pool = Self::new();
        pool.free.reserve(count);
        for _ in 0..count {
            pool.free.push(T::default());
            pool.allocated += 1;
        }
        pool
    }

    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(item) => item,
            None => {
                self.allocated += 1;
                T::default()
            }
        }
    }

    pub fn release(&mut self, mut item: T) {
        item.reset();
        self.free.push(item);
    }

    /// Objects currently idle in the pool.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Objects ever constructed by this pool.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}
