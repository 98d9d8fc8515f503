use atomic::{Atomic, Ordering};
use crossbeam_utils::CachePadded;

/// Process-wide totals of outstanding strong and weak host references.
///
/// Every host reference the process creates or deletes passes through these,
/// not only bridge-pass traffic, so the two cells are padded to keep unrelated
/// threads off the same cache line. The values are diagnostics and threshold
/// inputs; no memory ordering is implied between them and the references they
/// count.
pub struct RefCounters {
    strong: CachePadded<Atomic<isize>>,
    weak: CachePadded<Atomic<isize>>,
}

impl RefCounters {
    pub fn new() -> Self {
        Self {
            strong: CachePadded::new(Atomic::new(0)),
            weak: CachePadded::new(Atomic::new(0)),
        }
    }

    /// Increments the strong count, returning the new value.
    #[inline]
    pub fn strong_inc(&self) -> isize {
        self.strong.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn strong_dec(&self) -> isize {
        self.strong.fetch_sub(1, Ordering::Relaxed) - 1
    }

    #[inline]
    pub fn weak_inc(&self) -> isize {
        self.weak.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn weak_dec(&self) -> isize {
        self.weak.fetch_sub(1, Ordering::Relaxed) - 1
    }

    #[inline]
    pub fn strong_count(&self) -> isize {
        self.strong.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn weak_count(&self) -> isize {
        self.weak.load(Ordering::Relaxed)
    }
}

impl Default for RefCounters {
    fn default() -> Self {
        Self::new()
    }
}
