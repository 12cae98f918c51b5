//! Per-thread vector pool (spec §3, §4.1, §9 "vector pool"): acquiring a
//! vector of length `n` returns a pooled buffer from the nearest
//! power-of-two capacity class if one is free, otherwise allocates.
//! Release zeros the buffer and returns it to the pool. Deliberately
//! per-thread rather than a global lock-protected pool, so the thread_local
//! handle never crosses a `Send` boundary.

use std::cell::RefCell;

/// Buffers beyond this count in a single capacity class are dropped instead
/// of retained, bounding per-thread memory growth.
const MAX_BUFFERS_PER_CLASS: usize = 50;

fn capacity_class(len: usize) -> usize {
    len.next_power_of_two().max(1)
}

#[derive(Default)]
struct PoolInner {
    // indexed by log2(capacity_class); each slot holds free buffers of that class
    classes: Vec<Vec<Vec<f64>>>,
}

impl PoolInner {
    fn class_index(&self, cap: usize) -> usize {
        cap.trailing_zeros() as usize
    }

    fn acquire(&mut self, len: usize) -> Vec<f64> {
        let cap = capacity_class(len);
        let idx = self.class_index(cap);
        if idx < self.classes.len() {
            if let Some(mut buf) = self.classes[idx].pop() {
                buf.resize(len, 0.0);
                return buf;
            }
        }
        vec![0.0; len]
    }

    fn release(&mut self, mut buf: Vec<f64>) {
        let cap = capacity_class(buf.len());
        let idx = self.class_index(cap);
        if idx >= self.classes.len() {
            self.classes.resize_with(idx + 1, Vec::new);
        }
        if self.classes[idx].len() < MAX_BUFFERS_PER_CLASS {
            buf.iter_mut().for_each(|v| *v = 0.0);
            self.classes[idx].push(buf);
        }
    }
}

thread_local! {
    static POOL: RefCell<PoolInner> = RefCell::new(PoolInner::default());
}

/// An exclusively-owned buffer on loan from the thread-local pool. Returned
/// (zeroed) to the pool on drop.
pub struct PooledVec {
    buf: Option<Vec<f64>>,
}

impl PooledVec {
    pub fn acquire(len: usize) -> Self {
        let buf = POOL.with(|p| p.borrow_mut().acquire(len));
        Self { buf: Some(buf) }
    }

    pub fn as_slice(&self) -> &[f64] {
        self.buf.as_deref().expect("buffer present until drop")
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.buf.as_deref_mut().expect("buffer present until drop")
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::ops::Deref for PooledVec {
    type Target = [f64];
    fn deref(&self) -> &[f64] {
        self.as_slice()
    }
}

impl std::ops::DerefMut for PooledVec {
    fn deref_mut(&mut self) -> &mut [f64] {
        self.as_mut_slice()
    }
}

impl Drop for PooledVec {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            POOL.with(|p| p.borrow_mut().release(buf));
        }
    }
}
