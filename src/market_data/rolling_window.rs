use std::collections::VecDeque;

/// Fixed-capacity, insertion-ordered buffer.
///
/// Pushing into a full window evicts the oldest element, so `len()` never
/// exceeds `capacity()`. [`drain`](Self::drain) hands the whole content to the
/// caller and leaves the window empty; no overlap survives a drain.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted element if the window was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Take every element (oldest first) and reset to empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
