//! Growable ring buffer.
//!
//! Used by the diagnostic graph dump for breadth-first traversal.

use crate::error::{FlowError, Result};

const INITIAL_CAPACITY: usize = 10;

/// A double-ended queue backed by a ring buffer that doubles when full.
#[derive(Debug, Clone)]
pub struct Deque<T> {
    data: Vec<Option<T>>,
    start: usize,
    len: usize,
}

impl<T> Deque<T> {
    /// Create an empty deque.
    pub fn new() -> Self {
        Self {
            data: (0..INITIAL_CAPACITY).map(|_| None).collect(),
            start: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot count. Grows by doubling.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn push_back(&mut self, value: T) {
        if self.len == self.data.len() {
            self.grow();
        }
        let i = self.physical(self.len);
        self.data[i] = Some(value);
        self.len += 1;
    }

    pub fn push_front(&mut self, value: T) {
        if self.len == self.data.len() {
            self.grow();
        }
        self.start = (self.start + self.data.len() - 1) % self.data.len();
        self.data[self.start] = Some(value);
        self.len += 1;
    }

    pub fn pop_back(&mut self) -> Result<T> {
        if self.len == 0 {
            return Err(FlowError::Empty { collection: "deque" });
        }
        let i = self.physical(self.len - 1);
        self.len -= 1;
        self.data[i].take().ok_or(FlowError::Empty { collection: "deque" })
    }

    pub fn pop_front(&mut self) -> Result<T> {
        if self.len == 0 {
            return Err(FlowError::Empty { collection: "deque" });
        }
        let i = self.start;
        self.start = (self.start + 1) % self.data.len();
        self.len -= 1;
        self.data[i].take().ok_or(FlowError::Empty { collection: "deque" })
    }

    pub fn front(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.data[self.start].as_ref()
    }

    pub fn back(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.data[self.physical(self.len - 1)].as_ref()
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.data[self.physical(i)].as_ref())
    }

    fn physical(&self, logical: usize) -> usize {
        (self.start + logical) % self.data.len()
    }

    fn grow(&mut self) {
        let capacity = self.data.len() * 2;
        let mut data: Vec<Option<T>> = Vec::with_capacity(capacity);
        for i in 0..self.len {
            let slot = self.physical(i);
            data.push(self.data[slot].take());
        }
        data.resize_with(capacity, || None);
        self.data = data;
        self.start = 0;
    }
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}
