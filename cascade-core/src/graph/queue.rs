//! Unique Min Queue
//!
//! A binary min-heap ordered by a caller-supplied rank. A value that is
//! already queued is not inserted a second time, which lets graph walks push
//! a node once per pass no matter how many edges lead to it.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{FlowError, Result};

/// Min-heap with duplicate suppression.
pub struct UniqueMinQueue<T, F>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> i64,
{
    rank: F,
    heap: Vec<T>,
    members: HashSet<T>,
}

impl<T, F> UniqueMinQueue<T, F>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> i64,
{
    /// Create an empty queue ranked by `rank` (smallest pops first).
    pub fn new(rank: F) -> Self {
        Self {
            rank,
            heap: Vec::new(),
            members: HashSet::new(),
        }
    }

    /// Insert `value`. Returns `false` if it was already queued.
    pub fn push(&mut self, value: T) -> bool {
        if !self.members.insert(value.clone()) {
            return false;
        }
        self.heap.push(value);
        self.bubble_up(self.heap.len() - 1);
        true
    }

    /// Remove and return the lowest-ranked value.
    pub fn pop(&mut self) -> Result<T> {
        if self.heap.is_empty() {
            return Err(FlowError::Empty {
                collection: "queue",
            });
        }
        let result = self.heap.swap_remove(0);
        self.members.remove(&result);
        if !self.heap.is_empty() {
            self.bubble_down(0);
        }
        Ok(result)
    }

    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn rank_at(&self, index: usize) -> i64 {
        (self.rank)(&self.heap[index])
    }

    fn bubble_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.rank_at(parent) <= self.rank_at(index) {
                break;
            }
            self.heap.swap(parent, index);
            index = parent;
        }
    }

    fn bubble_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = index * 2 + 1;
            let right = index * 2 + 2;
            let mut next = index;
            if left < len && self.rank_at(left) < self.rank_at(next) {
                next = left;
            }
            if right < len && self.rank_at(right) < self.rank_at(next) {
                next = right;
            }
            if next == index {
                break;
            }
            self.heap.swap(index, next);
            index = next;
        }
    }
}
