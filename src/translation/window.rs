/*!
 * Rolling context window of recent translations.
 *
 * The window is a fixed-capacity ring buffer: committing a pair beyond
 * capacity evicts the oldest one. Batches see a snapshot taken when they
 * are dispatched.
 */

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A source text and the translation that was accepted for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPair {
    pub source: String,
    pub target: String,
}

impl ContextPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// The last `capacity` translated pairs of a job
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    capacity: usize,
    pairs: VecDeque<ContextPair>,
}

impl ContextWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pairs: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Append a pair, evicting the oldest when full
    pub fn push(&mut self, pair: ContextPair) {
        if self.capacity == 0 {
            return;
        }
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back(pair);
    }

    pub fn extend(&mut self, pairs: impl IntoIterator<Item = ContextPair>) {
        for pair in pairs {
            self.push(pair);
        }
    }

    /// Pairs oldest first
    pub fn snapshot(&self) -> Vec<ContextPair> {
        self.pairs.iter().cloned().collect()
    }
}
