//! Routing tables: pattern key to the descriptors registered under it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::HandlerDescriptor;
use crate::pattern::Pattern;

/// Descriptors sharing one pattern.
#[derive(Debug)]
pub struct Bucket {
    pattern: Pattern,
    descriptors: Vec<Arc<HandlerDescriptor>>,
}

impl Bucket {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[Arc<HandlerDescriptor>] {
        &self.descriptors
    }
}

/// Ordered mapping from pattern to descriptors.
///
/// Buckets keep the order in which their patterns were first seen, and each
/// bucket keeps the order in which its descriptors were inserted. Identical
/// registrations are not merged: each occupies its own entry.
#[derive(Debug, Default)]
pub struct RoutingTable {
    buckets: Vec<Bucket>,
    index: HashMap<String, usize>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, descriptor: Arc<HandlerDescriptor>) {
        let key = descriptor.pattern().key();
        match self.index.get(key) {
            Some(&i) => self.buckets[i].descriptors.push(descriptor),
            None => {
                self.index.insert(key.to_owned(), self.buckets.len());
                self.buckets.push(Bucket {
                    pattern: descriptor.pattern().clone(),
                    descriptors: vec![descriptor],
                });
            }
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Descriptors registered under the pattern `key`.
    pub fn get(&self, key: &str) -> Option<&[Arc<HandlerDescriptor>]> {
        self.index
            .get(key)
            .map(|&i| self.buckets[i].descriptors.as_slice())
    }

    /// Every descriptor, bucket by bucket.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<HandlerDescriptor>> {
        self.buckets.iter().flat_map(|b| b.descriptors.iter())
    }

    /// Total number of descriptors.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.descriptors.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
