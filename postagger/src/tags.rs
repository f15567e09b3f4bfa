use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

/// Numberer for part-of-speech tags.
///
/// Tags are numbered densely from zero, so that a tag number is also the
/// index of the tag in a score vector.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TagSet {
    tags: Vec<String>,
    numbers: HashMap<String, usize>,
}

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Add a tag. If the tag was added before, its existing number is
    /// returned.
    pub fn add(&mut self, tag: &str) -> usize {
        let next = self.tags.len();
        match self.numbers.entry(tag.to_owned()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                self.tags.push(e.key().clone());
                e.insert(next);
                next
            }
        }
    }

    /// Return the number of a tag.
    pub fn number(&self, tag: &str) -> Option<usize> {
        self.numbers.get(tag).cloned()
    }

    /// Return the tag with the given number.
    pub fn value(&self, number: usize) -> Option<&str> {
        self.tags.get(number).map(String::as_str)
    }

    /// Iterate over the tags in numbering order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}
