use conllx::graph::{Node, Sentence};

use crate::{DataError, TagSet};

/// Data types that collect information from training sentences.
pub trait Collector {
    fn collect(&mut self, sentence: &Sentence) -> Result<(), DataError>;
}

/// Collector that builds the tag set of a corpus.
///
/// Tags are numbered in the order in which they are first seen.
#[derive(Debug, Default)]
pub struct TagCollector {
    tags: TagSet,
}

impl TagCollector {
    /// Construct a collector that extends an existing tag set.
    pub fn new(tags: TagSet) -> Self {
        TagCollector { tags }
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn into_tags(self) -> TagSet {
        self.tags
    }
}

impl Collector for TagCollector {
    fn collect(&mut self, sentence: &Sentence) -> Result<(), DataError> {
        for token in sentence.iter().filter_map(Node::token) {
            let tag = token.pos().ok_or_else(|| DataError::MissingTag {
                form: token.form().to_owned(),
            })?;
            self.tags.add(tag);
        }

        Ok(())
    }
}
