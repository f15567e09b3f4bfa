use std::borrow::Cow;
use std::fmt;

use ndarray::{Array1, ArrayView1};

use crate::{ConfigError, LexiconError};

/// Embedding provider slots.
///
/// The lexicon has a fixed set of slots, each of which is either bound to
/// an embedding provider or unbound for the whole run. Feature vectors
/// always contain the bound providers in the order of `Provider::ALL`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Provider {
    /// Word embeddings (word2vec-style).
    Word2Vec,

    /// Word embeddings with subword units (fastText-style).
    FastText,

    /// Ambiguity class embeddings.
    AmbiguityClass,
}

impl Provider {
    pub const ALL: [Provider; 3] = [
        Provider::Word2Vec,
        Provider::FastText,
        Provider::AmbiguityClass,
    ];

    fn slot(self) -> usize {
        match self {
            Provider::Word2Vec => 0,
            Provider::FastText => 1,
            Provider::AmbiguityClass => 2,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Provider::Word2Vec => "word2vec",
            Provider::FastText => "fastText",
            Provider::AmbiguityClass => "ambiguity class",
        };

        f.write_str(name)
    }
}

/// Source of fixed-width token embeddings.
///
/// Lookups must be deterministic: the same word always maps to the same
/// vector, and every vector has `dims()` components. Words that are not
/// known to the provider map to a provider-specific unknown vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Width of the embeddings.
    fn dims(&self) -> usize;

    /// Look up the embedding of a word.
    fn embedding(&self, word: &str) -> Cow<[f32]>;
}

/// Embedding lexicon.
///
/// The lexicon bundles the embedding providers with the tag placeholder
/// vector. The placeholder is a zero vector with one component per tag.
/// It has two roles that both require the width of a score vector: it is
/// the score vector of a token that was not tagged yet, and it stands in
/// for the scores of positions outside the sentence.
pub struct Lexicon {
    providers: [Option<Box<dyn EmbeddingProvider>>; 3],
    tag_zeros: Array1<f32>,
    zeros: Vec<f32>,
}

impl Lexicon {
    /// Construct a lexicon without embedding providers for `n_tags` tags.
    pub fn new(n_tags: usize) -> Result<Self, ConfigError> {
        if n_tags == 0 {
            return Err(ConfigError::EmptyTagSet);
        }

        Ok(Lexicon {
            providers: [None, None, None],
            tag_zeros: Array1::zeros(n_tags),
            zeros: Vec::new(),
        })
    }

    /// Bind an embedding provider to a slot.
    ///
    /// A provider that was previously bound to the slot is replaced.
    pub fn with_provider(
        mut self,
        provider: Provider,
        embeddings: Box<dyn EmbeddingProvider>,
    ) -> Result<Self, ConfigError> {
        let dims = embeddings.dims();
        if dims == 0 {
            return Err(ConfigError::ZeroDims(provider));
        }

        if dims > self.zeros.len() {
            self.zeros.resize(dims, 0.);
        }

        self.providers[provider.slot()] = Some(embeddings);

        Ok(self)
    }

    /// Check whether a provider slot is bound.
    pub fn has_provider(&self, provider: Provider) -> bool {
        self.providers[provider.slot()].is_some()
    }

    /// The bound provider slots, in feature order.
    pub fn providers<'a>(&'a self) -> impl Iterator<Item = Provider> + 'a {
        Provider::ALL
            .iter()
            .cloned()
            .filter(move |&provider| self.has_provider(provider))
    }

    /// Embedding width of a provider, `None` if the slot is unbound.
    pub fn dims(&self, provider: Provider) -> Option<usize> {
        self.providers[provider.slot()]
            .as_ref()
            .map(|embeddings| embeddings.dims())
    }

    /// Sum of the widths of all bound providers.
    pub fn embedding_dims(&self) -> usize {
        self.providers
            .iter()
            .flatten()
            .map(|embeddings| embeddings.dims())
            .sum()
    }

    /// Look up the embedding of a word.
    ///
    /// If `word` is `None`, the position is outside the sentence and a zero
    /// vector of the provider's width is returned.
    pub fn embedding(
        &self,
        provider: Provider,
        word: Option<&str>,
    ) -> Result<Cow<[f32]>, LexiconError> {
        let embeddings = self.providers[provider.slot()]
            .as_ref()
            .ok_or(LexiconError::UnboundProvider(provider))?;

        Ok(match word {
            Some(word) => embeddings.embedding(word),
            None => Cow::Borrowed(&self.zeros[..embeddings.dims()]),
        })
    }

    /// Number of tags, which is the width of a score vector.
    pub fn n_tags(&self) -> usize {
        self.tag_zeros.len()
    }

    /// The tag placeholder vector.
    pub fn tag_zeros(&self) -> ArrayView1<f32> {
        self.tag_zeros.view()
    }
}
