use std::borrow::Cow;

use finalfusion::prelude::*;
use finalfusion::storage::{Storage, StorageView};
use finalfusion::vocab::{Vocab, WordIndex};
use ndarray::{Array1, Axis};

use crate::EmbeddingProvider;

/// Embedding provider backed by finalfusion embeddings.
///
/// finalfusion can read embeddings in its own format, as well as word2vec
/// and fastText files. Words that are not in the vocabulary (and cannot be
/// composed from subword units) are mapped to the normalized average of all
/// embeddings.
pub struct FinalfusionEmbeddings<V, S> {
    embeds: Embeddings<V, S>,
    unknown: Vec<f32>,
}

impl<V, S> FinalfusionEmbeddings<V, S> {
    /// Get the wrapped embeddings.
    pub fn embeddings(&self) -> &Embeddings<V, S> {
        &self.embeds
    }
}

impl<V, S> From<Embeddings<V, S>> for FinalfusionEmbeddings<V, S>
where
    V: Vocab,
    S: Storage,
{
    fn from(embeds: Embeddings<V, S>) -> Self {
        let mut unknown = Array1::zeros(embeds.dims());

        for (_, embed) in embeds.iter() {
            unknown += &embed;
        }

        let l2norm = unknown.dot(&unknown).sqrt();
        if l2norm != 0f32 {
            unknown /= l2norm;
        }

        FinalfusionEmbeddings {
            embeds,
            unknown: unknown.into_raw_vec(),
        }
    }
}

impl<V, S> EmbeddingProvider for FinalfusionEmbeddings<V, S>
where
    V: Vocab + Send + Sync,
    S: StorageView + Send + Sync,
{
    fn dims(&self) -> usize {
        self.embeds.dims()
    }

    fn embedding(&self, word: &str) -> Cow<[f32]> {
        // Vocabulary words are rows of the embedding matrix.
        if let Some(WordIndex::Word(idx)) = self.embeds.vocab().idx(word) {
            if let Some(embed) = self
                .embeds
                .storage()
                .view()
                .index_axis_move(Axis(0), idx)
                .into_slice()
            {
                return Cow::Borrowed(embed);
            }
        }

        // Subword embeddings are computed.
        match self.embeds.embedding(word) {
            Some(embed) => Cow::Owned(embed.to_vec()),
            None => Cow::Borrowed(&self.unknown),
        }
    }
}
