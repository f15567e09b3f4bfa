use std::borrow::{Borrow, BorrowMut};

use conllx::graph::{Node, Sentence};
use failure::Fallible;
use ndarray::{Array2, ArrayView2};

use crate::classifier::argmax;
use crate::{
    Classifier, ConfigError, DataError, FeatureAssembler, LexiconError, TagSet, TaggingState,
};

/// Trait for part-of-speech taggers.
pub trait Tag {
    fn tag_sentences(&self, sentences: &mut [impl BorrowMut<Sentence>]) -> Fallible<()>;
}

/// Greedy left-to-right tagger.
///
/// Every step assembles the features of the token under the cursor of
/// each active state, predicts a tag distribution for all of them at
/// once, and applies the most probable tag with its distribution.
pub struct Tagger<'a, C> {
    assembler: FeatureAssembler<'a>,
    classifier: C,
    tags: TagSet,
}

impl<'a, C> Tagger<'a, C>
where
    C: Classifier,
{
    /// Construct a tagger.
    ///
    /// Fails if the feature vectors of the assembler do not fit the
    /// classifier (both in length and in their split into per-offset
    /// groups), or if the classifier, tag placeholder, and tag set disagree
    /// on the number of tags.
    pub fn new(
        assembler: FeatureAssembler<'a>,
        classifier: C,
        tags: TagSet,
    ) -> Result<Self, ConfigError> {
        assembler.check_input_len(classifier.input_len())?;
        assembler.check_input_shape(classifier.n_groups(), classifier.group_len())?;

        if classifier.n_labels() != tags.len() {
            return Err(ConfigError::LabelCount {
                classifier: classifier.n_labels(),
                tags: tags.len(),
            });
        }

        let width = assembler.lexicon().n_tags();
        if width != tags.len() {
            return Err(ConfigError::PlaceholderWidth {
                width,
                tags: tags.len(),
            });
        }

        Ok(Tagger {
            assembler,
            classifier,
            tags,
        })
    }

    pub fn assembler(&self) -> &FeatureAssembler<'a> {
        &self.assembler
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }

    pub fn into_classifier(self) -> C {
        self.classifier
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Construct a tagging state for a sentence.
    pub fn state<'s>(&self, sentence: &'s Sentence) -> TaggingState<'s> {
        TaggingState::new(sentence, self.assembler.lexicon())
    }

    /// Construct a tagging state for a sentence that captures its gold
    /// tags.
    pub fn gold_state<'s>(&self, sentence: &'s Sentence) -> TaggingState<'s> {
        TaggingState::with_gold(sentence, self.assembler.lexicon())
    }

    /// Tag states until all of them are terminal.
    pub fn tag_states(&self, states: &mut [TaggingState]) -> Fallible<()> {
        loop {
            let (active, inputs) = self.step_features(states)?;
            if active.is_empty() {
                return Ok(());
            }

            let probs = self.classifier.predict(inputs.view());
            self.apply_predictions(states, &active, probs.view())?;
        }
    }

    /// Assemble the features of the active states.
    ///
    /// Returns the indices of the active states together with a matrix
    /// that has one feature vector per active state.
    pub(crate) fn step_features(
        &self,
        states: &[TaggingState],
    ) -> Result<(Vec<usize>, Array2<f32>), LexiconError> {
        let active = states
            .iter()
            .enumerate()
            .filter(|(_, state)| !state.is_terminal())
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        let mut inputs = Array2::zeros((active.len(), self.assembler.input_len()));
        for (&idx, row) in active.iter().zip(inputs.outer_iter_mut()) {
            self.assembler.realize_into(&states[idx], row)?;
        }

        Ok((active, inputs))
    }

    /// Apply the most probable tag of every row of `probs` to the
    /// corresponding active state.
    pub(crate) fn apply_predictions(
        &self,
        states: &mut [TaggingState],
        active: &[usize],
        probs: ArrayView2<f32>,
    ) -> Fallible<()> {
        for (&idx, scores) in active.iter().zip(probs.outer_iter()) {
            let best = argmax(scores.view());
            let tag = self
                .tags
                .value(best)
                .ok_or_else(|| DataError::UnknownNumber(best))?;
            states[idx].process(tag, Some(scores))?;
        }

        Ok(())
    }
}

impl<'a, C> Tag for Tagger<'a, C>
where
    C: Classifier,
{
    fn tag_sentences(&self, sentences: &mut [impl BorrowMut<Sentence>]) -> Fallible<()> {
        // The states borrow the sentences, so the tags are collected
        // before the sentences are updated.
        let tags = {
            let mut states = sentences
                .iter()
                .map(|sentence| self.state(sentence.borrow()))
                .collect::<Vec<_>>();

            self.tag_states(&mut states)?;

            states
                .iter()
                .map(|state| {
                    state
                        .labels()
                        .map(|label| label.map(ToOwned::to_owned))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        };

        for (sentence, sent_tags) in sentences.iter_mut().zip(tags) {
            let sentence: &mut Sentence = sentence.borrow_mut();
            for (token, tag) in sentence
                .iter_mut()
                .filter_map(Node::token_mut)
                .zip(sent_tags)
            {
                token.set_pos(tag);
            }
        }

        Ok(())
    }
}
