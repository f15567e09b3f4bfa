//! Windowed feature assembly.

use ndarray::{aview1, s, Array1, ArrayViewMut1};

use crate::{ConfigError, Lexicon, LexiconError, TaggingState};

/// The default feature context: two tokens to the left and right.
pub const DEFAULT_CONTEXT: [isize; 5] = [-2, -1, 0, 1, 2];

/// Assembler of windowed feature vectors.
///
/// For every offset of the context, the assembler takes the node at that
/// offset from the cursor and adds a group of vectors: the node's current
/// score vector, followed by the node's embedding from every bound
/// provider. The groups are concatenated in the order of the offsets.
///
/// Offsets that fall outside the sentence get the lexicon's tag
/// placeholder and zero embeddings, so that the feature vectors of a
/// context always have the same length.
pub struct FeatureAssembler<'a> {
    lexicon: &'a Lexicon,
    offsets: Vec<isize>,
    group_len: usize,
}

impl<'a> FeatureAssembler<'a> {
    /// Construct an assembler for the given context offsets.
    pub fn new(lexicon: &'a Lexicon, offsets: Vec<isize>) -> Result<Self, ConfigError> {
        if offsets.is_empty() {
            return Err(ConfigError::EmptyContext);
        }

        Ok(FeatureAssembler {
            lexicon,
            offsets,
            group_len: lexicon.n_tags() + lexicon.embedding_dims(),
        })
    }

    /// Verify that the feature vectors have the length that a consumer
    /// expects.
    pub fn check_input_len(&self, expected: usize) -> Result<(), ConfigError> {
        if self.input_len() == expected {
            Ok(())
        } else {
            Err(ConfigError::InputLength {
                input_len: self.input_len(),
                expected,
            })
        }
    }

    /// Verify that the feature vectors are split into the number of
    /// groups and the group length that a consumer expects.
    pub fn check_input_shape(
        &self,
        expected_groups: usize,
        expected_group_len: usize,
    ) -> Result<(), ConfigError> {
        if self.offsets.len() == expected_groups && self.group_len == expected_group_len {
            Ok(())
        } else {
            Err(ConfigError::InputShape {
                n_groups: self.offsets.len(),
                group_len: self.group_len,
                expected_groups,
                expected_group_len,
            })
        }
    }

    /// Length of the feature group of a single offset.
    pub fn group_len(&self) -> usize {
        self.group_len
    }

    /// Length of a feature vector.
    pub fn input_len(&self) -> usize {
        self.offsets.len() * self.group_len
    }

    pub fn lexicon(&self) -> &'a Lexicon {
        self.lexicon
    }

    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Assemble the feature vector of the token under the cursor.
    pub fn realize(&self, state: &TaggingState) -> Result<Array1<f32>, LexiconError> {
        let mut features = Array1::zeros(self.input_len());
        self.realize_into(state, features.view_mut())?;
        Ok(features)
    }

    /// Assemble the feature vector of the token under the cursor into
    /// `features`.
    ///
    /// Panics if `features` does not have length `input_len()`.
    pub fn realize_into(
        &self,
        state: &TaggingState,
        mut features: ArrayViewMut1<f32>,
    ) -> Result<(), LexiconError> {
        assert_eq!(
            features.len(),
            self.input_len(),
            "Feature vector has incorrect length"
        );

        let n_tags = self.lexicon.n_tags();

        for (group_idx, &offset) in self.offsets.iter().enumerate() {
            let mut group = features.slice_mut(s![
                group_idx * self.group_len..(group_idx + 1) * self.group_len
            ]);

            let node = resolve(state.cursor(), offset, state.len());

            match node {
                Some(idx) => group.slice_mut(s![..n_tags]).assign(&state.scores(idx)),
                None => group
                    .slice_mut(s![..n_tags])
                    .assign(&self.lexicon.tag_zeros()),
            }

            // The root sentinel has no form, it uses the unknown embedding
            // of the empty string.
            let form = node.map(|idx| state.form(idx).unwrap_or(""));

            let mut embed_offset = n_tags;
            for provider in self.lexicon.providers() {
                let embedding = self.lexicon.embedding(provider, form)?;
                group
                    .slice_mut(s![embed_offset..embed_offset + embedding.len()])
                    .assign(&aview1(&embedding));
                embed_offset += embedding.len();
            }
        }

        Ok(())
    }
}

/// Resolve the node at `offset` from `cursor`, `None` when the position is
/// outside a sentence of `len` nodes.
fn resolve(cursor: usize, offset: isize, len: usize) -> Option<usize> {
    let idx = cursor as isize + offset;
    if idx < 0 || idx >= len as isize {
        None
    } else {
        Some(idx as usize)
    }
}

#[cfg(test)]
mod tests {
    use conllx::graph::Sentence;
    use conllx::token::TokenBuilder;
    use ndarray::{arr1, Array1};

    use super::{resolve, FeatureAssembler, DEFAULT_CONTEXT};
    use crate::lexicon::tests::TableEmbeddings;
    use crate::{ConfigError, Lexicon, Provider, TaggingState};

    fn the_dog_runs() -> Sentence {
        let mut sent = Sentence::new();
        sent.push(TokenBuilder::new("The").pos("DET").into());
        sent.push(TokenBuilder::new("dog").pos("NOUN").into());
        sent.push(TokenBuilder::new("runs").pos("VERB").into());
        sent
    }

    fn embedding_lexicon() -> Lexicon {
        Lexicon::new(3)
            .unwrap()
            .with_provider(
                Provider::Word2Vec,
                Box::new(TableEmbeddings::new(
                    2,
                    &[("The", &[1., 1.]), ("dog", &[2., 2.]), ("runs", &[3., 3.])],
                )),
            )
            .unwrap()
            .with_provider(
                Provider::AmbiguityClass,
                Box::new(TableEmbeddings::new(1, &[("dog", &[5.])])),
            )
            .unwrap()
    }

    #[test]
    fn resolve_is_bounds_checked() {
        assert_eq!(resolve(1, -2, 4), None);
        assert_eq!(resolve(1, -1, 4), Some(0));
        assert_eq!(resolve(3, 0, 4), Some(3));
        assert_eq!(resolve(3, 1, 4), None);
    }

    #[test]
    fn empty_context_is_rejected() {
        let lexicon = Lexicon::new(3).unwrap();
        assert_eq!(
            FeatureAssembler::new(&lexicon, vec![]).err(),
            Some(ConfigError::EmptyContext)
        );
    }

    #[test]
    fn input_len_check() {
        let lexicon = embedding_lexicon();
        let assembler = FeatureAssembler::new(&lexicon, DEFAULT_CONTEXT.to_vec()).unwrap();

        assert_eq!(assembler.group_len(), 6);
        assert_eq!(assembler.input_len(), 30);
        assert!(assembler.check_input_len(30).is_ok());
        assert_eq!(
            assembler.check_input_len(25),
            Err(ConfigError::InputLength {
                input_len: 30,
                expected: 25
            })
        );
    }

    #[test]
    fn length_is_constant_over_sentence() {
        let sent = the_dog_runs();
        let lexicon = embedding_lexicon();
        let assembler = FeatureAssembler::new(&lexicon, DEFAULT_CONTEXT.to_vec()).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);

        while !state.is_terminal() {
            let features = assembler.realize(&state).unwrap();
            assert_eq!(features.len(), 5 * (3 + 2 + 1));
            state.process("X", None).unwrap();
        }
    }

    #[test]
    fn scores_only_window() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let assembler = FeatureAssembler::new(&lexicon, vec![-1, 0, 1]).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);

        state
            .process("DET", Some(arr1(&[1., 0., 0.]).view()))
            .unwrap();
        state
            .process("NOUN", Some(arr1(&[0., 1., 0.]).view()))
            .unwrap();

        // Cursor on the last token: the right context is outside the
        // sentence and padded with the placeholder.
        assert_eq!(state.cursor(), 3);
        let features = assembler.realize(&state).unwrap();
        let expected: Array1<f32> = arr1(&[0., 1., 0., 0., 0., 0., 0., 0., 0.]);
        assert_eq!(features, expected);

        state.process("VERB", None).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn window_at_sentence_start() {
        let sent = the_dog_runs();
        let lexicon = embedding_lexicon();
        let assembler = FeatureAssembler::new(&lexicon, vec![-2, -1, 0, 1]).unwrap();
        let state = TaggingState::new(&sent, &lexicon);

        let features = assembler.realize(&state).unwrap();
        let expected: Array1<f32> = arr1(&[
            // -2: outside the sentence.
            0., 0., 0., 0., 0., 0., //
            // -1: root, unknown embeddings.
            0., 0., 0., -1., -1., -1., //
            // 0: "The"
            0., 0., 0., 1., 1., -1., //
            // 1: "dog"
            0., 0., 0., 2., 2., 5.,
        ]);
        assert_eq!(features, expected);
    }

    #[test]
    fn realize_into_overwrites_buffer() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(2).unwrap();
        let assembler = FeatureAssembler::new(&lexicon, vec![-1, 1]).unwrap();
        let state = TaggingState::new(&sent, &lexicon);

        let mut features = Array1::from_elem(4, 7f32);
        assembler
            .realize_into(&state, features.view_mut())
            .unwrap();
        assert_eq!(features, Array1::<f32>::zeros(4));
    }
}
