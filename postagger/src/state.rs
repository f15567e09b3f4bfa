//! Sequential tagging state.
//!
//! A sentence is tagged strictly from left to right. The tagging state
//! keeps a cursor into the sentence together with the labels and score
//! vectors that were predicted so far. Features for the token under the
//! cursor are derived from this state, so a prediction only sees the
//! finalized predictions of earlier tokens.

use conllx::graph::{Node, Sentence};
use ndarray::{Array2, ArrayView1};

use crate::{Lexicon, StateError};

/// Running accuracy over one or more sentences.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Accuracy {
    /// Number of evaluated tokens.
    pub total: usize,

    /// Number of tokens with a correct label.
    pub correct: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Accuracy::default()
    }

    /// Fraction of correctly labeled tokens, 0 if nothing was evaluated.
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            0.
        } else {
            self.correct as f32 / self.total as f32
        }
    }
}

/// Tagging state of a single sentence.
///
/// Node 0 of a sentence is the root sentinel, so the cursor starts at 1.
/// The state is *active* while the cursor is on a token and *terminal*
/// once the cursor has moved past the last token.
///
/// The sentence is only borrowed. Predicted labels and scores are stored
/// in buffers that are owned by the state, so that the same sentence can
/// be tagged again after a `reset`.
pub struct TaggingState<'a> {
    sentence: &'a Sentence,
    cursor: usize,
    labels: Vec<Option<String>>,
    scores: Array2<f32>,
    golds: Option<Vec<Option<String>>>,
    reset_count: usize,
}

impl<'a> TaggingState<'a> {
    /// Construct a state for tagging a sentence.
    ///
    /// The score vectors have the width of the lexicon's tag placeholder.
    pub fn new(sentence: &'a Sentence, lexicon: &Lexicon) -> Self {
        TaggingState {
            sentence,
            cursor: 1,
            labels: vec![None; sentence.len()],
            scores: Array2::zeros((sentence.len(), lexicon.n_tags())),
            golds: None,
            reset_count: 0,
        }
    }

    /// Construct a state that also captures the gold labels.
    ///
    /// The part-of-speech tags of the sentence's tokens are copied when
    /// the state is constructed. Labels that are applied to the state later
    /// do not affect this copy.
    pub fn with_gold(sentence: &'a Sentence, lexicon: &Lexicon) -> Self {
        let golds = sentence
            .iter()
            .filter_map(Node::token)
            .map(|token| token.pos().map(ToOwned::to_owned))
            .collect();

        TaggingState {
            golds: Some(golds),
            ..TaggingState::new(sentence, lexicon)
        }
    }

    /// Rewind the state to the first token.
    ///
    /// All labels are removed and all score vectors are set to the
    /// placeholder. The gold labels are retained.
    pub fn reset(&mut self) {
        for label in &mut self.labels {
            *label = None;
        }

        self.scores.map_inplace(|v| *v = 0.);
        self.cursor = 1;
        self.reset_count += 1;
    }

    /// The gold label of the token under the cursor.
    ///
    /// Returns `None` if the state was constructed without gold labels, if
    /// the token does not have a gold label, or if the state is terminal.
    pub fn gold(&self) -> Option<&str> {
        self.golds
            .as_ref()?
            .get(self.cursor - 1)?
            .as_ref()
            .map(String::as_str)
    }

    /// Label the token under the cursor and move the cursor to the next
    /// token.
    ///
    /// If `scores` is given, it is stored as the token's score vector.
    /// Otherwise the token keeps its current scores. Processing a terminal
    /// state or storing a score vector that does not have one score per tag
    /// is an error, and leaves the state unchanged.
    pub fn process(
        &mut self,
        label: impl Into<String>,
        scores: Option<ArrayView1<f32>>,
    ) -> Result<(), StateError> {
        if self.is_terminal() {
            return Err(StateError::Terminated {
                cursor: self.cursor,
                len: self.len(),
            });
        }

        if let Some(scores) = scores {
            if scores.len() != self.scores.ncols() {
                return Err(StateError::ScoreWidth {
                    len: scores.len(),
                    expected: self.scores.ncols(),
                });
            }

            self.scores.row_mut(self.cursor).assign(&scores);
        }

        self.labels[self.cursor] = Some(label.into());
        self.cursor += 1;

        Ok(())
    }

    /// Check whether all tokens were processed.
    pub fn is_terminal(&self) -> bool {
        self.cursor >= self.len()
    }

    /// Add the evaluation of this sentence to `accuracy`.
    ///
    /// Every token of the sentence is counted, tokens that were not
    /// processed yet are counted as incorrect. The root sentinel is not
    /// counted. Returns the accumulated accuracy. Without gold labels,
    /// `accuracy` is not changed and 0 is returned.
    pub fn eval(&self, accuracy: &mut Accuracy) -> f32 {
        let golds = match self.golds {
            Some(ref golds) => golds,
            None => return 0.,
        };

        accuracy.total += golds.len();
        accuracy.correct += self.labels[1..]
            .iter()
            .zip(golds)
            .filter(|(label, gold)| label.is_some() && label == gold)
            .count();

        accuracy.ratio()
    }

    /// Position of the cursor.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of nodes, including the root sentinel.
    pub fn len(&self) -> usize {
        self.sentence.len()
    }

    /// Check whether the sentence consists of only the root sentinel.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Number of times the state was reset.
    pub fn reset_count(&self) -> usize {
        self.reset_count
    }

    /// The sentence that is tagged.
    pub fn sentence(&self) -> &'a Sentence {
        self.sentence
    }

    /// The word form at node `idx`, `None` for the root sentinel.
    pub fn form(&self, idx: usize) -> Option<&'a str> {
        self.sentence[idx].token().map(|token| token.form())
    }

    /// The label of node `idx`.
    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels[idx].as_ref().map(String::as_str)
    }

    /// The score vector of node `idx`.
    pub fn scores(&self, idx: usize) -> ArrayView1<f32> {
        self.scores.row(idx)
    }

    /// The labels of the sentence's tokens.
    pub fn labels(&self) -> impl Iterator<Item = Option<&str>> {
        self.labels[1..]
            .iter()
            .map(|label| label.as_ref().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use conllx::graph::Sentence;
    use conllx::token::TokenBuilder;
    use ndarray::{arr1, Array1};

    use super::{Accuracy, TaggingState};
    use crate::{Lexicon, StateError};

    fn the_dog_runs() -> Sentence {
        let mut sent = Sentence::new();
        sent.push(TokenBuilder::new("The").pos("DET").into());
        sent.push(TokenBuilder::new("dog").pos("NOUN").into());
        sent.push(TokenBuilder::new("runs").pos("VERB").into());
        sent
    }

    #[test]
    fn n_minus_one_transitions_terminate() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);

        assert_eq!(state.len(), 4);
        assert_eq!(state.cursor(), 1);

        for (i, label) in ["DET", "NOUN", "VERB"].iter().enumerate() {
            assert!(!state.is_terminal());
            state.process(*label, None).unwrap();
            assert_eq!(state.cursor(), i + 2);
        }

        assert!(state.is_terminal());
    }

    #[test]
    fn processing_terminal_state_fails() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);
        while !state.is_terminal() {
            state.process("X", None).unwrap();
        }

        assert_eq!(
            state.process("X", None),
            Err(StateError::Terminated { cursor: 4, len: 4 })
        );
        assert_eq!(state.cursor(), 4);
    }

    #[test]
    fn score_width_is_checked() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);

        let scores = arr1(&[0.5, 0.5]);
        assert_eq!(
            state.process("DET", Some(scores.view())),
            Err(StateError::ScoreWidth {
                len: 2,
                expected: 3
            })
        );
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.label(1), None);
    }

    #[test]
    fn process_stores_label_and_scores() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);

        let scores = arr1(&[0.7, 0.2, 0.1]);
        state.process("DET", Some(scores.view())).unwrap();
        state.process("NOUN", None).unwrap();

        assert_eq!(state.label(1), Some("DET"));
        assert_eq!(state.scores(1), scores.view());
        assert_eq!(state.label(2), Some("NOUN"));
        assert_eq!(state.scores(2), Array1::<f32>::zeros(3).view());
        assert_eq!(state.label(3), None);
        assert_eq!(
            state.labels().collect::<Vec<_>>(),
            vec![Some("DET"), Some("NOUN"), None]
        );
    }

    #[test]
    fn reset_clears_labels_and_scores() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::with_gold(&sent, &lexicon);

        let scores = arr1(&[0.7, 0.2, 0.1]);
        state.process("DET", Some(scores.view())).unwrap();
        state.process("NOUN", Some(scores.view())).unwrap();

        state.reset();
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.reset_count(), 1);
        for idx in 0..state.len() {
            assert_eq!(state.label(idx), None);
            assert!(state.scores(idx).iter().all(|&v| v == 0.));
        }
        assert_eq!(state.gold(), Some("DET"));

        state.reset();
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.reset_count(), 2);
        assert!(state.labels().all(|label| label.is_none()));
    }

    #[test]
    fn gold_follows_cursor() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::with_gold(&sent, &lexicon);

        assert_eq!(state.gold(), Some("DET"));
        state.process("VERB", None).unwrap();
        assert_eq!(state.gold(), Some("NOUN"));
        state.process("VERB", None).unwrap();
        assert_eq!(state.gold(), Some("VERB"));
        state.process("DET", None).unwrap();
        assert_eq!(state.gold(), None);

        // Wrong predictions do not leak into the gold labels.
        state.reset();
        assert_eq!(state.gold(), Some("DET"));
    }

    #[test]
    fn no_gold_without_capture() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::new(&sent, &lexicon);
        state.process("DET", None).unwrap();

        assert_eq!(state.gold(), None);

        let mut accuracy = Accuracy { total: 5, correct: 2 };
        assert_eq!(state.eval(&mut accuracy), 0.);
        assert_eq!(accuracy, Accuracy { total: 5, correct: 2 });
    }

    #[test]
    fn eval_all_correct() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::with_gold(&sent, &lexicon);

        let zeros = Array1::<f32>::zeros(3);
        for label in &["DET", "NOUN", "VERB"] {
            state.process(*label, Some(zeros.view())).unwrap();
        }
        assert!(state.is_terminal());

        let mut accuracy = Accuracy::new();
        assert_eq!(state.eval(&mut accuracy), 1.0);
        assert_eq!(accuracy, Accuracy { total: 3, correct: 3 });
    }

    #[test]
    fn eval_none_correct() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();
        let mut state = TaggingState::with_gold(&sent, &lexicon);
        for label in &["VERB", "DET", "NOUN"] {
            state.process(*label, None).unwrap();
        }

        let mut accuracy = Accuracy::new();
        assert_eq!(state.eval(&mut accuracy), 0.0);
        assert_eq!(accuracy, Accuracy { total: 3, correct: 0 });
    }

    #[test]
    fn eval_accumulates_over_sentences() {
        let sent = the_dog_runs();
        let lexicon = Lexicon::new(3).unwrap();

        let mut first = TaggingState::with_gold(&sent, &lexicon);
        for label in &["DET", "NOUN", "VERB"] {
            first.process(*label, None).unwrap();
        }

        let mut second = TaggingState::with_gold(&sent, &lexicon);
        for label in &["DET", "VERB", "NOUN"] {
            second.process(*label, None).unwrap();
        }

        let mut accuracy = Accuracy::new();
        first.eval(&mut accuracy);
        let ratio = second.eval(&mut accuracy);

        assert_eq!(accuracy, Accuracy { total: 6, correct: 4 });
        assert_eq!(ratio, 4. / 6.);
    }

    #[test]
    fn root_only_sentence_is_terminal() {
        let sent = Sentence::new();
        let lexicon = Lexicon::new(3).unwrap();
        let state = TaggingState::with_gold(&sent, &lexicon);

        assert!(state.is_empty());
        assert!(state.is_terminal());
        assert_eq!(state.gold(), None);
    }
}
