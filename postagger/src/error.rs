use failure::Fail;

use crate::Provider;

/// Tagging state errors.
///
/// These errors signal that a caller did not respect the contract of the
/// state machine, e.g. by not checking `is_terminal` before applying a
/// transition.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum StateError {
    /// A transition was applied to a terminated state.
    #[fail(
        display = "cannot process a token in a terminated state (cursor: {}, nodes: {})",
        cursor, len
    )]
    Terminated { cursor: usize, len: usize },

    /// The score vector does not have one score per tag.
    #[fail(display = "score vector has {} scores, expected {}", len, expected)]
    ScoreWidth { len: usize, expected: usize },
}

/// Lexicon lookup errors.
#[derive(Clone, Copy, Debug, Eq, Fail, PartialEq)]
pub enum LexiconError {
    /// An embedding was requested from a provider slot that is not bound.
    #[fail(display = "{} embeddings are not configured", _0)]
    UnboundProvider(Provider),
}

/// Configuration errors.
///
/// Configuration errors are raised while the lexicon, feature assembler,
/// and classifier are set up, before any sentence is tagged.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum ConfigError {
    #[fail(display = "the tag set is empty")]
    EmptyTagSet,

    #[fail(display = "the feature context does not contain any offsets")]
    EmptyContext,

    #[fail(display = "{} embeddings have zero dimensions", _0)]
    ZeroDims(Provider),

    /// The assembled feature vectors do not fit the classifier input.
    #[fail(
        display = "feature vectors have length {}, the classifier expects {}",
        input_len, expected
    )]
    InputLength { input_len: usize, expected: usize },

    /// The feature vectors have the expected length, but are split
    /// differently into per-offset groups.
    #[fail(
        display = "feature vectors have {} groups of {} features, the classifier expects {} groups of {}",
        n_groups, group_len, expected_groups, expected_group_len
    )]
    InputShape {
        n_groups: usize,
        group_len: usize,
        expected_groups: usize,
        expected_group_len: usize,
    },

    #[fail(
        display = "the classifier predicts {} labels, but there are {} tags",
        classifier, tags
    )]
    LabelCount { classifier: usize, tags: usize },

    /// The lexicon's tag placeholder does not have one score per tag.
    #[fail(
        display = "the tag placeholder has width {}, but there are {} tags",
        width, tags
    )]
    PlaceholderWidth { width: usize, tags: usize },

    #[fail(display = "no n-gram filters are configured")]
    NoFilters,

    #[fail(
        display = "n-gram filter of width {} does not fit in a window of {} offsets",
        width, n_offsets
    )]
    FilterWidth { width: usize, n_offsets: usize },

    /// A model parameter does not have the shape implied by the model
    /// dimensions.
    #[fail(
        display = "parameter '{}' has shape {:?}, expected {:?}",
        parameter, shape, expected
    )]
    ParameterShape {
        parameter: String,
        shape: Vec<usize>,
        expected: Vec<usize>,
    },
}

/// Data errors.
#[derive(Clone, Debug, Eq, Fail, PartialEq)]
pub enum DataError {
    /// The token does not have a part-of-speech tag.
    #[fail(display = "token without a part-of-speech tag: '{}'", form)]
    MissingTag { form: String },

    /// The part-of-speech tag is not in the tag set.
    #[fail(display = "unknown part-of-speech tag: '{}'", tag)]
    UnknownTag { tag: String },

    /// The classifier predicted a class that is not in the tag set.
    #[fail(display = "unknown tag number: {}", _0)]
    UnknownNumber(usize),
}
