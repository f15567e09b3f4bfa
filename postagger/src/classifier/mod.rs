//! Classifiers over assembled feature vectors.

use ndarray::{Array2, ArrayView2};

mod conv;
pub use self::conv::ConvClassifier;
pub(crate) use self::conv::argmax;

/// Loss and accuracy of a model on a batch or an epoch.
#[derive(Clone, Copy, Debug)]
pub struct ModelPerformance {
    /// Model loss.
    pub loss: f32,

    /// Model accuracy
    ///
    /// The accuracy is the fraction of correctly predicted labels.
    pub accuracy: f32,
}

/// Trainable classifier.
///
/// A classifier maps feature vectors of a fixed length to probability
/// distributions over labels. A feature vector consists of `n_groups`
/// groups of `group_len` features. Inputs are batched: each row of an
/// input matrix is one feature vector.
pub trait Classifier {
    /// The number of feature groups in a feature vector.
    fn n_groups(&self) -> usize;

    /// The length of a feature group.
    fn group_len(&self) -> usize;

    /// The length of a feature vector.
    fn input_len(&self) -> usize {
        self.n_groups() * self.group_len()
    }

    /// The number of labels.
    fn n_labels(&self) -> usize;

    /// Predict label distributions.
    ///
    /// Returns a matrix with one row of label probabilities per input row.
    fn predict(&self, inputs: ArrayView2<f32>) -> Array2<f32>;

    /// Update the classifier parameters using a batch of inputs and their
    /// gold labels.
    ///
    /// Returns the label distributions of the inputs as predicted by the
    /// parameters before the update, as `predict` would.
    fn train_step(
        &mut self,
        inputs: ArrayView2<f32>,
        labels: &[usize],
        learning_rate: f32,
    ) -> Array2<f32>;
}
