use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use ordered_float::OrderedFloat;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

use super::Classifier;
use crate::ConfigError;

/// Bank of convolution filters with the same n-gram width.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct FilterBank {
    width: usize,

    /// Filter weights, one row of `width * group_len` weights per filter.
    weights: Array2<f32>,

    bias: Array1<f32>,
}

/// N-gram convolution classifier.
///
/// A feature vector is read as a sequence of `n_groups` groups (one group
/// per context offset) of `group_len` features. Every filter bank slides
/// filters spanning `width` consecutive groups over this sequence. Filter
/// activations are rectified and max-pooled over all positions. The pooled
/// activations of all banks form the hidden layer, which is followed by a
/// fully connected softmax layer.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ConvClassifier {
    n_groups: usize,
    group_len: usize,
    banks: Vec<FilterBank>,
    output_weights: Array2<f32>,
    output_bias: Array1<f32>,
}

/// Hidden layer activations of a single input.
struct Hidden {
    activations: Array1<f32>,

    /// Position of the maximum of each hidden unit, `None` when the unit
    /// is not active.
    positions: Vec<Option<usize>>,
}

impl ConvClassifier {
    /// Construct a classifier with randomly initialized parameters.
    ///
    /// `ngram_widths` contains the width of every filter bank, each bank
    /// has `n_filters` filters.
    pub fn new<R>(
        n_groups: usize,
        group_len: usize,
        n_labels: usize,
        ngram_widths: &[usize],
        n_filters: usize,
        rng: &mut R,
    ) -> Result<Self, ConfigError>
    where
        R: Rng,
    {
        if n_labels == 0 {
            return Err(ConfigError::EmptyTagSet);
        }

        if ngram_widths.is_empty() || n_filters == 0 {
            return Err(ConfigError::NoFilters);
        }

        let mut banks = Vec::with_capacity(ngram_widths.len());
        for &width in ngram_widths {
            if width == 0 || width > n_groups {
                return Err(ConfigError::FilterWidth {
                    width,
                    n_offsets: n_groups,
                });
            }

            let fan_in = width * group_len;
            banks.push(FilterBank {
                width,
                weights: glorot_uniform((n_filters, fan_in), rng),
                bias: Array1::zeros(n_filters),
            });
        }

        let hidden_len = n_filters * ngram_widths.len();

        Ok(ConvClassifier {
            n_groups,
            group_len,
            banks,
            output_weights: glorot_uniform((n_labels, hidden_len), rng),
            output_bias: Array1::zeros(n_labels),
        })
    }

    /// Verify that the parameter shapes agree with the model dimensions.
    ///
    /// Deserialized parameters are not checked otherwise.
    pub fn check_parameters(&self) -> Result<(), ConfigError> {
        if self.banks.is_empty() {
            return Err(ConfigError::NoFilters);
        }

        for (idx, bank) in self.banks.iter().enumerate() {
            if bank.width == 0 || bank.width > self.n_groups {
                return Err(ConfigError::FilterWidth {
                    width: bank.width,
                    n_offsets: self.n_groups,
                });
            }

            let n_filters = bank.weights.nrows();
            check_shape(
                format!("banks[{}].weights", idx),
                bank.weights.shape(),
                &[n_filters, bank.width * self.group_len],
            )?;
            check_shape(
                format!("banks[{}].bias", idx),
                bank.bias.shape(),
                &[n_filters],
            )?;
        }

        let n_labels = self.output_bias.len();
        if n_labels == 0 {
            return Err(ConfigError::EmptyTagSet);
        }

        check_shape(
            "output_weights".to_owned(),
            self.output_weights.shape(),
            &[n_labels, self.hidden_len()],
        )
    }

    /// Number of hidden units.
    pub fn hidden_len(&self) -> usize {
        self.banks.iter().map(|bank| bank.weights.nrows()).sum()
    }

    fn hidden(&self, input: ArrayView1<f32>) -> Hidden {
        let mut activations = Array1::<f32>::zeros(self.hidden_len());
        let mut positions = vec![None; self.hidden_len()];

        let mut unit_offset = 0;
        for bank in &self.banks {
            let window_len = bank.width * self.group_len;

            for pos in 0..=self.n_groups - bank.width {
                let start = pos * self.group_len;
                let window = input.slice(s![start..start + window_len]);
                let filter_activations = bank.weights.dot(&window) + &bank.bias;

                // Activations start at zero, so only positive activations
                // are pooled. This is ReLU followed by max pooling.
                for (filter, &activation) in filter_activations.iter().enumerate() {
                    let unit = unit_offset + filter;
                    if activation > activations[unit] {
                        activations[unit] = activation;
                        positions[unit] = Some(pos);
                    }
                }
            }

            unit_offset += bank.weights.nrows();
        }

        Hidden {
            activations,
            positions,
        }
    }

    fn probs(&self, hidden: &Hidden) -> Array1<f32> {
        let mut logits = self.output_weights.dot(&hidden.activations) + &self.output_bias;
        softmax(&mut logits);
        logits
    }
}

impl Classifier for ConvClassifier {
    fn n_groups(&self) -> usize {
        self.n_groups
    }

    fn group_len(&self) -> usize {
        self.group_len
    }

    fn n_labels(&self) -> usize {
        self.output_bias.len()
    }

    fn predict(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        assert_eq!(
            inputs.ncols(),
            self.input_len(),
            "Input has incorrect length"
        );

        let mut probs = Array2::zeros((inputs.nrows(), self.n_labels()));
        for (input, mut instance_probs) in inputs.outer_iter().zip(probs.outer_iter_mut()) {
            instance_probs.assign(&self.probs(&self.hidden(input)));
        }

        probs
    }

    fn train_step(
        &mut self,
        inputs: ArrayView2<f32>,
        labels: &[usize],
        learning_rate: f32,
    ) -> Array2<f32> {
        assert_eq!(
            inputs.nrows(),
            labels.len(),
            "Number of inputs and labels differs"
        );
        assert_eq!(
            inputs.ncols(),
            self.input_len(),
            "Input has incorrect length"
        );

        let mut batch_probs = Array2::zeros((labels.len(), self.n_labels()));
        if labels.is_empty() {
            return batch_probs;
        }

        let mut output_weights_grad = Array2::<f32>::zeros(self.output_weights.raw_dim());
        let mut output_bias_grad = Array1::<f32>::zeros(self.output_bias.raw_dim());
        let mut bank_grads: Vec<_> = self
            .banks
            .iter()
            .map(|bank| {
                (
                    Array2::<f32>::zeros(bank.weights.raw_dim()),
                    Array1::<f32>::zeros(bank.bias.raw_dim()),
                )
            })
            .collect();

        for ((input, &label), mut instance_probs) in inputs
            .outer_iter()
            .zip(labels)
            .zip(batch_probs.outer_iter_mut())
        {
            let hidden = self.hidden(input);
            let probs = self.probs(&hidden);
            instance_probs.assign(&probs);

            // Gradient of the cross-entropy loss with respect to the logits.
            let mut logits_grad = probs;
            logits_grad[label] -= 1.;

            for (mut label_weights_grad, &grad) in output_weights_grad
                .outer_iter_mut()
                .zip(logits_grad.iter())
            {
                label_weights_grad.scaled_add(grad, &hidden.activations);
            }
            output_bias_grad += &logits_grad;

            let hidden_grad = self.output_weights.t().dot(&logits_grad);

            let mut unit_offset = 0;
            for (bank, (weights_grad, bias_grad)) in self.banks.iter().zip(&mut bank_grads) {
                let window_len = bank.width * self.group_len;

                for filter in 0..bank.weights.nrows() {
                    let unit = unit_offset + filter;
                    if let Some(pos) = hidden.positions[unit] {
                        let start = pos * self.group_len;
                        let window = input.slice(s![start..start + window_len]);
                        weights_grad
                            .row_mut(filter)
                            .scaled_add(hidden_grad[unit], &window);
                        bias_grad[filter] += hidden_grad[unit];
                    }
                }

                unit_offset += bank.weights.nrows();
            }
        }

        let n_instances = labels.len() as f32;
        let step = -learning_rate / n_instances;

        self.output_weights.scaled_add(step, &output_weights_grad);
        self.output_bias.scaled_add(step, &output_bias_grad);
        for (bank, (weights_grad, bias_grad)) in self.banks.iter_mut().zip(&bank_grads) {
            bank.weights.scaled_add(step, weights_grad);
            bank.bias.scaled_add(step, bias_grad);
        }

        batch_probs
    }
}

/// Index of the highest score.
pub(crate) fn argmax(scores: ArrayView1<f32>) -> usize {
    scores
        .iter()
        .enumerate()
        .max_by_key(|&(_, &score)| OrderedFloat(score))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn check_shape(parameter: String, shape: &[usize], expected: &[usize]) -> Result<(), ConfigError> {
    if shape == expected {
        Ok(())
    } else {
        Err(ConfigError::ParameterShape {
            parameter,
            shape: shape.to_vec(),
            expected: expected.to_vec(),
        })
    }
}

fn glorot_uniform<R>(shape: (usize, usize), rng: &mut R) -> Array2<f32>
where
    R: Rng,
{
    let bound = (6. / (shape.0 + shape.1) as f32).sqrt();
    let uniform = Uniform::new_inclusive(-bound, bound);
    Array2::from_shape_fn(shape, |_| uniform.sample(&mut *rng))
}

fn softmax(logits: &mut Array1<f32>) {
    let max = logits.fold(std::f32::NEG_INFINITY, |max, &v| max.max(v));
    logits.map_inplace(|v| *v = (*v - max).exp());
    let sum = logits.sum();
    *logits /= sum;
}
