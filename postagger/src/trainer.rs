use failure::Fallible;
use log::debug;
use ndarray::ArrayView2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::{Accuracy, Classifier, DataError, ModelPerformance, Tagger, TaggingState};

/// Trainer for a tagger.
///
/// Training uses the same left-to-right state machine as tagging: the
/// features of a token are computed from the predictions for the
/// preceding tokens, never from their gold tags.
pub struct Trainer<'a, C> {
    tagger: Tagger<'a, C>,
}

impl<'a, C> Trainer<'a, C>
where
    C: Classifier,
{
    pub fn new(tagger: Tagger<'a, C>) -> Self {
        Trainer { tagger }
    }

    pub fn tagger(&self) -> &Tagger<'a, C> {
        &self.tagger
    }

    pub fn into_tagger(self) -> Tagger<'a, C> {
        self.tagger
    }

    /// Run a training or validation epoch.
    ///
    /// All states are reset and then tagged in batches of `batch_size`
    /// sentences. When `train` is true, the classifier is updated in every
    /// step using the gold tags of the active states. The states must be
    /// constructed with gold tags.
    ///
    /// Returns the average loss per token and the tagging accuracy of the
    /// epoch.
    pub fn epoch(
        &mut self,
        states: &mut [TaggingState],
        batch_size: usize,
        learning_rate: f32,
        train: bool,
    ) -> Fallible<ModelPerformance> {
        self.epoch_with_callback(states, batch_size, learning_rate, train, |_, _| ())
    }

    /// Run a training or validation epoch, calling `batch_done` after every
    /// batch.
    ///
    /// The callback receives the number of sentences in the batch and the
    /// performance on the batch.
    pub fn epoch_with_callback<F>(
        &mut self,
        states: &mut [TaggingState],
        batch_size: usize,
        learning_rate: f32,
        train: bool,
        mut batch_done: F,
    ) -> Fallible<ModelPerformance>
    where
        F: FnMut(usize, ModelPerformance),
    {
        assert!(batch_size > 0, "Batch size must be a positive value");

        for state in states.iter_mut() {
            state.reset();
        }

        let mut loss = 0f32;
        let mut n_tokens = 0;

        for (batch_idx, batch) in states.chunks_mut(batch_size).enumerate() {
            let mut n_steps = 0;
            let mut batch_loss = 0f32;
            let mut batch_tokens = 0;

            loop {
                let (active, inputs) = self.tagger.step_features(batch)?;
                if active.is_empty() {
                    break;
                }

                let golds = gold_numbers(&self.tagger, batch, &active)?;

                // train_step returns the predictions of the pre-update
                // parameters.
                let probs = if train {
                    self.tagger
                        .classifier_mut()
                        .train_step(inputs.view(), &golds, learning_rate)
                } else {
                    self.tagger.classifier().predict(inputs.view())
                };

                batch_loss += cross_entropy(probs.view(), &golds);
                batch_tokens += golds.len();

                self.tagger
                    .apply_predictions(batch, &active, probs.view())?;
                n_steps += 1;
            }

            debug!(
                "Batch {}: {} sentences, {} steps",
                batch_idx,
                batch.len(),
                n_steps
            );

            let mut batch_accuracy = Accuracy::new();
            for state in batch.iter() {
                state.eval(&mut batch_accuracy);
            }

            batch_done(
                batch.len(),
                ModelPerformance {
                    loss: average(batch_loss, batch_tokens),
                    accuracy: batch_accuracy.ratio(),
                },
            );

            loss += batch_loss;
            n_tokens += batch_tokens;
        }

        let mut accuracy = Accuracy::new();
        for state in states.iter() {
            state.eval(&mut accuracy);
        }

        Ok(ModelPerformance {
            loss: average(loss, n_tokens),
            accuracy: accuracy.ratio(),
        })
    }
}

fn average(sum: f32, n: usize) -> f32 {
    if n == 0 {
        0.
    } else {
        sum / n as f32
    }
}

/// Look up the tag numbers of the gold tags of the active states.
fn gold_numbers<C>(
    tagger: &Tagger<C>,
    states: &[TaggingState],
    active: &[usize],
) -> Result<Vec<usize>, DataError>
where
    C: Classifier,
{
    active
        .iter()
        .map(|&idx| {
            let state = &states[idx];
            let gold = state.gold().ok_or_else(|| DataError::MissingTag {
                form: state.form(state.cursor()).unwrap_or("").to_owned(),
            })?;
            tagger
                .tags()
                .number(gold)
                .ok_or_else(|| DataError::UnknownTag {
                    tag: gold.to_owned(),
                })
        })
        .collect()
}

/// Summed cross-entropy loss of the gold labels.
fn cross_entropy(probs: ArrayView2<f32>, golds: &[usize]) -> f32 {
    probs
        .outer_iter()
        .zip(golds)
        .map(|(probs, &gold)| -probs[gold].max(std::f32::MIN_POSITIVE).ln())
        .sum()
}

/// Bagging of training instances.
///
/// Every call of `sample` shuffles the instances and selects the first
/// `ratio` fraction of them.
pub struct Bagging {
    ratio: f32,
    rng: XorShiftRng,
}

impl Bagging {
    pub fn new(ratio: f32, seed: u64) -> Self {
        assert!(
            ratio > 0.0 && ratio <= 1.0,
            "The bagging ratio must be in (0, 1]."
        );

        Bagging {
            ratio,
            rng: XorShiftRng::seed_from_u64(seed),
        }
    }

    /// Shuffle `instances` and return the sample.
    pub fn sample<'s, T>(&mut self, instances: &'s mut [T]) -> &'s mut [T] {
        instances.shuffle(&mut self.rng);
        let n = ((instances.len() as f32 * self.ratio).ceil() as usize).min(instances.len());
        &mut instances[..n]
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use conllx::graph::Sentence;
    use conllx::token::TokenBuilder;
    use lazy_static::lazy_static;
    use ndarray::{Array2, ArrayView2};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::{Bagging, Trainer};
    use crate::lexicon::tests::TableEmbeddings;
    use crate::{
        Classifier, ConvClassifier, DataError, FeatureAssembler, Lexicon, Provider, TagSet,
        Tagger, TaggingState,
    };

    /// Classifier that counts forward passes.
    struct CountingClassifier {
        inner: ConvClassifier,
        predictions: Cell<usize>,
        train_steps: usize,
    }

    impl Classifier for CountingClassifier {
        fn n_groups(&self) -> usize {
            self.inner.n_groups()
        }

        fn group_len(&self) -> usize {
            self.inner.group_len()
        }

        fn n_labels(&self) -> usize {
            self.inner.n_labels()
        }

        fn predict(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
            self.predictions.set(self.predictions.get() + 1);
            self.inner.predict(inputs)
        }

        fn train_step(
            &mut self,
            inputs: ArrayView2<f32>,
            labels: &[usize],
            learning_rate: f32,
        ) -> Array2<f32> {
            self.train_steps += 1;
            self.inner.train_step(inputs, labels, learning_rate)
        }
    }

    fn sentence(tokens: &[(&str, Option<&str>)]) -> Sentence {
        let mut sent = Sentence::new();
        for &(form, pos) in tokens {
            let mut builder = TokenBuilder::new(form);
            if let Some(pos) = pos {
                builder = builder.pos(pos);
            }
            sent.push(builder.into());
        }
        sent
    }

    lazy_static! {
        static ref CORPUS: Vec<Sentence> = vec![
            sentence(&[("the", Some("DET")), ("dog", Some("NOUN")), ("runs", Some("VERB"))]),
            sentence(&[("the", Some("DET")), ("cat", Some("NOUN")), ("sleeps", Some("VERB"))]),
            sentence(&[("dog", Some("NOUN")), ("runs", Some("VERB"))]),
            sentence(&[("the", Some("DET")), ("cat", Some("NOUN"))]),
            sentence(&[("cat", Some("NOUN")), ("sleeps", Some("VERB"))]),
        ];
    }

    fn tag_set() -> TagSet {
        let mut tags = TagSet::new();
        tags.add("DET");
        tags.add("NOUN");
        tags.add("VERB");
        tags
    }

    fn lexicon() -> Lexicon {
        Lexicon::new(3)
            .unwrap()
            .with_provider(
                Provider::Word2Vec,
                Box::new(TableEmbeddings::new(
                    3,
                    &[
                        ("the", &[1., 0., 0.]),
                        ("dog", &[0., 1., 0.]),
                        ("cat", &[0., 1., 0.]),
                        ("runs", &[0., 0., 1.]),
                        ("sleeps", &[0., 0., 1.]),
                    ],
                )),
            )
            .unwrap()
    }

    fn classifier(group_len: usize) -> ConvClassifier {
        let mut rng = XorShiftRng::seed_from_u64(42);
        ConvClassifier::new(1, group_len, 3, &[1], 32, &mut rng).unwrap()
    }

    fn trainer(lexicon: &Lexicon) -> Trainer<ConvClassifier> {
        let assembler = FeatureAssembler::new(lexicon, vec![0]).unwrap();
        let classifier = classifier(assembler.group_len());
        Trainer::new(Tagger::new(assembler, classifier, tag_set()).unwrap())
    }

    #[test]
    fn training_improves_accuracy() {
        let lexicon = lexicon();
        let mut trainer = trainer(&lexicon);
        let mut states = CORPUS
            .iter()
            .map(|s| trainer.tagger().gold_state(s))
            .collect::<Vec<_>>();

        let before = trainer.epoch(&mut states, 2, 0.5, false).unwrap();

        for _ in 0..100 {
            trainer.epoch(&mut states, 2, 0.5, true).unwrap();
        }

        let after = trainer.epoch(&mut states, 2, 0.5, false).unwrap();
        assert!(after.loss < before.loss);
        assert_eq!(after.accuracy, 1.);

        assert!(states.iter().all(TaggingState::is_terminal));
        assert_eq!(
            states[0].labels().collect::<Vec<_>>(),
            vec![Some("DET"), Some("NOUN"), Some("VERB")]
        );
    }

    #[test]
    fn epochs_reset_states() {
        let lexicon = lexicon();
        let mut trainer = trainer(&lexicon);
        let mut states = CORPUS
            .iter()
            .map(|s| trainer.tagger().gold_state(s))
            .collect::<Vec<_>>();

        trainer.epoch(&mut states, 3, 0.1, true).unwrap();
        trainer.epoch(&mut states, 3, 0.1, false).unwrap();

        for state in &states {
            assert_eq!(state.reset_count(), 2);
            assert!(state.is_terminal());
        }
    }

    #[test]
    fn training_runs_one_forward_pass_per_step() {
        let lexicon = lexicon();
        let assembler = FeatureAssembler::new(&lexicon, vec![0]).unwrap();
        let classifier = CountingClassifier {
            inner: classifier(assembler.group_len()),
            predictions: Cell::new(0),
            train_steps: 0,
        };
        let mut trainer = Trainer::new(Tagger::new(assembler, classifier, tag_set()).unwrap());
        let mut states = CORPUS
            .iter()
            .map(|s| trainer.tagger().gold_state(s))
            .collect::<Vec<_>>();

        // Batches of sizes 2, 2, and 1 with at most 3 tokens per sentence.
        trainer.epoch(&mut states, 2, 0.1, true).unwrap();
        let classifier = trainer.tagger().classifier();
        assert_eq!(classifier.predictions.get(), 0);
        assert_eq!(classifier.train_steps, 3 + 2 + 2);

        trainer.epoch(&mut states, 2, 0.1, false).unwrap();
        let classifier = trainer.tagger().classifier();
        assert_eq!(classifier.predictions.get(), 3 + 2 + 2);
        assert_eq!(classifier.train_steps, 3 + 2 + 2);
    }

    #[test]
    fn callback_is_called_per_batch() {
        let lexicon = lexicon();
        let mut trainer = trainer(&lexicon);
        let mut states = CORPUS
            .iter()
            .map(|s| trainer.tagger().gold_state(s))
            .collect::<Vec<_>>();

        let mut batch_sizes = Vec::new();
        trainer
            .epoch_with_callback(&mut states, 2, 0.1, true, |n_sentences, perf| {
                assert!(perf.loss > 0.);
                batch_sizes.push(n_sentences);
            })
            .unwrap();

        assert_eq!(batch_sizes, vec![2, 2, 1]);
    }

    #[test]
    fn training_requires_gold_tags() {
        let lexicon = lexicon();
        let mut trainer = trainer(&lexicon);

        let sent = sentence(&[("the", Some("DET")), ("dog", None)]);
        let mut states = vec![trainer.tagger().gold_state(&sent)];
        let err = trainer.epoch(&mut states, 1, 0.1, true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DataError>(),
            Some(&DataError::MissingTag {
                form: "dog".to_owned()
            })
        );

        let sent = sentence(&[("the", Some("ART"))]);
        let mut states = vec![trainer.tagger().gold_state(&sent)];
        let err = trainer.epoch(&mut states, 1, 0.1, true).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DataError>(),
            Some(&DataError::UnknownTag {
                tag: "ART".to_owned()
            })
        );
    }

    #[test]
    fn bagging_samples_fraction() {
        let mut instances = (0..10).collect::<Vec<_>>();

        let mut bagging = Bagging::new(0.25, 7);
        let sample = bagging.sample(&mut instances).to_vec();
        assert_eq!(sample.len(), 3);

        let mut other_instances = (0..10).collect::<Vec<_>>();
        let mut other_bagging = Bagging::new(0.25, 7);
        assert_eq!(other_bagging.sample(&mut other_instances), &sample[..]);

        let mut all = Bagging::new(1.0, 7);
        let mut sorted = all.sample(&mut instances).to_vec();
        sorted.sort();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}
