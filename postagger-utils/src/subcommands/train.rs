use std::fs::File;
use std::io::BufReader;
use std::process;
use std::usize;

use clap::{App, Arg, ArgMatches};
use conllx::graph::Sentence;
use conllx::io::{ReadSentence, Reader};
use failure::{format_err, Error, Fallible};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use ordered_float::NotNan;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use stdinout::OrExit;

use postagger::lr::{LearningRateSchedule, PlateauLearningRate};
use postagger::serialization::CborRead;
use postagger::{
    Bagging, ConvClassifier, FeatureAssembler, Lexicon, ModelPerformance, TagSet, Tagger,
    TaggingState, Trainer,
};
use postagger_utils::{Config, ReadProgress, SaveSchedule, TomlRead};

use crate::traits::{PosApp, PosConfigApp};

static BAGGING_RATIO: &str = "BAGGING_RATIO";
static CONTINUE: &str = "CONTINUE";
static INITIAL_LR: &str = "INITIAL_LR";
static LR_PATIENCE: &str = "LR_PATIENCE";
static LR_SCALE: &str = "LR_SCALE";
static MAX_EPOCHS: &str = "MAX_EPOCHS";
static PATIENCE: &str = "PATIENCE";
static SAVE: &str = "SAVE";
static TRAIN_DATA: &str = "TRAIN_DATA";
static VALIDATION_DATA: &str = "VALIDATION_DATA";

pub struct LrSchedule {
    pub initial_lr: NotNan<f32>,
    pub lr_scale: NotNan<f32>,
    pub lr_patience: usize,
}

pub struct TrainApp {
    bagging_ratio: NotNan<f32>,
    config: String,
    lr_schedule: LrSchedule,
    max_epochs: Option<usize>,
    parameters: Option<String>,
    patience: usize,
    save_schedule: SaveSchedule,
    train_data: String,
    validation_data: String,
}

impl TrainApp {
    pub fn lr_schedule(&self) -> PlateauLearningRate {
        PlateauLearningRate::new(
            self.lr_schedule.initial_lr.into_inner(),
            self.lr_schedule.lr_scale.into_inner(),
            self.lr_schedule.lr_patience,
        )
    }

    fn run_epoch(
        &self,
        config: &Config,
        trainer: &mut Trainer<ConvClassifier>,
        states: &mut [TaggingState],
        is_training: bool,
        lr: f32,
    ) -> Fallible<ModelPerformance> {
        let epoch_type = if is_training { "train" } else { "validation" };

        let progress_bar = ProgressBar::new(states.len() as u64);
        progress_bar.set_style(ProgressStyle::default_bar().template(&format!(
            "[Time: {{elapsed_precise}}, ETA: {{eta_precise}}] {{bar}} {{percent}}% {} {{msg}}",
            epoch_type
        )));

        let perf = trainer.epoch_with_callback(
            states,
            config.model.batch_size,
            lr,
            is_training,
            |n_sentences, batch_perf| {
                progress_bar.inc(n_sentences as u64);
                progress_bar.set_message(&format!(
                    "batch loss: {:.4}, batch accuracy: {:.4}",
                    batch_perf.loss, batch_perf.accuracy
                ));
            },
        )?;

        progress_bar.finish_and_clear();

        Ok(perf)
    }

    fn train_model(
        &self,
        config: &Config,
        mut trainer: Trainer<ConvClassifier>,
        train_sentences: &[Sentence],
        validation_sentences: &[Sentence],
    ) -> Result<(), Error> {
        let mut train_states = train_sentences
            .iter()
            .map(|s| trainer.tagger().gold_state(s))
            .collect::<Vec<_>>();
        let mut validation_states = validation_sentences
            .iter()
            .map(|s| trainer.tagger().gold_state(s))
            .collect::<Vec<_>>();

        let mut bagging = Bagging::new(self.bagging_ratio.into_inner(), config.model.seed);

        let mut best_epoch = 0;
        let mut best_acc = 0.0;
        let mut last_acc = 0.0;

        let mut lr_schedule = self.lr_schedule();
        let mut save_scheduler = self
            .save_schedule
            .to_save_scheduler(config.model.parameters.clone());

        for epoch in 0..self.max_epochs.unwrap_or(usize::MAX) {
            let lr = lr_schedule.learning_rate(epoch, last_acc);

            let sample = bagging.sample(&mut train_states);
            let n_sample = sample.len();
            let perf = self.run_epoch(config, &mut trainer, sample, true, lr)?;

            info!(
                "Epoch {} (train, lr: {:.4}, sentences: {}): loss: {:.4}, acc: {:.4}",
                epoch, lr, n_sample, perf.loss, perf.accuracy
            );

            let perf = self.run_epoch(config, &mut trainer, &mut validation_states, false, lr)?;

            last_acc = perf.accuracy;
            if perf.accuracy > best_acc {
                best_epoch = epoch;
                best_acc = perf.accuracy;
            }

            save_scheduler
                .save(trainer.tagger().classifier(), epoch, perf.accuracy)
                .or_exit(format!("Cannot save model for epoch {}", epoch), 1);

            info!(
                "Epoch {} (validation): loss: {:.4}, acc: {:.4}, best epoch: {}, best acc: {:.4}",
                epoch, perf.loss, perf.accuracy, best_epoch, best_acc
            );

            if epoch - best_epoch == self.patience {
                info!(
                    "Lost my patience! Best epoch: {} with accuracy: {:.4}",
                    best_epoch, best_acc
                );
                break;
            }
        }

        Ok(())
    }
}

impl PosConfigApp for TrainApp {}

impl PosApp for TrainApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("train")
            .about("Train a tagger model")
            .arg(
                Arg::with_name(BAGGING_RATIO)
                    .long("bagging-ratio")
                    .value_name("RATIO")
                    .help("Fraction of the training sentences that is used in an epoch")
                    .default_value("1.0"),
            )
            .arg(
                Arg::with_name(CONTINUE)
                    .long("continue")
                    .takes_value(true)
                    .value_name("PARAMS")
                    .help("Continue training from a parameter file (e.g.: pos.model.epoch-50)"),
            )
            .arg(
                Arg::with_name(INITIAL_LR)
                    .long("lr")
                    .value_name("LR")
                    .help("Initial learning rate")
                    .default_value("0.01"),
            )
            .arg(
                Arg::with_name(LR_PATIENCE)
                    .long("lr-patience")
                    .value_name("N")
                    .help("Scale learning rate after N epochs without improvement")
                    .default_value("4"),
            )
            .arg(
                Arg::with_name(LR_SCALE)
                    .long("lr-scale")
                    .value_name("SCALE")
                    .help("Value to scale the learning rate by")
                    .default_value("0.5"),
            )
            .arg(
                Arg::with_name(MAX_EPOCHS)
                    .long("max-epochs")
                    .value_name("N")
                    .help("Train for at most N epochs"),
            )
            .arg(
                Arg::with_name(PATIENCE)
                    .long("patience")
                    .value_name("N")
                    .help("Maximum number of epochs without improvement")
                    .default_value("15"),
            )
            .arg(
                Arg::with_name(SAVE)
                    .long("save")
                    .value_name("SCHEDULE")
                    .help("Save the model after every epoch, the best model, or both")
                    .possible_values(&["best", "epoch", "epoch-and-best"])
                    .default_value("best"),
            )
            .arg(
                Arg::with_name(TRAIN_DATA)
                    .help("Training data")
                    .index(2)
                    .required(true),
            )
            .arg(
                Arg::with_name(VALIDATION_DATA)
                    .help("Validation data")
                    .index(3)
                    .required(true),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let bagging_ratio: NotNan<f32> = matches
            .value_of(BAGGING_RATIO)
            .unwrap()
            .parse()
            .or_exit("Cannot parse bagging ratio", 1);
        if bagging_ratio.into_inner() <= 0. || bagging_ratio.into_inner() > 1. {
            error!(
                "Bagging ratio should be in (0, 1], was {}",
                bagging_ratio.into_inner()
            );
            process::exit(1);
        }
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let initial_lr = matches
            .value_of(INITIAL_LR)
            .unwrap()
            .parse()
            .or_exit("Cannot parse initial learning rate", 1);
        let lr_patience = matches
            .value_of(LR_PATIENCE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse learning rate patience", 1);
        let lr_scale = matches
            .value_of(LR_SCALE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse learning rate scale", 1);
        let max_epochs = matches
            .value_of(MAX_EPOCHS)
            .map(|v| v.parse().or_exit("Cannot parse maximum number of epochs", 1));
        let parameters = matches.value_of(CONTINUE).map(ToOwned::to_owned);
        let patience = matches
            .value_of(PATIENCE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse patience", 1);
        let save_schedule = match matches.value_of(SAVE).unwrap() {
            "best" => SaveSchedule::Best,
            "epoch" => SaveSchedule::Epoch,
            "epoch-and-best" => SaveSchedule::EpochAndBest,
            _ => unreachable!(),
        };
        let train_data = matches.value_of(TRAIN_DATA).unwrap().into();
        let validation_data = matches.value_of(VALIDATION_DATA).unwrap().into();

        TrainApp {
            bagging_ratio,
            config,
            lr_schedule: LrSchedule {
                initial_lr,
                lr_patience,
                lr_scale,
            },
            max_epochs,
            parameters,
            patience,
            save_schedule,
            train_data,
            validation_data,
        }
    }

    fn run(&self) {
        let config_file = File::open(&self.config).or_exit(
            format!("Cannot open configuration file '{}'", self.config),
            1,
        );
        let mut config =
            Config::from_toml_read(config_file).or_exit("Cannot parse configuration", 1);
        config
            .relativize_paths(&self.config)
            .or_exit("Cannot relativize paths in configuration", 1);

        let labels = config.labeler.load_labels().or_exit(
            format!(
                "Cannot load label file '{}', use 'postagger prepare' to create it",
                config.labeler.labels
            ),
            1,
        );
        let lexicon = config
            .input
            .embeddings
            .load_lexicon(labels.len())
            .or_exit("Cannot load embeddings", 1);

        let train_sentences =
            read_sentences(&self.train_data).or_exit("Cannot read training data", 1);
        let validation_sentences =
            read_sentences(&self.validation_data).or_exit("Cannot read validation data", 1);

        let trainer =
            create_trainer(&config, self, &lexicon, labels).or_exit("Cannot construct trainer", 1);

        self.train_model(&config, trainer, &train_sentences, &validation_sentences)
            .or_exit("Error while training model", 1);
    }
}

fn read_sentences(path: &str) -> Fallible<Vec<Sentence>> {
    info!("Reading sentences from: {}", path);

    let f = File::open(path).map_err(|err| format_err!("Cannot open '{}': {}", path, err))?;
    let read_progress = ReadProgress::new(f)?;
    let reader = Reader::new(BufReader::new(read_progress));

    let sentences = reader.sentences().collect::<Result<Vec<_>, _>>()?;
    info!("Read {} sentences", sentences.len());

    Ok(sentences)
}

fn create_trainer<'a>(
    config: &Config,
    app: &TrainApp,
    lexicon: &'a Lexicon,
    labels: TagSet,
) -> Fallible<Trainer<'a, ConvClassifier>> {
    let assembler = FeatureAssembler::new(lexicon, config.input.feature_context.clone())?;

    let classifier = match app.parameters {
        Some(ref parameters) => {
            info!("Loading model parameters from: {}", parameters);
            let f = File::open(parameters)?;
            ConvClassifier::from_cbor_read(BufReader::new(f))?
        }
        None => {
            let mut rng = XorShiftRng::seed_from_u64(config.model.seed);
            ConvClassifier::new(
                assembler.offsets().len(),
                assembler.group_len(),
                labels.len(),
                &config.model.ngram_filters,
                config.model.n_filters,
                &mut rng,
            )?
        }
    };

    Ok(Trainer::new(Tagger::new(assembler, classifier, labels)?))
}
