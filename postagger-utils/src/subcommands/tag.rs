use std::fs::File;
use std::io::{BufReader, BufWriter};

use clap::{App, Arg, ArgMatches};
use conllx::io::{ReadSentence, Reader, WriteSentence, Writer};
use failure::Fallible;
use log::info;
use stdinout::{Input, OrExit, Output};

use postagger::serialization::CborRead;
use postagger::{ConvClassifier, FeatureAssembler, Lexicon, TagSet, Tagger};
use postagger_utils::{Config, SentProcessor, TaggerSpeed, TomlRead};

use crate::traits::{PosApp, PosConfigApp};

static BATCH_SIZE: &str = "BATCH_SIZE";
static INPUT: &str = "INPUT";
static OUTPUT: &str = "OUTPUT";
static READ_AHEAD: &str = "READ_AHEAD";

pub struct TagApp {
    batch_size: usize,
    config: String,
    input: Option<String>,
    output: Option<String>,
    read_ahead: usize,
}

impl TagApp {
    fn process<R, W>(&self, tagger: &Tagger<ConvClassifier>, read: R, write: W)
    where
        R: ReadSentence,
        W: WriteSentence,
    {
        let mut speed = TaggerSpeed::new();

        let mut sent_proc = SentProcessor::new(tagger, write, self.batch_size, self.read_ahead);

        for sentence in read.sentences() {
            let sentence = sentence.or_exit("Cannot parse sentence", 1);
            sent_proc
                .process(sentence)
                .or_exit("Error processing sentence", 1);

            speed.count_sentence()
        }
    }
}

impl PosConfigApp for TagApp {}

impl PosApp for TagApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("tag")
            .about("Tag sentences with a trained model")
            .arg(
                Arg::with_name(BATCH_SIZE)
                    .help("Batch size")
                    .long("batchsize")
                    .default_value("256"),
            )
            .arg(
                Arg::with_name(INPUT)
                    .help("Input data")
                    .long("input")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(OUTPUT)
                    .help("Output data")
                    .long("output")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(READ_AHEAD)
                    .help("Readahead (number of batches)")
                    .long("readahead")
                    .default_value("10"),
            )
    }

    fn parse(matches: &ArgMatches) -> Self {
        let batch_size = matches
            .value_of(BATCH_SIZE)
            .unwrap()
            .parse()
            .or_exit("Cannot parse batch size", 1);
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let input = matches.value_of(INPUT).map(ToOwned::to_owned);
        let output = matches.value_of(OUTPUT).map(ToOwned::to_owned);
        let read_ahead = matches
            .value_of(READ_AHEAD)
            .unwrap()
            .parse()
            .or_exit("Cannot parse number of batches to read ahead", 1);

        TagApp {
            batch_size,
            config,
            input,
            output,
            read_ahead,
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
            format!("Cannot load label file '{}'", config.labeler.labels),
            1,
        );
        let lexicon = config
            .input
            .embeddings
            .load_lexicon(labels.len())
            .or_exit("Cannot load embeddings", 1);
        let tagger =
            load_tagger(&config, &lexicon, labels).or_exit("Cannot construct tagger", 1);

        let input = Input::from(self.input.as_ref());
        let reader = Reader::new(input.buf_read().or_exit("Cannot open input for reading", 1));

        let output = Output::from(self.output.as_ref());
        let writer = Writer::new(BufWriter::new(
            output.write().or_exit("Cannot open output for writing", 1),
        ));

        self.process(&tagger, reader, writer);
    }
}

fn load_tagger<'a>(
    config: &Config,
    lexicon: &'a Lexicon,
    labels: TagSet,
) -> Fallible<Tagger<'a, ConvClassifier>> {
    info!("Loading model parameters from: {}", config.model.parameters);
    let f = File::open(&config.model.parameters)?;
    let classifier = ConvClassifier::from_cbor_read(BufReader::new(f))?;

    let assembler = FeatureAssembler::new(lexicon, config.input.feature_context.clone())?;
    Ok(Tagger::new(assembler, classifier, labels)?)
}
