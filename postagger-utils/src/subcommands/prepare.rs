use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::{App, Arg, ArgMatches};
use conllx::io::{ReadSentence, Reader};
use failure::Fallible;
use itertools::Itertools;
use log::info;
use stdinout::{Input, OrExit};

use postagger::serialization::CborWrite;
use postagger::{Collector, TagCollector, TagSet};
use postagger_utils::{Config, TomlRead};

use crate::traits::{PosApp, PosConfigApp};

static TRAIN_DATA: &str = "TRAIN_DATA";

pub struct PrepareApp {
    config: String,
    train_data: Option<String>,
}

impl PosConfigApp for PrepareApp {}

impl PosApp for PrepareApp {
    fn app() -> App<'static, 'static> {
        Self::config_app("prepare")
            .about("Prepare the tag set for training")
            .arg(Arg::with_name(TRAIN_DATA).help("Training data").index(2))
    }

    fn parse(matches: &ArgMatches) -> Self {
        let config = matches.value_of(Self::CONFIG).unwrap().into();
        let train_data = matches.value_of(TRAIN_DATA).map(ToOwned::to_owned);

        PrepareApp { config, train_data }
    }

    fn run(&self) {
        let config_file = File::open(&self.config).or_exit(
            format!("Cannot open configuration file '{}'", &self.config),
            1,
        );
        let mut config =
            Config::from_toml_read(config_file).or_exit("Cannot parse configuration", 1);
        config
            .relativize_paths(&self.config)
            .or_exit("Cannot relativize paths in configuration", 1);

        let input = Input::from(self.train_data.as_ref());
        let treebank_reader = Reader::new(
            input
                .buf_read()
                .or_exit("Cannot open corpus for reading", 1),
        );

        let mut collector = TagCollector::default();
        collect_sentences(&mut collector, treebank_reader);

        let tags = collector.into_tags();
        info!(
            "Collected {} tags: {}",
            tags.len(),
            tags.iter().join(" ")
        );

        write_labels(&config, &tags).or_exit("Cannot write labels", 1);
    }
}

fn collect_sentences<R>(collector: &mut TagCollector, reader: R)
where
    R: ReadSentence,
{
    for sentence in reader.sentences() {
        let sentence = sentence.or_exit("Cannot parse sentence", 1);
        collector
            .collect(&sentence)
            .or_exit("Cannot collect sentence", 1);
    }
}

fn write_labels(config: &Config, labels: &TagSet) -> Fallible<()> {
    let labels_path = Path::new(&config.labeler.labels);
    info!("Writing labels to: {:?}", labels_path);
    let mut f = BufWriter::new(File::create(labels_path)?);
    labels.to_cbor_write(&mut f)?;
    f.flush()?;
    Ok(())
}
