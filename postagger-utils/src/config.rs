use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use failure::{format_err, Error, Fallible};
use finalfusion::compat::fasttext::ReadFastText;
use finalfusion::compat::word2vec::ReadWord2Vec;
use finalfusion::embeddings::Embeddings as FiFuEmbeddings;
use finalfusion::prelude::*;
use finalfusion::storage::{NdArray, StorageViewWrap};
use finalfusion::vocab::{FastTextSubwordVocab, SimpleVocab};
use log::info;
use serde_derive::{Deserialize, Serialize};

use postagger::serialization::CborRead;
use postagger::{
    EmbeddingProvider, FinalfusionEmbeddings, Lexicon, Provider, TagSet, DEFAULT_CONTEXT,
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub labeler: Labeler,
    pub input: Input,
    pub model: Model,
}

impl Config {
    /// Make configuration paths relative to the configuration file.
    pub fn relativize_paths<P>(&mut self, config_path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let config_path = config_path.as_ref();

        self.labeler.labels = relativize_path(config_path, &self.labeler.labels)?;
        for embedding in self.input.embeddings.iter_mut() {
            embedding.filename = relativize_path(config_path, &embedding.filename)?;
        }
        self.model.parameters = relativize_path(config_path, &self.model.parameters)?;

        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Labeler {
    /// Tag set file.
    pub labels: String,
}

impl Labeler {
    pub fn load_labels(&self) -> Fallible<TagSet> {
        let labels_path = Path::new(&self.labels);

        info!("Loading labels from: {:?}", labels_path);

        let f = File::open(labels_path)?;
        TagSet::from_cbor_read(BufReader::new(f))
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Input {
    /// Offsets of the tokens that are used as features, relative to the
    /// token that is tagged.
    #[serde(default = "default_feature_context")]
    pub feature_context: Vec<isize>,

    #[serde(default)]
    pub embeddings: Embeddings,
}

fn default_feature_context() -> Vec<isize> {
    DEFAULT_CONTEXT.to_vec()
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Embeddings {
    pub word2vec: Option<Embedding>,
    pub fasttext: Option<Embedding>,
    pub ambiguity: Option<Embedding>,
}

impl Embeddings {
    /// Look up the embedding configuration of a provider slot.
    pub fn get(&self, provider: Provider) -> Option<&Embedding> {
        match provider {
            Provider::Word2Vec => self.word2vec.as_ref(),
            Provider::FastText => self.fasttext.as_ref(),
            Provider::AmbiguityClass => self.ambiguity.as_ref(),
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Embedding> {
        self.word2vec
            .iter_mut()
            .chain(self.fasttext.iter_mut())
            .chain(self.ambiguity.iter_mut())
    }

    /// Construct a lexicon for `n_tags` tags with all configured
    /// embeddings.
    pub fn load_lexicon(&self, n_tags: usize) -> Fallible<Lexicon> {
        let mut lexicon = Lexicon::new(n_tags)?;

        for &provider in Provider::ALL.iter() {
            if let Some(embedding) = self.get(provider) {
                info!(
                    "Loading {} embeddings from: {}",
                    provider, embedding.filename
                );
                lexicon = lexicon.with_provider(provider, embedding.load()?)?;
            }
        }

        Ok(lexicon)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Embedding {
    pub filename: String,
    pub format: EmbeddingFormat,
}

impl Embedding {
    pub fn load(&self) -> Fallible<Box<dyn EmbeddingProvider>> {
        let f = File::open(&self.filename)
            .map_err(|err| format_err!("Cannot open '{}': {}", self.filename, err))?;
        let mut reader = BufReader::new(f);

        let provider: Box<dyn EmbeddingProvider> = match self.format {
            EmbeddingFormat::FinalFusion => {
                let embeds: FiFuEmbeddings<VocabWrap, StorageViewWrap> =
                    ReadEmbeddings::read_embeddings(&mut reader)?;
                Box::new(FinalfusionEmbeddings::from(embeds))
            }
            EmbeddingFormat::FinalFusionMmap => {
                let embeds: FiFuEmbeddings<VocabWrap, StorageViewWrap> =
                    MmapEmbeddings::mmap_embeddings(&mut reader)?;
                Box::new(FinalfusionEmbeddings::from(embeds))
            }
            EmbeddingFormat::Word2Vec => {
                let embeds: FiFuEmbeddings<SimpleVocab, NdArray> =
                    ReadWord2Vec::read_word2vec_binary(&mut reader)?;
                Box::new(FinalfusionEmbeddings::from(embeds))
            }
            EmbeddingFormat::FastText => {
                let embeds: FiFuEmbeddings<FastTextSubwordVocab, NdArray> =
                    ReadFastText::read_fasttext(&mut reader)?;
                Box::new(FinalfusionEmbeddings::from(embeds))
            }
        };

        Ok(provider)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EmbeddingFormat {
    #[serde(rename = "finalfusion")]
    FinalFusion,

    #[serde(rename = "finalfusion-mmap")]
    FinalFusionMmap,

    #[serde(rename = "word2vec")]
    Word2Vec,

    #[serde(rename = "fasttext")]
    FastText,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Model {
    /// Model parameter file.
    pub parameters: String,

    /// Widths of the n-gram filter banks.
    #[serde(default = "default_ngram_filters")]
    pub ngram_filters: Vec<usize>,

    /// Number of filters per filter bank.
    #[serde(default = "default_n_filters")]
    pub n_filters: usize,

    /// Number of sentences per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seed for parameter initialization and bagging.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_ngram_filters() -> Vec<usize> {
    vec![1, 2, 3]
}

fn default_n_filters() -> usize {
    64
}

fn default_batch_size() -> usize {
    32
}

fn default_seed() -> u64 {
    42
}

fn relativize_path(config_path: &Path, filename: &str) -> Result<String, Error> {
    if filename.is_empty() {
        return Ok(filename.to_owned());
    }

    let path = Path::new(&filename);

    // Don't touch absolute paths.
    if path.is_absolute() {
        return Ok(filename.to_owned());
    }

    let abs_config_path = config_path.canonicalize()?;
    Ok(abs_config_path
        .parent()
        .ok_or_else(|| {
            format_err!(
                "Cannot get parent path of the configuration file: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .join(path)
        .to_str()
        .ok_or_else(|| {
            format_err!(
                "Cannot convert parent path to string: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .to_owned())
}
