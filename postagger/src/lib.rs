mod classifier;
pub use crate::classifier::{Classifier, ConvClassifier, ModelPerformance};

mod collector;
pub use crate::collector::{Collector, TagCollector};

mod embeddings;
pub use crate::embeddings::FinalfusionEmbeddings;

mod error;
pub use crate::error::{ConfigError, DataError, LexiconError, StateError};

mod features;
pub use crate::features::{FeatureAssembler, DEFAULT_CONTEXT};

mod lexicon;
pub use crate::lexicon::{EmbeddingProvider, Lexicon, Provider};

pub mod lr;

pub mod serialization;

mod state;
pub use crate::state::{Accuracy, TaggingState};

mod tagger;
pub use crate::tagger::{Tag, Tagger};

mod tags;
pub use crate::tags::TagSet;

mod trainer;
pub use crate::trainer::{Bagging, Trainer};
