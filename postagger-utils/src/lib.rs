mod config;
pub use crate::config::{Config, Embedding, EmbeddingFormat, Embeddings, Input, Labeler, Model};

mod logging;
pub use crate::logging::logger_builder;

mod progress;
pub use crate::progress::{ReadProgress, TaggerSpeed};

mod save;
pub use crate::save::{SaveSchedule, SaveScheduler};

mod sent_proc;
pub use crate::sent_proc::SentProcessor;

mod serialization;
pub use crate::serialization::TomlRead;

#[cfg(test)]
mod config_tests;
