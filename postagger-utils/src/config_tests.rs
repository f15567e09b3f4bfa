use std::fs::File;

use lazy_static::lazy_static;
use postagger::Provider;

use super::{Config, Embedding, EmbeddingFormat, Embeddings, Input, Labeler, Model, TomlRead};

lazy_static! {
    static ref BASIC_LABELER_CHECK: Config = Config {
        labeler: Labeler {
            labels: "postagger.labels".to_owned(),
        },
        input: Input {
            feature_context: vec![-3, -2, -1, 0, 1, 2, 3],
            embeddings: Embeddings {
                word2vec: Some(Embedding {
                    filename: "word-vectors.bin".into(),
                    format: EmbeddingFormat::Word2Vec,
                }),
                fasttext: None,
                ambiguity: Some(Embedding {
                    filename: "ambiguity.fifu".into(),
                    format: EmbeddingFormat::FinalFusionMmap,
                }),
            },
        },
        model: Model {
            parameters: "postagger.model".to_owned(),
            ngram_filters: vec![1, 2],
            n_filters: 64,
            batch_size: 16,
            seed: 42,
        }
    };
}

#[test]
fn test_parse_config() {
    let f = File::open("testdata/postagger.conf").unwrap();
    let config = Config::from_toml_read(f).unwrap();
    assert_eq!(*BASIC_LABELER_CHECK, config);
}

#[test]
fn test_defaults() {
    let config = Config::from_toml_read(
        r#"
[labeler]
labels = "pos.labels"

[model]
parameters = "pos.model"
"#
        .as_bytes(),
    )
    .unwrap();

    assert_eq!(config.input.feature_context, vec![-2, -1, 0, 1, 2]);
    assert_eq!(config.input.embeddings, Embeddings::default());
    assert_eq!(config.model.ngram_filters, vec![1, 2, 3]);
    assert_eq!(config.model.n_filters, 64);
    assert_eq!(config.model.batch_size, 32);
}

#[test]
fn test_unknown_fields_are_rejected() {
    let config = Config::from_toml_read(
        r#"
[labeler]
labels = "pos.labels"
read_ahead = 10

[model]
parameters = "pos.model"
"#
        .as_bytes(),
    );

    assert!(config.is_err());
}

#[test]
fn test_relativize_paths() {
    let mut config = BASIC_LABELER_CHECK.clone();
    config.relativize_paths("testdata/postagger.conf").unwrap();

    let testdata = std::fs::canonicalize("testdata").unwrap();
    assert_eq!(
        config.labeler.labels,
        testdata.join("postagger.labels").to_str().unwrap()
    );
    assert_eq!(
        config.input.embeddings.word2vec.unwrap().filename,
        testdata.join("word-vectors.bin").to_str().unwrap()
    );
    assert_eq!(
        config.model.parameters,
        testdata.join("postagger.model").to_str().unwrap()
    );
}

#[test]
fn test_load_lexicon() {
    let embeddings = Embeddings {
        word2vec: Some(Embedding {
            filename: "testdata/word-vectors.bin".into(),
            format: EmbeddingFormat::Word2Vec,
        }),
        fasttext: None,
        ambiguity: Some(Embedding {
            filename: "testdata/ambiguity.bin".into(),
            format: EmbeddingFormat::Word2Vec,
        }),
    };

    let lexicon = embeddings.load_lexicon(4).unwrap();
    assert_eq!(lexicon.n_tags(), 4);
    assert_eq!(
        lexicon.providers().collect::<Vec<_>>(),
        vec![Provider::Word2Vec, Provider::AmbiguityClass]
    );
    assert_eq!(lexicon.dims(Provider::Word2Vec), Some(2));
    assert_eq!(lexicon.dims(Provider::AmbiguityClass), Some(3));
    assert_eq!(lexicon.embedding_dims(), 5);

    assert_eq!(
        &*lexicon
            .embedding(Provider::Word2Vec, Some("runs"))
            .unwrap(),
        &[0., 1.]
    );
    assert_eq!(
        &*lexicon
            .embedding(Provider::AmbiguityClass, Some("runs"))
            .unwrap(),
        &[0., 1., 0.]
    );
}

#[test]
fn test_load_lexicon_without_embeddings() {
    let lexicon = Embeddings::default().load_lexicon(2).unwrap();
    assert_eq!(lexicon.providers().count(), 0);
    assert_eq!(lexicon.embedding_dims(), 0);
}

#[test]
fn test_load_missing_embeddings() {
    let embedding = Embedding {
        filename: "testdata/missing.fifu".into(),
        format: EmbeddingFormat::FinalFusion,
    };

    assert!(embedding.load().is_err());
}

#[test]
fn test_format_mismatch_is_an_error() {
    // A word2vec file is not a finalfusion file.
    let embedding = Embedding {
        filename: "testdata/word-vectors.bin".into(),
        format: EmbeddingFormat::FinalFusion,
    };

    assert!(embedding.load().is_err());
}
