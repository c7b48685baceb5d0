mod cache;
mod collator;
mod concator;
mod config;
mod dataset;
mod features;
mod tokenizer;
mod traits;
mod transform;

pub use cache::{
    load_and_cache_doc_examples, load_and_cache_examples, load_features, save_features,
    CacheError, FeatureLoadOptions,
};
pub use collator::{collate_indices, BatchIter, Collate, DocBatch, RetrievalBatch, Seq2SeqBatch};
pub use concator::Concator;
pub use config::{ConfigError, DatasetConfig, SpecialTokenIds, SpecialTokenNames};
pub use dataset::{
    DocExample, RetrievalDocDataset, RetrievalExample, RetrievalSeq2SeqDataset, Seq2SeqDataset,
    Seq2SeqExample,
};
pub use features::{build_doc_features, build_seq2seq_features, DocFeature, Seq2SeqFeature};
pub use tokenizer::{load_tokenizer, TextTokenizer};
pub use traits::IndexedDataset;
pub use transform::ExampleTransform;
