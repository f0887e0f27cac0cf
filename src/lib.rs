//! Truncated-BPTT training and top-k sampling for recurrent sequence models.
//!
//! This crate turns one long symbol sequence into ordered, state-continuous
//! truncated windows, drives a recurrent model through them with an
//! early-stopping training loop, and generates new sequences from the trained
//! parameters via top-k-filtered autoregressive decoding. It provides:
//! - a char-level [`vocab::Vocabulary`] built once from raw data
//! - corpus and synthetic [`data::SequenceSource`]s, the window partitioner
//!   and the epoch generator
//! - a [`trainer::Trainer`] threading hidden state across windows
//! - a [`generate::SamplingDecoder`] for stochastic generation
//! - a multi-layer GRU [`model::GruModel`] on candle implementing the model
//!   contract
//!
//! # Example
//!
//! ```no_run
//! use candle_core::Device;
//! use char_rnn_rs::prelude::*;
//!
//! let vocab = Vocabulary::build("the quick brown fox");
//! let source = CorpusSource::from_text("the quick brown fox", &vocab).unwrap();
//!
//! let model_config = ModelConfig::test();
//! let train_config = TrainConfig::char_default("model.safetensors");
//! let epochs = Epochs::new(
//!     source,
//!     train_config.num_epochs,
//!     model_config.stream_count,
//!     model_config.window_width,
//! )
//! .unwrap();
//!
//! let mut model = GruModel::new(&model_config, &Device::Cpu).unwrap();
//! let report = Trainer::new(&train_config).train(&mut model, epochs).unwrap();
//! println!("trained {} epochs", report.epochs_run);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod generate;
pub mod model;
pub mod trainer;
pub mod vocab;

pub use config::{GenerateConfig, ModelConfig, TrainConfig};
pub use data::{BoundaryPolicy, CorpusSource, Epochs, SequenceSource, SyntheticSource, Window, Windows};
pub use error::{CharRnnError, CharRnnResult};
pub use generate::{top_k_filter, GenerativeModel, SamplingDecoder};
pub use model::{GruModel, HiddenState};
pub use trainer::{Model, Trainer, TrainingReport};
pub use vocab::Vocabulary;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{GenerateConfig, ModelConfig, TrainConfig};
    pub use crate::data::{
        BoundaryPolicy, CorpusSource, Epochs, SequenceSource, SyntheticSource, Window, Windows,
    };
    pub use crate::error::{CharRnnError, CharRnnResult};
    pub use crate::generate::{GenerativeModel, SamplingDecoder};
    pub use crate::model::{GruModel, HiddenState};
    pub use crate::trainer::{Model, Trainer, TrainingReport};
    pub use crate::vocab::Vocabulary;
}
