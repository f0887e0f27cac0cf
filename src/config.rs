//! Configuration for models, training runs and generation.
//!
//! Centralizes hyperparameters for reproducibility and easy experimentation.
//! Configs serialize to JSON so a run can be reconstructed from disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CharRnnError, CharRnnResult};

/// Configuration for a recurrent sequence model.
///
/// A model is constructed for a fixed window shape: `stream_count` parallel
/// streams, each `window_width` positions wide. Training and generation use
/// differently shaped models over the same parameters (generation is
/// `stream_count = 1`, `window_width = 1`; see [`ModelConfig::for_generation`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of output classes (vocabulary size)
    pub num_classes: usize,
    /// Number of recurrent units in each hidden layer
    pub hidden_size: usize,
    /// Number of stacked hidden layers
    pub num_layers: usize,
    /// Number of sequences simultaneously propagated through the network
    pub stream_count: usize,
    /// Length of each truncated window, same as the number of
    /// truncated-backprop steps
    pub window_width: usize,
    /// Learning rate for the AdamW optimizer
    pub learning_rate: f64,
}

impl ModelConfig {
    /// Character-level configuration matching the reference training run.
    pub fn char_default(num_classes: usize) -> Self {
        Self {
            num_classes,
            hidden_size: 1024,
            num_layers: 2,
            stream_count: 256,
            window_width: 256,
            learning_rate: 1e-4,
        }
    }

    /// Configuration for the synthetic binary-sequence task.
    pub fn binary_sequence() -> Self {
        Self {
            num_classes: 2,
            hidden_size: 64,
            num_layers: 1,
            stream_count: 200,
            window_width: 5,
            learning_rate: 1e-4,
        }
    }

    /// Minimal configuration for unit tests.
    pub fn test() -> Self {
        Self {
            num_classes: 8,
            hidden_size: 16,
            num_layers: 2,
            stream_count: 2,
            window_width: 4,
            learning_rate: 1e-2,
        }
    }

    /// The same parameters reshaped for autoregressive generation:
    /// one stream, one position per step.
    pub fn for_generation(&self) -> Self {
        Self {
            stream_count: 1,
            window_width: 1,
            ..self.clone()
        }
    }

    /// Validate the configuration, failing fast before any tensor is built.
    pub fn validate(&self) -> CharRnnResult<()> {
        if self.num_classes == 0 {
            return Err(CharRnnError::invalid_config("num_classes must be positive"));
        }
        if self.hidden_size == 0 {
            return Err(CharRnnError::invalid_config("hidden_size must be positive"));
        }
        if self.num_layers == 0 {
            return Err(CharRnnError::invalid_config("num_layers must be positive"));
        }
        if self.stream_count == 0 {
            return Err(CharRnnError::invalid_config(
                "stream_count must be positive",
            ));
        }
        if self.window_width == 0 {
            return Err(CharRnnError::invalid_config(
                "window_width must be positive",
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(CharRnnError::invalid_config(
                "learning_rate must be positive",
            ));
        }
        Ok(())
    }
}

/// Configuration for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Number of epochs to run at most
    pub num_epochs: usize,
    /// Stop training once an epoch's mean loss drops strictly below this.
    /// Equality at the threshold does not stop.
    pub stop_threshold: f64,
    /// Path the trained parameters are saved to
    pub checkpoint: PathBuf,
}

impl TrainConfig {
    pub fn new(num_epochs: usize, stop_threshold: f64, checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            num_epochs,
            stop_threshold,
            checkpoint: checkpoint.into(),
        }
    }

    /// Defaults matching the reference run: 500 epochs, stop below 0.5.
    pub fn char_default(checkpoint: impl Into<PathBuf>) -> Self {
        Self::new(500, 0.5, checkpoint)
    }

    /// Minimal configuration for unit tests.
    pub fn test(checkpoint: impl Into<PathBuf>) -> Self {
        Self::new(3, 0.0, checkpoint)
    }

    /// Write the config as JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> CharRnnResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a config back from JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> CharRnnResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Configuration for the sampling decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Number of symbols to generate after the seed symbol
    pub num_chars: usize,
    /// Keep only the k highest-probability classes when sampling
    pub top_k: usize,
    /// RNG seed; `None` draws a fresh seed from the OS
    pub seed: Option<u64>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            num_chars: 100,
            top_k: 5,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_presets() {
        assert!(ModelConfig::char_default(128).validate().is_ok());
        assert!(ModelConfig::binary_sequence().validate().is_ok());
        assert!(ModelConfig::test().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_dims() {
        let mut config = ModelConfig::test();
        config.stream_count = 0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::test();
        config.window_width = 0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::test();
        config.num_layers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_for_generation_reshapes_only_batching() {
        let config = ModelConfig::char_default(97);
        let gen = config.for_generation();

        assert_eq!(gen.stream_count, 1);
        assert_eq!(gen.window_width, 1);
        assert_eq!(gen.num_classes, config.num_classes);
        assert_eq!(gen.hidden_size, config.hidden_size);
        assert_eq!(gen.num_layers, config.num_layers);
    }

    #[test]
    fn test_train_config_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");

        let config = TrainConfig::char_default("model.safetensors");
        config.to_json_file(&path).unwrap();
        let loaded = TrainConfig::from_json_file(&path).unwrap();

        assert_eq!(loaded.num_epochs, config.num_epochs);
        assert_eq!(loaded.stop_threshold, config.stop_threshold);
        assert_eq!(loaded.checkpoint, config.checkpoint);
    }
}
