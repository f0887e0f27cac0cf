//! End-to-end pipeline tests: source -> windows -> training -> checkpoint ->
//! generation, on a model small enough for CPU test runs.

use candle_core::Device;
use char_rnn_rs::prelude::*;

fn tiny_model_config(num_classes: usize) -> ModelConfig {
    ModelConfig {
        num_classes,
        hidden_size: 16,
        num_layers: 2,
        stream_count: 4,
        window_width: 4,
        learning_rate: 1e-2,
    }
}

#[test]
fn train_synthetic_sequence_and_report() {
    let config = tiny_model_config(2);
    let source = SyntheticSource::new(256, BoundaryPolicy::ZeroHistory, 42);
    let epochs = Epochs::new(source, 3, config.stream_count, config.window_width).unwrap();
    assert_eq!(epochs.class_count(), 2);

    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("binary.safetensors");
    let train_config = TrainConfig::new(3, 0.0, &checkpoint);

    let mut model = GruModel::new(&config, &Device::Cpu).unwrap();
    let report = Trainer::new(&train_config).train(&mut model, epochs).unwrap();

    assert_eq!(report.epochs_run, 3);
    assert!(!report.stopped_early);
    assert_eq!(report.epoch_losses.len(), 3);
    assert!(report.epoch_losses.iter().all(|l| l.is_finite()));
    assert!(checkpoint.exists());
}

#[test]
fn train_corpus_then_generate_from_checkpoint() {
    let corpus = "abcd".repeat(40);
    let vocab = Vocabulary::build(&corpus);
    let config = tiny_model_config(vocab.len());

    let source = CorpusSource::from_text(&corpus, &vocab).unwrap();
    let epochs = Epochs::new(source, 4, config.stream_count, config.window_width).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("corpus.safetensors");
    let train_config = TrainConfig::new(4, 0.0, &checkpoint);

    let mut model = GruModel::new(&config, &Device::Cpu).unwrap();
    Trainer::new(&train_config).train(&mut model, epochs).unwrap();

    // Generation reuses the trained parameters under a [1, 1] shape.
    let mut gen_model =
        GruModel::load(&config.for_generation(), &checkpoint, &Device::Cpu).unwrap();
    let decoder = SamplingDecoder::new(&GenerateConfig {
        num_chars: 25,
        top_k: 2,
        seed: Some(7),
    });
    let text = decoder.generate(&mut gen_model, &vocab).unwrap();

    assert_eq!(text.chars().count(), 26);
    assert!(text.chars().all(|c| "abcd".contains(c)));
}

#[test]
fn early_stop_persists_checkpoint() {
    let config = tiny_model_config(2);
    let source = SyntheticSource::new(256, BoundaryPolicy::ZeroHistory, 1);
    let epochs = Epochs::new(source, 50, config.stream_count, config.window_width).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("stop.safetensors");
    // Untrained cross-entropy on a 2-class task sits near ln(2); a huge
    // threshold stops after the first epoch.
    let train_config = TrainConfig::new(50, 100.0, &checkpoint);

    let mut model = GruModel::new(&config, &Device::Cpu).unwrap();
    let report = Trainer::new(&train_config).train(&mut model, epochs).unwrap();

    assert_eq!(report.epochs_run, 1);
    assert!(report.stopped_early);
    assert!(checkpoint.exists());
}
