//! Training loop driving a model through epochs of truncated windows.
//!
//! The loop owns two invariants the rest of the crate depends on:
//! - the hidden state fed into window k+1 is exactly the state returned from
//!   window k, and the first window of every epoch starts from no state;
//! - early stopping uses a strict `<` comparison on the epoch's mean loss,
//!   so a mean exactly at the threshold keeps training.
//!
//! Windows within an epoch are strictly sequential: each window's input state
//! is the previous window's output state, so no two windows of one epoch may
//! run concurrently. The model's `step` is the only heavy operation and is
//! invoked synchronously.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::TrainConfig;
use crate::data::{Epochs, SequenceSource, Window};
use crate::error::CharRnnResult;

/// Contract the training loop (and sampling decoder) places on a model.
///
/// `state` is `None` on the first window of an epoch, meaning "use the
/// model's default/zero initial state". The state value itself is opaque to
/// the loop; it is threaded between calls, never inspected.
pub trait Model {
    type State;

    /// Run one optimization step over a window, starting from the carried
    /// state, and return the step loss plus the state to carry forward.
    fn step(&mut self, window: &Window, state: Option<Self::State>)
        -> CharRnnResult<(f64, Self::State)>;

    /// Persist the model's parameters.
    fn save(&self, checkpoint: &Path) -> CharRnnResult<()>;
}

/// Outcome of a training run, reported for observability. Losses and epoch
/// indices are not used for control beyond the early-stop decision already
/// taken.
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    /// Mean loss per completed epoch, in order
    pub epoch_losses: Vec<f64>,
    /// Number of epochs actually run
    pub epochs_run: usize,
    /// Whether the stop threshold was crossed before the epochs ran out
    pub stopped_early: bool,
    /// Whether an external abort check ended the run
    pub aborted: bool,
}

/// Drives a [`Model`] through an epoch sequence, threading hidden state and
/// applying the early-stopping rule.
pub struct Trainer {
    stop_threshold: f64,
    checkpoint: PathBuf,
    abort_check: Option<Box<dyn Fn() -> bool>>,
}

impl Trainer {
    pub fn new(config: &TrainConfig) -> Self {
        Self {
            stop_threshold: config.stop_threshold,
            checkpoint: config.checkpoint.clone(),
            abort_check: None,
        }
    }

    /// Install an operator-driven cancellation check, polled before each
    /// window. Not required for correctness.
    pub fn with_abort_check(mut self, check: impl Fn() -> bool + 'static) -> Self {
        self.abort_check = Some(Box::new(check));
        self
    }

    /// Train until the epochs are exhausted or an epoch's mean loss drops
    /// strictly below the stop threshold, then persist the model.
    ///
    /// Step failures propagate immediately and abort the run; nothing is
    /// saved in that case.
    pub fn train<M, S>(&self, model: &mut M, epochs: Epochs<S>) -> CharRnnResult<TrainingReport>
    where
        M: Model,
        S: SequenceSource,
    {
        let mut report = TrainingReport::default();

        'epochs: for (epoch_idx, windows) in epochs.enumerate() {
            let windows = windows?;
            let mut carried: Option<M::State> = None;
            let mut total_loss = 0.0;
            let mut window_count = 0usize;

            for window in windows {
                if let Some(check) = &self.abort_check {
                    if check() {
                        info!(epoch = epoch_idx, "training aborted by external check");
                        report.aborted = true;
                        break 'epochs;
                    }
                }
                let (loss, state) = model.step(&window, carried.take())?;
                total_loss += loss;
                window_count += 1;
                carried = Some(state);
            }

            let mean_loss = if window_count == 0 {
                0.0
            } else {
                total_loss / window_count as f64
            };
            info!(
                epoch = epoch_idx,
                mean_loss,
                windows = window_count,
                "epoch complete"
            );
            report.epoch_losses.push(mean_loss);
            report.epochs_run += 1;

            if mean_loss < self.stop_threshold {
                info!(epoch = epoch_idx, "mean loss below threshold, stopping");
                report.stopped_early = true;
                break;
            }
        }

        model.save(&self.checkpoint)?;
        Ok(report)
    }
}
