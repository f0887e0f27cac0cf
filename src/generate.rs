//! Stochastic autoregressive generation from a trained model.
//!
//! The decoder seeds with one uniformly drawn symbol, then repeatedly feeds
//! the last produced symbol through the model as a `[1, 1]` window, applies
//! top-k filtering to the returned class distribution, samples the next
//! symbol and carries the recurrent state forward. The seed draw and every
//! sample use one seedable RNG over the vocabulary's ordered index range, so
//! a fixed seed reproduces the full output.
//!
//! Requires a model configured with stream count 1 and window width 1; the
//! same trained parameters are loadable under that reshaped configuration
//! (see [`crate::model::GruModel::load`]).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::GenerateConfig;
use crate::data::Window;
use crate::error::{CharRnnError, CharRnnResult};
use crate::trainer::Model;
use crate::vocab::Vocabulary;

/// A [`Model`] that can also expose its output distribution, as needed for
/// sampling.
pub trait GenerativeModel: Model {
    /// Run inference over a window and return the per-class probability
    /// distribution for the final position, plus the updated state.
    fn predict(
        &mut self,
        window: &Window,
        state: Option<Self::State>,
    ) -> CharRnnResult<(Vec<f32>, Self::State)>;
}

/// Top-k-filtered autoregressive sampling decoder.
pub struct SamplingDecoder {
    num_chars: usize,
    top_k: usize,
    seed: Option<u64>,
}

impl SamplingDecoder {
    pub fn new(config: &GenerateConfig) -> Self {
        Self {
            num_chars: config.num_chars,
            top_k: config.top_k,
            seed: config.seed,
        }
    }

    /// Generate `num_chars` symbols after a random seed symbol and decode the
    /// whole output (seed included) through the vocabulary.
    pub fn generate<M: GenerativeModel>(
        &self,
        model: &mut M,
        vocab: &Vocabulary,
    ) -> CharRnnResult<String> {
        let indices = self.generate_indices(model, vocab.len())?;
        vocab.decode(&indices)
    }

    /// Generate raw symbol indices: the seed plus `num_chars` sampled
    /// symbols, each in `[0, class_count)`.
    pub fn generate_indices<M: GenerativeModel>(
        &self,
        model: &mut M,
        class_count: usize,
    ) -> CharRnnResult<Vec<u32>> {
        if class_count == 0 {
            return Err(CharRnnError::invalid_config(
                "cannot sample from an empty vocabulary",
            ));
        }
        if self.top_k == 0 || self.top_k > class_count {
            return Err(CharRnnError::invalid_config(format!(
                "top_k must be in [1, {class_count}], got {}",
                self.top_k
            )));
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut current = rng.gen_range(0..class_count as u32);
        let mut output = Vec::with_capacity(self.num_chars + 1);
        output.push(current);
        let mut carried: Option<M::State> = None;

        for _ in 0..self.num_chars {
            let window = Window::single(current);
            let (mut probs, state) = model.predict(&window, carried.take())?;
            if probs.len() != class_count {
                return Err(CharRnnError::data(format!(
                    "model returned {} class probabilities, expected {class_count}",
                    probs.len()
                )));
            }
            top_k_filter(&mut probs, self.top_k);
            current = sample_index(&mut rng, &probs);
            output.push(current);
            carried = Some(state);
        }

        debug!(symbols = output.len(), top_k = self.top_k, "generation done");
        Ok(output)
    }
}

/// Restrict a distribution to its k highest-probability classes: everything
/// else becomes exactly 0 and the retained mass is renormalized to sum to 1.
pub fn top_k_filter(probs: &mut [f32], k: usize) {
    if k < probs.len() {
        let mut order: Vec<usize> = (0..probs.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            probs[b]
                .partial_cmp(&probs[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for &i in &order[k..] {
            probs[i] = 0.0;
        }
    }

    let sum: f32 = probs.iter().sum();
    if sum > 0.0 {
        for p in probs.iter_mut() {
            *p /= sum;
        }
    } else {
        // Degenerate input (all zeros): fall back to uniform so sampling
        // still terminates.
        let uniform = 1.0 / probs.len() as f32;
        for p in probs.iter_mut() {
            *p = uniform;
        }
    }
}

/// Draw one index from a normalized distribution by inverting the CDF.
fn sample_index(rng: &mut StdRng, probs: &[f32]) -> u32 {
    let draw: f32 = rng.gen();
    let mut cumulative = 0.0;
    let mut last_nonzero = 0;
    for (i, &p) in probs.iter().enumerate() {
        if p > 0.0 {
            last_nonzero = i;
            cumulative += p;
            if draw < cumulative {
                return i as u32;
            }
        }
    }
    // Rounding left the draw above the accumulated mass; the highest-index
    // retained class takes it.
    last_nonzero as u32
}
