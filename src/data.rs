//! Sequence data pipeline for truncated-backprop training.
//!
//! Turns one long `(input, target)` index sequence into ordered,
//! state-continuous truncated windows:
//! - [`SequenceSource`] - produces one raw sequence pair per epoch
//! - [`CorpusSource`] - fixed pre-encoded corpus, same pair every epoch
//! - [`SyntheticSource`] - stochastic binary-sequence generator, fresh pair
//!   per epoch
//! - [`Windows`] - lazy partitioner slicing a pair into `[B, T]` windows
//! - [`Epochs`] - yields one `Windows` per configured epoch
//!
//! Windows within an epoch are emitted in strictly increasing time order per
//! stream; concatenating them per stream reproduces the original slice except
//! for the discarded trailing remainder. Losing that ordering silently
//! corrupts long-range learning, so the tests pin it down.
//!
//! # Example
//!
//! ```
//! use char_rnn_rs::data::Windows;
//!
//! let x: Vec<u32> = (1..=12).collect();
//! let y: Vec<u32> = (1..=12).map(|v| v * 10).collect();
//! let mut windows = Windows::partition(&x, &y, 4, 2).unwrap();
//!
//! let first = windows.next().unwrap();
//! assert_eq!(first.x_row(0), &[1, 2]);
//! assert_eq!(first.x_row(3), &[10, 11]);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{CharRnnError, CharRnnResult};
use crate::vocab::Vocabulary;

/// One truncated time-slice of all streams: a pair of `[streams, width]`
/// integer matrices, stored row-major. The unit fed to one optimization or
/// inference step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    x: Vec<u32>,
    y: Vec<u32>,
    streams: usize,
    width: usize,
}

impl Window {
    pub fn new(x: Vec<u32>, y: Vec<u32>, streams: usize, width: usize) -> CharRnnResult<Self> {
        if x.len() != streams * width || y.len() != x.len() {
            return Err(CharRnnError::shape_mismatch(
                format!("[{streams}, {width}]"),
                format!("x: {}, y: {}", x.len(), y.len()),
            ));
        }
        Ok(Self {
            x,
            y,
            streams,
            width,
        })
    }

    /// A `[1, 1]` window holding a single symbol, as used by the sampling
    /// decoder. The target position is unused during inference.
    pub fn single(symbol: u32) -> Self {
        Self {
            x: vec![symbol],
            y: vec![0],
            streams: 1,
            width: 1,
        }
    }

    pub fn streams(&self) -> usize {
        self.streams
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Input matrix, row-major `[streams, width]`.
    pub fn x(&self) -> &[u32] {
        &self.x
    }

    /// Target matrix, row-major `[streams, width]`.
    pub fn y(&self) -> &[u32] {
        &self.y
    }

    /// Input row for one stream.
    pub fn x_row(&self, stream: usize) -> &[u32] {
        &self.x[stream * self.width..(stream + 1) * self.width]
    }

    /// Target row for one stream.
    pub fn y_row(&self, stream: usize) -> &[u32] {
        &self.y[stream * self.width..(stream + 1) * self.width]
    }
}

/// Lazy, finite, one-pass partitioner over one sequence pair.
///
/// Lays the pair out as a `streams x per_stream` grid (row `i` holds raw
/// positions `[i * per_stream, (i + 1) * per_stream)`), then slices the grid
/// into `floor(per_stream / width)` column blocks of `width` positions each.
/// Trailing symbols that do not fill a full stream, and trailing columns that
/// do not fill a full window, are discarded.
///
/// Restart by partitioning the same pair again, not by rewinding the
/// exhausted iterator.
pub struct Windows {
    grid_x: Vec<u32>,
    grid_y: Vec<u32>,
    streams: usize,
    per_stream: usize,
    width: usize,
    num_windows: usize,
    next: usize,
}

impl Windows {
    /// Partition a sequence pair into `[streams, width]` windows.
    ///
    /// Configuration errors are raised eagerly, before any window is
    /// yielded. A pair long enough for the streams but too short for a
    /// single window is not an error; it yields an empty iterator.
    pub fn partition(x: &[u32], y: &[u32], streams: usize, width: usize) -> CharRnnResult<Self> {
        if streams == 0 {
            return Err(CharRnnError::invalid_config("stream count must be positive"));
        }
        if width == 0 {
            return Err(CharRnnError::invalid_config("window width must be positive"));
        }
        if x.len() != y.len() {
            return Err(CharRnnError::data(format!(
                "input and target lengths differ: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        if streams > x.len() {
            return Err(CharRnnError::invalid_config(format!(
                "stream count {} exceeds sequence length {}",
                streams,
                x.len()
            )));
        }

        let per_stream = x.len() / streams;
        let num_windows = per_stream / width;

        // Row i of the grid is the i-th contiguous slice of the raw
        // sequence. Since rows are contiguous, the grid is just the raw
        // data truncated to streams * per_stream.
        let grid_x = x[..streams * per_stream].to_vec();
        let grid_y = y[..streams * per_stream].to_vec();

        Ok(Self {
            grid_x,
            grid_y,
            streams,
            per_stream,
            width,
            num_windows,
            next: 0,
        })
    }

    /// Total number of windows this partitioner will emit.
    pub fn num_windows(&self) -> usize {
        self.num_windows
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.num_windows {
            return None;
        }
        let offset = self.next * self.width;
        let mut x = Vec::with_capacity(self.streams * self.width);
        let mut y = Vec::with_capacity(self.streams * self.width);
        for stream in 0..self.streams {
            let start = stream * self.per_stream + offset;
            x.extend_from_slice(&self.grid_x[start..start + self.width]);
            y.extend_from_slice(&self.grid_y[start..start + self.width]);
        }
        self.next += 1;
        Some(Window {
            x,
            y,
            streams: self.streams,
            width: self.width,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_windows - self.next;
        (remaining, Some(remaining))
    }
}

/// Produces one raw `(input, target)` index-sequence pair per epoch.
pub trait SequenceSource {
    /// Number of distinct symbol classes in the sequences.
    fn class_count(&self) -> usize;

    /// The sequence pair for the next epoch. A fixed corpus returns the same
    /// pair every time; a synthetic source regenerates.
    fn next_pair(&mut self) -> (Vec<u32>, Vec<u32>);
}

/// Fixed pre-encoded corpus: input is the text, target is the text shifted
/// one position (next-symbol prediction). The same pair every epoch.
#[derive(Debug, Clone)]
pub struct CorpusSource {
    x: Vec<u32>,
    y: Vec<u32>,
    class_count: usize,
}

impl CorpusSource {
    /// Encode a corpus against a vocabulary and derive next-symbol targets.
    pub fn from_text(text: &str, vocab: &Vocabulary) -> CharRnnResult<Self> {
        let encoded = vocab.encode(text)?;
        if encoded.len() < 2 {
            return Err(CharRnnError::data(
                "corpus must contain at least two symbols",
            ));
        }
        let x = encoded[..encoded.len() - 1].to_vec();
        let y = encoded[1..].to_vec();
        Ok(Self {
            x,
            y,
            class_count: vocab.len(),
        })
    }

    /// Use an already-aligned pair of equal-length index sequences.
    pub fn from_pair(x: Vec<u32>, y: Vec<u32>, class_count: usize) -> CharRnnResult<Self> {
        if x.len() != y.len() {
            return Err(CharRnnError::data(format!(
                "input and target lengths differ: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { x, y, class_count })
    }
}

impl SequenceSource for CorpusSource {
    fn class_count(&self) -> usize {
        self.class_count
    }

    fn next_pair(&mut self) -> (Vec<u32>, Vec<u32>) {
        (self.x.clone(), self.y.clone())
    }
}

/// How the synthetic generator treats target positions whose input history
/// (t-3, t-8) would index before the sequence start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Out-of-range history counts as 0 and contributes no adjustment.
    /// The default.
    ZeroHistory,
    /// Negative offsets wrap to the tail of the sequence, modulo its
    /// length.
    Wrap,
}

/// Stochastic binary-sequence generator, regenerated each epoch.
///
/// Input symbols are i.i.d. fair coin flips. The target at position t has
/// base probability 0.5 of being 1, increased by 0.5 if `input[t-3] == 1` and
/// decreased by 0.25 if `input[t-8] == 1`; both conditions together give
/// 0.75. The target is then drawn as a Bernoulli trial with that probability,
/// so a model that learns the t-3 and t-8 dependencies can push cross-entropy
/// loss measurably below the memoryless baseline.
#[derive(Debug)]
pub struct SyntheticSource {
    sequence_len: usize,
    policy: BoundaryPolicy,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(sequence_len: usize, policy: BoundaryPolicy, seed: u64) -> Self {
        Self {
            sequence_len,
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Input at the (possibly negative) history offset, under the configured
    /// boundary policy.
    fn history(&self, x: &[u32], t: usize, offset: usize) -> u32 {
        if t >= offset {
            x[t - offset]
        } else {
            match self.policy {
                BoundaryPolicy::ZeroHistory => 0,
                // Modulo keeps the tail lookup in range even when the
                // sequence is shorter than the offset.
                BoundaryPolicy::Wrap => x[(t + x.len() - offset % x.len()) % x.len()],
            }
        }
    }
}

impl SequenceSource for SyntheticSource {
    fn class_count(&self) -> usize {
        2
    }

    fn next_pair(&mut self) -> (Vec<u32>, Vec<u32>) {
        let x: Vec<u32> = (0..self.sequence_len)
            .map(|_| self.rng.gen_range(0..2u32))
            .collect();
        let mut y = Vec::with_capacity(self.sequence_len);
        for t in 0..self.sequence_len {
            let mut threshold = 0.5;
            if self.history(&x, t, 3) == 1 {
                threshold += 0.5;
            }
            if self.history(&x, t, 8) == 1 {
                threshold -= 0.25;
            }
            let draw: f64 = self.rng.gen();
            y.push(if draw > threshold { 0 } else { 1 });
        }
        (x, y)
    }
}

/// Ordered sequence of epochs, each a fresh [`Windows`] over the source's
/// next sequence pair.
///
/// Partitioning errors surface when the epoch is pulled, before any window of
/// that epoch is yielded.
pub struct Epochs<S: SequenceSource> {
    source: S,
    stream_count: usize,
    window_width: usize,
    remaining: usize,
}

impl<S: SequenceSource> Epochs<S> {
    pub fn new(
        source: S,
        num_epochs: usize,
        stream_count: usize,
        window_width: usize,
    ) -> CharRnnResult<Self> {
        if stream_count == 0 {
            return Err(CharRnnError::invalid_config("stream count must be positive"));
        }
        if window_width == 0 {
            return Err(CharRnnError::invalid_config("window width must be positive"));
        }
        Ok(Self {
            source,
            stream_count,
            window_width,
            remaining: num_epochs,
        })
    }

    pub fn class_count(&self) -> usize {
        self.source.class_count()
    }

    pub fn stream_count(&self) -> usize {
        self.stream_count
    }

    pub fn window_width(&self) -> usize {
        self.window_width
    }
}

impl<S: SequenceSource> Iterator for Epochs<S> {
    type Item = CharRnnResult<Windows>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let (x, y) = self.source.next_pair();
        Some(Windows::partition(&x, &y, self.stream_count, self.window_width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_pair() -> (Vec<u32>, Vec<u32>) {
        let x: Vec<u32> = (1..=12).collect();
        let y: Vec<u32> = (1..=12).map(|v| v * 10).collect();
        (x, y)
    }

    #[test]
    fn test_first_window_of_reference_example() {
        let (x, y) = spec_pair();
        let mut windows = Windows::partition(&x, &y, 4, 2).unwrap();

        let first = windows.next().unwrap();
        assert_eq!(first.streams(), 4);
        assert_eq!(first.width(), 2);
        assert_eq!(first.x_row(0), &[1, 2]);
        assert_eq!(first.x_row(1), &[4, 5]);
        assert_eq!(first.x_row(2), &[7, 8]);
        assert_eq!(first.x_row(3), &[10, 11]);
        assert_eq!(first.y_row(0), &[10, 20]);
        assert_eq!(first.y_row(1), &[40, 50]);
        assert_eq!(first.y_row(2), &[70, 80]);
        assert_eq!(first.y_row(3), &[100, 110]);
    }

    #[test]
    fn test_window_count_formula() {
        for (len, streams, width) in [(12, 4, 2), (100, 7, 3), (1000, 9, 11), (64, 64, 1)] {
            let x: Vec<u32> = (0..len as u32).collect();
            let windows = Windows::partition(&x, &x, streams, width).unwrap();
            let expected = (len / streams) / width;
            assert_eq!(windows.num_windows(), expected);
            assert_eq!(windows.count(), expected);
        }
    }

    #[test]
    fn test_windows_shape_is_uniform() {
        let x: Vec<u32> = (0..103).collect();
        for window in Windows::partition(&x, &x, 5, 4).unwrap() {
            assert_eq!(window.streams(), 5);
            assert_eq!(window.width(), 4);
            assert_eq!(window.x().len(), 20);
            assert_eq!(window.y().len(), 20);
        }
    }

    #[test]
    fn test_per_stream_concatenation_reconstructs_sequence() {
        let len = 97usize;
        let streams = 4;
        let width = 3;
        let x: Vec<u32> = (0..len as u32).collect();
        let windows: Vec<Window> = Windows::partition(&x, &x, streams, width)
            .unwrap()
            .collect();

        let per_stream = len / streams;
        let kept = per_stream / width * width;
        for stream in 0..streams {
            let mut rebuilt = Vec::new();
            for window in &windows {
                rebuilt.extend_from_slice(window.x_row(stream));
            }
            let expected: Vec<u32> = x[stream * per_stream..stream * per_stream + kept].to_vec();
            assert_eq!(rebuilt, expected, "stream {stream} out of order");
        }
    }

    #[test]
    fn test_short_pair_yields_empty_not_error() {
        let x: Vec<u32> = (0..10).collect();
        // per_stream = 2, width 5: no full window fits
        let mut windows = Windows::partition(&x, &x, 5, 5).unwrap();
        assert_eq!(windows.num_windows(), 0);
        assert!(windows.next().is_none());
    }

    #[test]
    fn test_partition_config_errors_are_eager() {
        let x: Vec<u32> = (0..10).collect();
        assert!(Windows::partition(&x, &x, 0, 2).is_err());
        assert!(Windows::partition(&x, &x, 2, 0).is_err());
        assert!(Windows::partition(&x, &x, 11, 1).is_err());

        let y: Vec<u32> = (0..9).collect();
        assert!(Windows::partition(&x, &y, 2, 2).is_err());
    }

    #[test]
    fn test_corpus_source_repeats_same_pair() {
        let vocab = Vocabulary::build("abcabc");
        let mut source = CorpusSource::from_text("abcabc", &vocab).unwrap();

        let (x1, y1) = source.next_pair();
        let (x2, y2) = source.next_pair();
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);

        // next-symbol targets: y is x shifted by one
        assert_eq!(x1[1..], y1[..y1.len() - 1]);
    }

    #[test]
    fn test_synthetic_source_regenerates_each_epoch() {
        let mut source = SyntheticSource::new(512, BoundaryPolicy::ZeroHistory, 7);
        let (x1, _) = source.next_pair();
        let (x2, _) = source.next_pair();
        assert_eq!(x1.len(), 512);
        assert_ne!(x1, x2);
        assert!(x1.iter().all(|&v| v < 2));
    }

    #[test]
    fn test_synthetic_source_deterministic_per_seed() {
        let mut a = SyntheticSource::new(256, BoundaryPolicy::ZeroHistory, 42);
        let mut b = SyntheticSource::new(256, BoundaryPolicy::ZeroHistory, 42);
        assert_eq!(a.next_pair(), b.next_pair());
    }

    #[test]
    fn test_synthetic_target_rule_is_deterministic_where_threshold_saturates() {
        let mut source = SyntheticSource::new(2000, BoundaryPolicy::ZeroHistory, 3);
        let (x, y) = source.next_pair();
        for t in 8..x.len() {
            // threshold 1.0: the uniform draw can never exceed it
            if x[t - 3] == 1 && x[t - 8] == 0 {
                assert_eq!(y[t], 1, "position {t}");
            }
        }
    }

    #[test]
    fn test_boundary_policies_agree_past_the_boundary() {
        // Same seed means the same underlying draws; the policies may only
        // disagree on targets before position 8.
        let (x_zero, y_zero) =
            SyntheticSource::new(128, BoundaryPolicy::ZeroHistory, 99).next_pair();
        let (x_wrap, y_wrap) = SyntheticSource::new(128, BoundaryPolicy::Wrap, 99).next_pair();

        assert_eq!(x_zero, x_wrap);
        assert_eq!(y_zero[8..], y_wrap[8..]);
    }

    #[test]
    fn test_zero_history_saturates_before_the_boundary() {
        // For t in 3..8 only the t-3 term can fire under ZeroHistory: a set
        // input there gives threshold 1.0, which the draw can never exceed.
        for seed in 0..32 {
            let (x, y) = SyntheticSource::new(64, BoundaryPolicy::ZeroHistory, seed).next_pair();
            for t in 3..8 {
                if x[t - 3] == 1 {
                    assert_eq!(y[t], 1, "seed {seed}, position {t}");
                }
            }
        }
    }

    #[test]
    fn test_wrap_policy_reads_the_tail_before_the_boundary() {
        // Before position 3 both history terms come from the tail; when the
        // wrapped t-3 input is 1 and the wrapped t-8 input is 0 the threshold
        // saturates at 1.0 and the target is forced to 1.
        let len = 64usize;
        for seed in 0..32 {
            let (x, y) = SyntheticSource::new(len, BoundaryPolicy::Wrap, seed).next_pair();
            for t in 0..3 {
                if x[(t + len - 3) % len] == 1 && x[(t + len - 8) % len] == 0 {
                    assert_eq!(y[t], 1, "seed {seed}, position {t}");
                }
            }
        }
    }

    #[test]
    fn test_wrap_policy_handles_sequences_shorter_than_the_offsets() {
        // The tail lookup indexes modulo the length, so sequences shorter
        // than the largest offset still generate cleanly.
        for len in 1..8 {
            let (x, y) = SyntheticSource::new(len, BoundaryPolicy::Wrap, 11).next_pair();
            assert_eq!(x.len(), len);
            assert_eq!(y.len(), len);
            assert!(x.iter().chain(y.iter()).all(|&v| v < 2));
        }
    }

    #[test]
    fn test_epochs_yields_configured_count() {
        let source = CorpusSource::from_pair((0..40).collect(), (0..40).collect(), 40).unwrap();
        let epochs = Epochs::new(source, 5, 4, 2).unwrap();
        assert_eq!(epochs.class_count(), 40);

        let mut total = 0;
        for epoch in epochs {
            let windows = epoch.unwrap();
            assert_eq!(windows.num_windows(), 5);
            total += 1;
        }
        assert_eq!(total, 5);
    }
}
