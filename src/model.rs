//! Multi-layer GRU model on candle.
//!
//! Implements the training-loop and generation contracts with:
//! - token embeddings of size `[num_classes, hidden_size]`
//! - stacked GRU cells
//! - a linear softmax output layer over the classes
//! - cross-entropy loss and an AdamW update per step
//! - safetensors checkpoints via candle's `VarMap`
//!
//! Truncation happens at the window boundary: within one window gradients
//! flow through all `window_width` time steps, and the state handed back to
//! the caller is detached from the graph.
//!
//! # Example
//!
//! ```no_run
//! use char_rnn_rs::config::ModelConfig;
//! use char_rnn_rs::model::GruModel;
//! use candle_core::Device;
//!
//! let config = ModelConfig::binary_sequence();
//! let model = GruModel::new(&config, &Device::Cpu).unwrap();
//! ```

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{
    embedding, linear, loss::cross_entropy, ops, AdamW, Embedding, Linear, Module, Optimizer,
    ParamsAdamW, VarBuilder, VarMap,
};

use crate::config::ModelConfig;
use crate::data::Window;
use crate::error::{CharRnnError, CharRnnResult};
use crate::generate::GenerativeModel;
use crate::trainer::Model;

/// Opaque recurrent state: one `[streams, hidden_size]` activation tensor per
/// stacked layer. Callers thread it between `step` calls, never inspect it.
#[derive(Debug, Clone)]
pub struct HiddenState {
    layers: Vec<Tensor>,
}

impl HiddenState {
    /// Detach every layer from the autograd graph. This is the truncation
    /// boundary: gradients never flow into a previous window.
    fn detach(&self) -> Self {
        Self {
            layers: self.layers.iter().map(|t| t.detach()).collect(),
        }
    }
}

/// One GRU cell: update gate z, reset gate r, candidate activation n.
///
/// Input and recurrent projections are each a single `[*, 3 * hidden]`
/// linear, chunked per gate.
struct GruCell {
    wx: Linear,
    wh: Linear,
}

impl GruCell {
    fn new(in_dim: usize, hidden: usize, vb: VarBuilder) -> CharRnnResult<Self> {
        Ok(Self {
            wx: linear(in_dim, 3 * hidden, vb.pp("wx"))?,
            wh: linear(hidden, 3 * hidden, vb.pp("wh"))?,
        })
    }

    /// One time step: `[streams, in_dim]` input and `[streams, hidden]`
    /// state to the next `[streams, hidden]` state.
    fn forward(&self, x: &Tensor, h: &Tensor) -> CharRnnResult<Tensor> {
        let gx = self.wx.forward(x)?.chunk(3, 1)?;
        let gh = self.wh.forward(h)?.chunk(3, 1)?;

        let r = ops::sigmoid(&(&gx[0] + &gh[0])?)?;
        let z = ops::sigmoid(&(&gx[1] + &gh[1])?)?;
        let n = (&gx[2] + &(&r * &gh[2])?)?.tanh()?;

        // h' = (1 - z) * n + z * h
        let one_minus_z = z.affine(-1.0, 1.0)?;
        Ok(((&one_minus_z * &n)? + (&z * h)?)?)
    }
}

/// The GRU sequence model.
pub struct GruModel {
    embed: Embedding,
    cells: Vec<GruCell>,
    output: Linear,
    optimizer: AdamW,
    config: ModelConfig,
    device: Device,
    var_map: VarMap,
}

impl GruModel {
    /// Create a model with random initialization.
    pub fn new(config: &ModelConfig, device: &Device) -> CharRnnResult<Self> {
        config.validate()?;

        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);

        let embed = embedding(config.num_classes, config.hidden_size, vb.pp("embedding"))?;
        let mut cells = Vec::with_capacity(config.num_layers);
        for i in 0..config.num_layers {
            cells.push(GruCell::new(
                config.hidden_size,
                config.hidden_size,
                vb.pp(format!("gru.{i}")),
            )?);
        }
        let output = linear(config.hidden_size, config.num_classes, vb.pp("output"))?;

        let optimizer = AdamW::new(
            var_map.all_vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                ..Default::default()
            },
        )?;

        Ok(Self {
            embed,
            cells,
            output,
            optimizer,
            config: config.clone(),
            device: device.clone(),
            var_map,
        })
    }

    /// Create a model and load parameters from a checkpoint. The config's
    /// stream count and window width may differ from the run that produced
    /// the checkpoint; the parameters are shape-independent of batching.
    pub fn load(config: &ModelConfig, checkpoint: &Path, device: &Device) -> CharRnnResult<Self> {
        let mut model = Self::new(config, device)?;
        model.restore(checkpoint)?;
        Ok(model)
    }

    /// Load parameters from a checkpoint into this model, in place.
    pub fn restore(&mut self, checkpoint: &Path) -> CharRnnResult<()> {
        self.var_map.load(checkpoint)?;
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn zero_state(&self) -> CharRnnResult<HiddenState> {
        let layers = (0..self.config.num_layers)
            .map(|_| {
                Tensor::zeros(
                    (self.config.stream_count, self.config.hidden_size),
                    DType::F32,
                    &self.device,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HiddenState { layers })
    }

    /// Reject carried state whose shape does not match the configured stream
    /// count or layer stack. Never silently reshaped.
    fn check_state(&self, state: &HiddenState) -> CharRnnResult<()> {
        let expected = format!(
            "{} layers of [{}, {}]",
            self.config.num_layers, self.config.stream_count, self.config.hidden_size
        );
        if state.layers.len() != self.config.num_layers {
            return Err(CharRnnError::state_shape_mismatch(
                expected,
                format!("{} layers", state.layers.len()),
            ));
        }
        for layer in &state.layers {
            let (streams, hidden) = layer.dims2()?;
            if streams != self.config.stream_count || hidden != self.config.hidden_size {
                return Err(CharRnnError::state_shape_mismatch(
                    expected,
                    format!("[{streams}, {hidden}]"),
                ));
            }
        }
        Ok(())
    }

    fn check_window(&self, window: &Window) -> CharRnnResult<()> {
        if window.streams() != self.config.stream_count
            || window.width() != self.config.window_width
        {
            return Err(CharRnnError::shape_mismatch(
                format!(
                    "[{}, {}]",
                    self.config.stream_count, self.config.window_width
                ),
                format!("[{}, {}]", window.streams(), window.width()),
            ));
        }
        Ok(())
    }

    /// Forward over one window: logits `[streams * width, num_classes]` plus
    /// the end-of-window state, still attached to the graph.
    fn forward(
        &self,
        window: &Window,
        state: Option<HiddenState>,
    ) -> CharRnnResult<(Tensor, HiddenState)> {
        self.check_window(window)?;
        let state = match state {
            Some(s) => {
                self.check_state(&s)?;
                s
            }
            None => self.zero_state()?,
        };

        let streams = window.streams();
        let width = window.width();
        let x = Tensor::from_slice(window.x(), (streams, width), &self.device)?;
        let embedded = self.embed.forward(&x)?; // [streams, width, hidden]

        let mut layer_states = state.layers;
        let mut top_outputs = Vec::with_capacity(width);
        for t in 0..width {
            let mut input = embedded.narrow(1, t, 1)?.squeeze(1)?;
            for (l, cell) in self.cells.iter().enumerate() {
                let h = cell.forward(&input, &layer_states[l])?;
                layer_states[l] = h.clone();
                input = h;
            }
            top_outputs.push(input);
        }

        let stacked = Tensor::stack(&top_outputs, 1)?; // [streams, width, hidden]
        let flat = stacked.reshape((streams * width, self.config.hidden_size))?;
        let logits = self.output.forward(&flat)?;

        Ok((
            logits,
            HiddenState {
                layers: layer_states,
            },
        ))
    }
}

impl Model for GruModel {
    type State = HiddenState;

    fn step(
        &mut self,
        window: &Window,
        state: Option<HiddenState>,
    ) -> CharRnnResult<(f64, HiddenState)> {
        let (logits, new_state) = self.forward(window, state)?;

        let targets = Tensor::from_slice(
            window.y(),
            window.streams() * window.width(),
            &self.device,
        )?;
        let loss = cross_entropy(&logits, &targets)?;
        self.optimizer.backward_step(&loss)?;

        let loss_value = loss.to_scalar::<f32>()? as f64;
        Ok((loss_value, new_state.detach()))
    }

    fn save(&self, checkpoint: &Path) -> CharRnnResult<()> {
        self.var_map.save(checkpoint)?;
        Ok(())
    }
}

impl GenerativeModel for GruModel {
    fn predict(
        &mut self,
        window: &Window,
        state: Option<HiddenState>,
    ) -> CharRnnResult<(Vec<f32>, HiddenState)> {
        let (logits, new_state) = self.forward(window, state)?;

        // Distribution for the final position of the window.
        let probs = ops::softmax_last_dim(&logits)?;
        let rows = window.streams() * window.width();
        let last = probs.narrow(0, rows - 1, 1)?.squeeze(0)?;

        Ok((last.to_vec1::<f32>()?, new_state.detach()))
    }
}
