//! Symbol vocabulary built once from raw data.
//!
//! Maps each distinct character to an integer index in `[0, vocab_size)` and
//! back. Indices are assigned in first-occurrence order, which makes the
//! mapping deterministic for a given input. The vocabulary is immutable after
//! [`Vocabulary::build`]; encoding a symbol it has never seen is an error
//! rather than a silent fallback, which matters when a trained model is
//! reused at generation time.

use std::collections::HashMap;

use crate::error::{CharRnnError, CharRnnResult};

/// Bidirectional symbol-to-index mapping.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Index lookup per symbol
    index_of: HashMap<char, u32>,
    /// Symbol lookup per index; assignment order, basis of decode
    symbols: Vec<char>,
}

impl Vocabulary {
    /// Build a vocabulary from raw data, deduplicating symbols in
    /// first-occurrence order.
    pub fn build(raw: &str) -> Self {
        let mut index_of = HashMap::new();
        let mut symbols = Vec::new();
        for c in raw.chars() {
            if !index_of.contains_key(&c) {
                index_of.insert(c, symbols.len() as u32);
                symbols.push(c);
            }
        }
        Self { index_of, symbols }
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Encode one symbol.
    pub fn encode_symbol(&self, symbol: char) -> CharRnnResult<u32> {
        self.index_of
            .get(&symbol)
            .copied()
            .ok_or(CharRnnError::UnknownSymbol { symbol })
    }

    /// Encode a string of symbols.
    pub fn encode(&self, raw: &str) -> CharRnnResult<Vec<u32>> {
        raw.chars().map(|c| self.encode_symbol(c)).collect()
    }

    /// Decode one index.
    pub fn decode_symbol(&self, index: u32) -> CharRnnResult<char> {
        self.symbols
            .get(index as usize)
            .copied()
            .ok_or(CharRnnError::UnknownIndex {
                index,
                vocab_size: self.symbols.len(),
            })
    }

    /// Decode a sequence of indices back to a string.
    pub fn decode(&self, indices: &[u32]) -> CharRnnResult<String> {
        indices.iter().map(|&i| self.decode_symbol(i)).collect()
    }
}
