//! Convolutional sequence-to-sequence translation in pure Rust.
//!
//! A candle-based ConvS2S encoder/decoder plus the bounded vocabulary
//! tokenizer that turns token sequences into the index tensors it consumes.
//!
//! ## Architecture
//!
//! ```text
//! tokens → Tokenizer (bounded vocab, LFU eviction) → [B, S] u32
//!                                                     ↓
//!                          Encoder (embed → n × GLU conv) → conved, combined
//!                                                     ↓
//! tgt [B, L] → Decoder (embed → n × causal GLU conv + attention) → logits [B, L, V]
//! ```
//!
//! ## Modules
//!
//! - [`vocab`] — tokenizer with frequency-based eviction
//! - [`model`] — encoder, decoder, attention, seq2seq wrapper
//! - [`config`] — tokenizer and model configuration

pub mod config;
pub mod model;
pub mod vocab;

mod error;

pub use error::{Error, Result};
