//! Convolutional sequence-to-sequence model (Gehring et al. 2017).
//!
//! ## Components
//!
//! - [`layers`] — positional embedding, gated conv block, √0.5 residual merge
//! - [`encoder`] — symmetric-padded conv stack producing attention keys/values
//! - [`decoder`] — causal conv stack with attention after every block
//! - [`attention`] — dot-product attention over encoder outputs
//! - [`seq2seq`] — wrapper running encoder then decoder, plus greedy decoding
//!
//! All tensors are batch-first; token inputs are `[B, L]` u32.

pub mod attention;
pub mod decoder;
pub mod encoder;
pub mod layers;
pub mod seq2seq;

pub use attention::{Attention, AttentionOutput};
pub use decoder::{Decoder, DecoderOutput};
pub use encoder::{Encoder, EncoderOutput};
pub use seq2seq::{Seq2Seq, Translation};
