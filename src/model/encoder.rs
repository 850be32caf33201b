//! Convolutional encoder.
//!
//! ```text
//! src [B, S]
//!   → tok_embedding + pos_embedding → dropout        embedded [B, S, emb]
//!   → emb2hid → transpose                            [B, hid, S]
//!   → n_layers × (ConvBlock(Same) → (glu + x)·√0.5)  [B, hid, S]
//!   → transpose → hid2emb                            conved   [B, S, emb]
//!   → (conved + embedded)·√0.5                       combined [B, S, emb]
//! ```

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use super::layers::{ConvBlock, Padding, PositionalEmbedding, scaled_residual};
use crate::Result;
use crate::config::EncoderConfig;

/// Encoder outputs used as attention keys (`conved`) and values (`combined`).
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// `[B, S, emb]`
    pub conved: Tensor,
    /// `[B, S, emb]`
    pub combined: Tensor,
}

#[derive(Debug, Clone)]
pub struct Encoder {
    embedding: PositionalEmbedding,
    emb2hid: nn::Linear,
    hid2emb: nn::Linear,
    convs: Vec<ConvBlock>,
    dropout: nn::Dropout,
}

impl Encoder {
    /// Build the encoder. Fails if `kernel_size` is even.
    pub fn new(cfg: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        cfg.validate()?;

        let embedding =
            PositionalEmbedding::new(cfg.input_dim, cfg.max_length, cfg.emb_dim, vb.clone())?;
        let emb2hid = nn::linear(cfg.emb_dim, cfg.hid_dim, vb.pp("emb2hid"))?;
        let hid2emb = nn::linear(cfg.hid_dim, cfg.emb_dim, vb.pp("hid2emb"))?;

        let mut convs = Vec::with_capacity(cfg.n_layers);
        for i in 0..cfg.n_layers {
            convs.push(ConvBlock::new(
                cfg.hid_dim,
                cfg.kernel_size,
                cfg.dropout,
                Padding::Same,
                vb.pp(format!("convs.{i}")),
            )?);
        }

        tracing::debug!(
            layers = cfg.n_layers,
            kernel_size = cfg.kernel_size,
            hid_dim = cfg.hid_dim,
            "encoder built"
        );

        Ok(Self {
            embedding,
            emb2hid,
            hid2emb,
            convs,
            dropout: nn::Dropout::new(cfg.dropout),
        })
    }

    /// Forward pass. `src`: `[B, S]` u32 token indices.
    pub fn forward(&self, src: &Tensor, train: bool) -> Result<EncoderOutput> {
        let embedded = self
            .dropout
            .forward(&self.embedding.forward(src)?, train)?;

        // [B, S, emb] → [B, hid, S]
        let mut conv_input = self
            .emb2hid
            .forward(&embedded)?
            .transpose(1, 2)?
            .contiguous()?;

        for conv in &self.convs {
            let out = conv.forward(&conv_input, train)?;
            conv_input = scaled_residual(&out.gated, &out.residual)?;
        }

        // [B, hid, S] → [B, S, emb]
        let conved = self
            .hid2emb
            .forward(&conv_input.transpose(1, 2)?.contiguous()?)?;
        let combined = scaled_residual(&conved, &embedded)?;

        Ok(EncoderOutput { conved, combined })
    }
}
