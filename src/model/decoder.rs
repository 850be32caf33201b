//! Causal convolutional decoder with per-block attention.
//!
//! ```text
//! tgt [B, L]
//!   → tok_embedding + pos_embedding → dropout          embedded [B, L, emb]
//!   → emb2hid → transpose                              [B, hid, L]
//!   → n_layers × (ConvBlock(Causal) → Attention → (attended + x)·√0.5)
//!   → transpose → hid2emb → dropout → fc_out           logits [B, L, output_dim]
//! ```
//!
//! Each block is left-padded with `kernel_size - 1` columns of `tgt_pad_idx`,
//! so the logits at position `t` only depend on target tokens `0..=t`.

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use super::attention::Attention;
use super::encoder::EncoderOutput;
use super::layers::{ConvBlock, Padding, PositionalEmbedding, scaled_residual};
use crate::config::DecoderConfig;
use crate::{Error, Result};

/// Decoder outputs.
#[derive(Debug, Clone)]
pub struct DecoderOutput {
    /// `[B, L, output_dim]` unnormalised scores.
    pub logits: Tensor,
    /// `[B, L, S]` attention weights of the final block.
    pub attention: Tensor,
}

#[derive(Debug, Clone)]
pub struct Decoder {
    embedding: PositionalEmbedding,
    emb2hid: nn::Linear,
    hid2emb: nn::Linear,
    attention: Attention,
    fc_out: nn::Linear,
    convs: Vec<ConvBlock>,
    dropout: nn::Dropout,
}

impl Decoder {
    pub fn new(cfg: &DecoderConfig, vb: VarBuilder) -> Result<Self> {
        cfg.validate()?;

        let embedding =
            PositionalEmbedding::new(cfg.output_dim, cfg.max_length, cfg.emb_dim, vb.clone())?;
        let emb2hid = nn::linear(cfg.emb_dim, cfg.hid_dim, vb.pp("emb2hid"))?;
        let hid2emb = nn::linear(cfg.hid_dim, cfg.emb_dim, vb.pp("hid2emb"))?;
        let attention = Attention::new(cfg.emb_dim, cfg.hid_dim, vb.clone())?;
        let fc_out = nn::linear(cfg.emb_dim, cfg.output_dim, vb.pp("fc_out"))?;

        let padding = Padding::Causal {
            fill: f64::from(cfg.tgt_pad_idx),
        };
        let mut convs = Vec::with_capacity(cfg.n_layers);
        for i in 0..cfg.n_layers {
            convs.push(ConvBlock::new(
                cfg.hid_dim,
                cfg.kernel_size,
                cfg.dropout,
                padding,
                vb.pp(format!("convs.{i}")),
            )?);
        }

        tracing::debug!(
            layers = cfg.n_layers,
            kernel_size = cfg.kernel_size,
            output_dim = cfg.output_dim,
            "decoder built"
        );

        Ok(Self {
            embedding,
            emb2hid,
            hid2emb,
            attention,
            fc_out,
            convs,
            dropout: nn::Dropout::new(cfg.dropout),
        })
    }

    /// Forward pass.
    ///
    /// - `tgt`: `[B, L]` u32 token indices
    /// - `encoder`: outputs of [`super::Encoder::forward`] for the same batch
    pub fn forward(
        &self,
        tgt: &Tensor,
        encoder: &EncoderOutput,
        train: bool,
    ) -> Result<DecoderOutput> {
        let embedded = self
            .dropout
            .forward(&self.embedding.forward(tgt)?, train)?;

        // [B, L, emb] → [B, hid, L]
        let mut conv_input = self
            .emb2hid
            .forward(&embedded)?
            .transpose(1, 2)?
            .contiguous()?;

        let mut attention = None;
        for conv in &self.convs {
            let out = conv.forward(&conv_input, train)?;
            let step = self.attention.forward(&embedded, &out.gated, encoder)?;
            conv_input = scaled_residual(&step.combined, &out.residual)?;
            attention = Some(step.weights);
        }
        let attention =
            attention.ok_or_else(|| Error::Config("decoder has no conv layers".to_string()))?;

        // [B, hid, L] → [B, L, emb]
        let conved = self
            .hid2emb
            .forward(&conv_input.transpose(1, 2)?.contiguous()?)?;
        let logits = self
            .fc_out
            .forward(&self.dropout.forward(&conved, train)?)?;

        Ok(DecoderOutput { logits, attention })
    }
}
