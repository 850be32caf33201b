//! Decoder → encoder attention.
//!
//! ```text
//! query    = (attn_hid2emb(conved) + embedded) · √0.5        [B, L, emb]
//! energy   = query · encoder.convedᵀ                          [B, L, S]
//! weights  = softmax(energy, over S)
//! attended = attn_emb2hid(weights · encoder.combined)         [B, L, hid]
//! combined = (conved + attendedᵀ) · √0.5                      [B, hid, L]
//! ```

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use super::encoder::EncoderOutput;
use super::layers::scaled_residual;
use crate::Result;

/// Output of one attention step.
#[derive(Debug, Clone)]
pub struct AttentionOutput {
    /// `[B, L, S]`, rows sum to one.
    pub weights: Tensor,
    /// `[B, hid, L]`, conv output merged with the attended encoding.
    pub combined: Tensor,
}

/// Dot-product attention over encoder outputs.
#[derive(Debug, Clone)]
pub struct Attention {
    attn_hid2emb: nn::Linear,
    attn_emb2hid: nn::Linear,
}

impl Attention {
    pub fn new(emb_dim: usize, hid_dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            attn_hid2emb: nn::linear(hid_dim, emb_dim, vb.pp("attn_hid2emb"))?,
            attn_emb2hid: nn::linear(emb_dim, hid_dim, vb.pp("attn_emb2hid"))?,
        })
    }

    /// Forward pass.
    ///
    /// - `embedded`: `[B, L, emb]` — target token + position embedding
    /// - `conved`: `[B, hid, L]` — gated conv output of the current block
    /// - `encoder`: encoder keys (`conved`) and values (`combined`), `[B, S, emb]`
    pub fn forward(
        &self,
        embedded: &Tensor,
        conved: &Tensor,
        encoder: &EncoderOutput,
    ) -> Result<AttentionOutput> {
        let conved_emb = self
            .attn_hid2emb
            .forward(&conved.transpose(1, 2)?.contiguous()?)?;
        let query = scaled_residual(&conved_emb, embedded)?;

        let keys = encoder.conved.transpose(1, 2)?.contiguous()?;
        let energy = query.matmul(&keys)?;
        let weights = nn::ops::softmax_last_dim(&energy)?;

        let attended = weights.matmul(&encoder.combined.contiguous()?)?;
        let attended = self.attn_emb2hid.forward(&attended)?;
        let combined = scaled_residual(conved, &attended.transpose(1, 2)?)?;

        Ok(AttentionOutput { weights, combined })
    }
}
