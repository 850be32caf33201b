//! Building blocks shared by the encoder and decoder.
//!
//! - [`PositionalEmbedding`] — token + learned position embedding
//! - [`ConvBlock`] — dropout → conv1d (hid → 2·hid) → GLU, with either
//!   length-preserving symmetric padding or causal left padding
//! - [`glu`] / [`scaled_residual`] — the gating and √0.5 residual merge
//!
//! Every block maps `[B, hid, L]` → `[B, hid, L]`; the stacks in
//! [`super::encoder`] and [`super::decoder`] are plain `Vec<ConvBlock>`.

use candle_core::{Module, Tensor};
use candle_nn::{self as nn, VarBuilder};

use crate::{Error, Result};

/// √0.5, applied to every residual sum.
pub const RESIDUAL_SCALE: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// `(a + b) · √0.5`
pub fn scaled_residual(a: &Tensor, b: &Tensor) -> candle_core::Result<Tensor> {
    (a + b)? * RESIDUAL_SCALE
}

/// Gated linear unit: split `dim` in half and gate the first half with the
/// sigmoid of the second.
pub fn glu(xs: &Tensor, dim: usize) -> candle_core::Result<Tensor> {
    let chunks = xs.chunk(2, dim)?;
    &chunks[0] * nn::ops::sigmoid(&chunks[1])?
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Sum of token and absolute position embeddings.
#[derive(Debug, Clone)]
pub struct PositionalEmbedding {
    tokens: nn::Embedding,
    positions: nn::Embedding,
    max_length: usize,
}

impl PositionalEmbedding {
    pub fn new(vocab_size: usize, max_length: usize, dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            tokens: nn::embedding(vocab_size, dim, vb.pp("tok_embedding"))?,
            positions: nn::embedding(max_length, dim, vb.pp("pos_embedding"))?,
            max_length,
        })
    }

    /// `[B, L]` u32 ids → `[B, L, dim]`
    pub fn forward(&self, ids: &Tensor) -> Result<Tensor> {
        let (_batch, seq_len) = ids.dims2()?;
        if seq_len > self.max_length {
            return Err(Error::SequenceTooLong {
                len: seq_len,
                max: self.max_length,
            });
        }
        let pos = Tensor::arange(0u32, seq_len as u32, ids.device())?.unsqueeze(0)?;
        let tok_embedded = self.tokens.forward(ids)?;
        let pos_embedded = self.positions.forward(&pos)?;
        Ok(tok_embedded.broadcast_add(&pos_embedded)?)
    }
}

// ---------------------------------------------------------------------------
// Gated convolution block
// ---------------------------------------------------------------------------

/// How a block keeps the output length equal to the input length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Padding {
    /// `(k - 1) / 2` zeros on both sides. Needs an odd kernel.
    Same,
    /// `k - 1` columns of `fill` on the left only, so position `t` sees
    /// positions `<= t`.
    Causal { fill: f64 },
}

/// Result of one block: the gated conv output and the tensor it should be
/// residually merged with.
#[derive(Debug, Clone)]
pub struct BlockOutput {
    /// `[B, hid, L]`
    pub gated: Tensor,
    /// `[B, hid, L]`
    pub residual: Tensor,
}

/// Conv1d (hid → 2·hid) followed by GLU over the channel axis.
#[derive(Debug, Clone)]
pub struct ConvBlock {
    conv: nn::Conv1d,
    dropout: nn::Dropout,
    padding: Padding,
    kernel_size: usize,
}

impl ConvBlock {
    pub fn new(
        hid_dim: usize,
        kernel_size: usize,
        dropout: f32,
        padding: Padding,
        vb: VarBuilder,
    ) -> Result<Self> {
        let conv_padding = match padding {
            Padding::Same => {
                if kernel_size % 2 == 0 {
                    return Err(Error::Config(format!(
                        "same-padded conv needs an odd kernel, got {kernel_size}"
                    )));
                }
                (kernel_size - 1) / 2
            }
            Padding::Causal { .. } => 0,
        };
        let cfg = nn::Conv1dConfig {
            padding: conv_padding,
            stride: 1,
            dilation: 1,
            groups: 1,
            ..Default::default()
        };
        let conv = nn::conv1d(hid_dim, 2 * hid_dim, kernel_size, cfg, vb)?;
        Ok(Self {
            conv,
            dropout: nn::Dropout::new(dropout),
            padding,
            kernel_size,
        })
    }

    /// Forward pass.
    ///
    /// Input: `[B, hid, L]`. With [`Padding::Same`] the residual is the raw
    /// input; with [`Padding::Causal`] it is the dropped-out input.
    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<BlockOutput> {
        match self.padding {
            Padding::Same => {
                let conved = self.conv.forward(&self.dropout.forward(xs, train)?)?;
                Ok(BlockOutput {
                    gated: glu(&conved, 1)?,
                    residual: xs.clone(),
                })
            }
            Padding::Causal { fill } => {
                let dropped = self.dropout.forward(xs, train)?;
                let padded = self.left_pad(&dropped, fill)?;
                let conved = self.conv.forward(&padded)?;
                Ok(BlockOutput {
                    gated: glu(&conved, 1)?,
                    residual: dropped,
                })
            }
        }
    }

    /// `[B, hid, L]` → `[B, hid, L + k - 1]` with `fill` in the new left columns.
    fn left_pad(&self, xs: &Tensor, fill: f64) -> Result<Tensor> {
        if self.kernel_size <= 1 {
            return Ok(xs.clone());
        }
        let (batch, hid, _len) = xs.dims3()?;
        let pad = Tensor::full(fill as f32, (batch, hid, self.kernel_size - 1), xs.device())?
            .to_dtype(xs.dtype())?;
        Ok(Tensor::cat(&[&pad, xs], 2)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_glu_gates_first_half() {
        let dev = Device::Cpu;
        // channels: [2, 2 | 0, 0] → 2 · sigmoid(0) = 1
        let xs = Tensor::new(&[[[2f32], [2.0], [0.0], [0.0]]], &dev).unwrap();
        let out = glu(&xs, 1).unwrap();
        assert_eq!(out.dims(), &[1, 2, 1]);
        let vals = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        for v in vals {
            assert!((v - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_scaled_residual() {
        let dev = Device::Cpu;
        let ones = Tensor::ones((2, 3), DType::F32, &dev).unwrap();
        let out = scaled_residual(&ones, &ones).unwrap();
        let vals = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        for v in vals {
            assert!((v - std::f32::consts::SQRT_2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_same_block_preserves_length() {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let block = ConvBlock::new(8, 5, 0.1, Padding::Same, vb).unwrap();
        let xs = Tensor::randn(0f32, 1.0, (2, 8, 7), &dev).unwrap();
        let out = block.forward(&xs, false).unwrap();
        assert_eq!(out.gated.dims(), &[2, 8, 7]);
        assert_eq!(out.residual.dims(), &[2, 8, 7]);
    }

    #[test]
    fn test_same_block_rejects_even_kernel() {
        let dev = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &dev);
        let err = ConvBlock::new(8, 4, 0.0, Padding::Same, vb).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_causal_block_preserves_length() {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        for kernel_size in [1, 3, 4] {
            let block = ConvBlock::new(
                6,
                kernel_size,
                0.0,
                Padding::Causal { fill: 0.0 },
                vb.pp(format!("k{kernel_size}")),
            )
            .unwrap();
            let xs = Tensor::randn(0f32, 1.0, (1, 6, 9), &dev).unwrap();
            let out = block.forward(&xs, false).unwrap();
            assert_eq!(out.gated.dims(), &[1, 6, 9]);
        }
    }

    #[test]
    fn test_causal_left_pad_uses_fill() {
        let dev = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &dev);
        let block = ConvBlock::new(4, 3, 0.0, Padding::Causal { fill: 5.0 }, vb).unwrap();
        let xs = Tensor::randn(0f32, 1.0, (2, 4, 6), &dev).unwrap();

        let padded = block.left_pad(&xs, 5.0).unwrap();
        assert_eq!(padded.dims(), &[2, 4, 8]);

        let pad = padded.narrow(2, 0, 2).unwrap().flatten_all().unwrap();
        for v in pad.to_vec1::<f32>().unwrap() {
            assert_eq!(v, 5.0);
        }
        let body = padded.narrow(2, 2, 6).unwrap().flatten_all().unwrap();
        assert_eq!(
            body.to_vec1::<f32>().unwrap(),
            xs.flatten_all().unwrap().to_vec1::<f32>().unwrap()
        );
    }

    #[test]
    fn test_causal_fill_reaches_first_position() {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let zero_fill = ConvBlock::new(4, 3, 0.0, Padding::Causal { fill: 0.0 }, vb.clone()).unwrap();
        let five_fill = ConvBlock::new(4, 3, 0.0, Padding::Causal { fill: 5.0 }, vb).unwrap();
        let xs = Tensor::randn(0f32, 1.0, (1, 4, 5), &dev).unwrap();

        let first = |block: &ConvBlock| {
            let out = block.forward(&xs, false).unwrap();
            out.gated.narrow(2, 0, 1).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap()
        };
        assert_ne!(first(&zero_fill), first(&five_fill));
    }

    #[test]
    fn test_positional_embedding() {
        let dev = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &dev);
        let emb = PositionalEmbedding::new(10, 4, 6, vb).unwrap();
        let ids = Tensor::new(&[[2u32, 3, 0], [4, 1, 0]], &dev).unwrap();
        assert_eq!(emb.forward(&ids).unwrap().dims(), &[2, 3, 6]);

        let long = Tensor::zeros((1, 5), DType::U32, &dev).unwrap();
        assert!(matches!(
            emb.forward(&long),
            Err(Error::SequenceTooLong { len: 5, max: 4 })
        ));
    }
}
