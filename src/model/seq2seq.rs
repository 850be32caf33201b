//! Encoder + decoder wrapper.

use candle_core::{IndexOp, Tensor};
use candle_nn::VarBuilder;

use super::decoder::{Decoder, DecoderOutput};
use super::encoder::Encoder;
use crate::config::Seq2SeqConfig;
use crate::{Error, Result};

/// Result of [`Seq2Seq::greedy_decode`].
#[derive(Debug, Clone)]
pub struct Translation {
    /// Generated target indices, without the leading start token. Ends with
    /// the end token unless `max_len` was reached first.
    pub tokens: Vec<u32>,
    /// `[1, tokens.len(), S]` attention of the final decoder pass.
    pub attention: Tensor,
}

/// Convolutional sequence-to-sequence model.
#[derive(Debug, Clone)]
pub struct Seq2Seq {
    encoder: Encoder,
    decoder: Decoder,
}

impl Seq2Seq {
    /// Build from config. Weights live under `encoder.` and `decoder.`.
    pub fn new(cfg: &Seq2SeqConfig, vb: VarBuilder) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            encoder: Encoder::new(&cfg.encoder, vb.pp("encoder"))?,
            decoder: Decoder::new(&cfg.decoder, vb.pp("decoder"))?,
        })
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Forward pass.
    ///
    /// - `src`: `[B, S]`, `tgt`: `[B, L]` u32 indices
    ///
    /// Returns logits `[B, L, output_dim]` and attention `[B, L, S]`.
    pub fn forward(&self, src: &Tensor, tgt: &Tensor, train: bool) -> Result<DecoderOutput> {
        let encoded = self.encoder.forward(src, train)?;
        self.decoder.forward(tgt, &encoded, train)
    }

    /// Greedy generation for a single source sentence `[1, S]`.
    ///
    /// The encoder runs once; the decoder re-runs on the growing prefix and
    /// the argmax of the last position is appended until `eos_index` or
    /// `max_len` generated tokens.
    pub fn greedy_decode(
        &self,
        src: &Tensor,
        sos_index: u32,
        eos_index: u32,
        max_len: usize,
    ) -> Result<Translation> {
        let (batch, _src_len) = src.dims2()?;
        if batch != 1 {
            return Err(Error::Config(format!(
                "greedy decoding takes one sentence, got a batch of {batch}"
            )));
        }
        if max_len == 0 {
            return Err(Error::Config("max_len must be non-zero".to_string()));
        }

        let encoded = self.encoder.forward(src, false)?;
        let mut prefix = vec![sos_index];
        let mut attention = None;
        while prefix.len() <= max_len {
            let tgt = Tensor::new(prefix.as_slice(), src.device())?.unsqueeze(0)?;
            let out = self.decoder.forward(&tgt, &encoded, false)?;
            let next = out
                .logits
                .i((0, prefix.len() - 1))?
                .argmax(0)?
                .to_scalar::<u32>()?;
            attention = Some(out.attention);
            prefix.push(next);
            if next == eos_index {
                break;
            }
        }
        tracing::debug!(generated = prefix.len() - 1, "greedy decode finished");

        let attention = attention.ok_or_else(|| Error::Config("nothing decoded".to_string()))?;
        prefix.remove(0);
        Ok(Translation {
            tokens: prefix,
            attention,
        })
    }
}
