//! Configuration for the tokenizer and the convolutional seq2seq model.
//!
//! Defaults follow the reference ConvS2S setup (256-d embeddings, 512-d
//! hidden, 10 layers, kernel 3, dropout 0.25, 100 positions).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tokenizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Soft bound on learned entries. The vocabulary settles at `num_words + 1`.
    pub num_words: usize,
    /// Target length for right padding.
    pub max_seq_len: usize,
    /// Keep `<sos>` / `<eos>` when seeding from a label mapping.
    pub sos_eos: bool,
    /// Drop tokens past `max_seq_len` before encoding.
    pub truncate: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            num_words: 200,
            max_seq_len: 45,
            sos_eos: false,
            truncate: false,
        }
    }
}

/// Encoder hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Source vocabulary size (rows of the token embedding).
    pub input_dim: usize,
    pub emb_dim: usize,
    pub hid_dim: usize,
    pub n_layers: usize,
    /// Must be odd so symmetric padding preserves the sequence length.
    pub kernel_size: usize,
    pub dropout: f32,
    /// Rows of the position embedding.
    pub max_length: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            input_dim: 203,
            emb_dim: 256,
            hid_dim: 512,
            n_layers: 10,
            kernel_size: 3,
            dropout: 0.25,
            max_length: 100,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.kernel_size % 2 == 0 {
            return Err(Error::Config(format!(
                "encoder kernel size must be odd, got {}",
                self.kernel_size
            )));
        }
        check_dims(
            "encoder",
            &[
                ("input_dim", self.input_dim),
                ("emb_dim", self.emb_dim),
                ("hid_dim", self.hid_dim),
                ("n_layers", self.n_layers),
                ("max_length", self.max_length),
            ],
        )?;
        check_dropout("encoder", self.dropout)
    }
}

/// Decoder hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Target vocabulary size (rows of the token embedding and width of the logits).
    pub output_dim: usize,
    pub emb_dim: usize,
    pub hid_dim: usize,
    pub n_layers: usize,
    pub kernel_size: usize,
    pub dropout: f32,
    /// Fill value for the causal left padding.
    pub tgt_pad_idx: u32,
    pub max_length: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            output_dim: 203,
            emb_dim: 256,
            hid_dim: 512,
            n_layers: 10,
            kernel_size: 3,
            dropout: 0.25,
            tgt_pad_idx: crate::vocab::PAD_INDEX,
            max_length: 100,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<()> {
        check_dims(
            "decoder",
            &[
                ("output_dim", self.output_dim),
                ("emb_dim", self.emb_dim),
                ("hid_dim", self.hid_dim),
                ("n_layers", self.n_layers),
                ("kernel_size", self.kernel_size),
                ("max_length", self.max_length),
            ],
        )?;
        check_dropout("decoder", self.dropout)
    }
}

/// Full model configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    pub encoder: EncoderConfig,
    pub decoder: DecoderConfig,
}

impl Seq2SeqConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.decoder.validate()?;
        if self.encoder.emb_dim != self.decoder.emb_dim {
            return Err(Error::Config(format!(
                "encoder and decoder embedding widths differ ({} vs {})",
                self.encoder.emb_dim, self.decoder.emb_dim
            )));
        }
        Ok(())
    }
}

fn check_dims(component: &str, dims: &[(&str, usize)]) -> Result<()> {
    for (name, value) in dims {
        if *value == 0 {
            return Err(Error::Config(format!("{component} {name} must be non-zero")));
        }
    }
    Ok(())
}

fn check_dropout(component: &str, p: f32) -> Result<()> {
    if !(0.0..1.0).contains(&p) {
        return Err(Error::Config(format!(
            "{component} dropout must be in [0, 1), got {p}"
        )));
    }
    Ok(())
}
