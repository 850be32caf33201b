//! ConvS2S command-line tool.
//!
//! Tokenizes whitespace-separated text and runs a randomly initialised
//! model to inspect output shapes.
//!
//! # Usage
//!
//! ```sh
//! # One JSON array of indices per input line:
//! convs2s encode --input corpus.txt --num-words 200 --max-seq-len 45
//!
//! # Encode then decode each line:
//! convs2s roundtrip --input corpus.txt --words seed_words.txt
//!
//! # One forward pass over a source/target corpus pair:
//! convs2s forward --src src.txt --tgt tgt.txt --config model.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use clap::{Args as ClapArgs, Parser, Subcommand};
use convs2s_rs::{
    config::{Seq2SeqConfig, TokenizerConfig},
    model::Seq2Seq,
    vocab::Tokenizer,
};

#[derive(Parser, Debug)]
#[command(name = "convs2s", about = "Convolutional seq2seq tokenizer and model tool")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the encoded indices of every input line as JSON.
    Encode {
        #[command(flatten)]
        tokenizer: TokenizerArgs,
        /// Input text file, one sentence per line.
        #[arg(long, short = 'i')]
        input: PathBuf,
    },
    /// Encode then decode every input line.
    Roundtrip {
        #[command(flatten)]
        tokenizer: TokenizerArgs,
        #[arg(long, short = 'i')]
        input: PathBuf,
    },
    /// Run one forward pass of a randomly initialised model.
    Forward {
        #[command(flatten)]
        tokenizer: TokenizerArgs,
        /// Source sentences, one per line.
        #[arg(long)]
        src: PathBuf,
        /// Target sentences, one per line. Must match the source line count.
        #[arg(long)]
        tgt: PathBuf,
        /// Model configuration JSON. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct TokenizerArgs {
    /// Soft vocabulary bound.
    #[arg(long, default_value_t = 200)]
    num_words: usize,

    /// Padding target length.
    #[arg(long, default_value_t = 45)]
    max_seq_len: usize,

    /// Drop tokens past --max-seq-len.
    #[arg(long)]
    truncate: bool,

    /// Seed words, one per line. They are never evicted.
    #[arg(long)]
    words: Option<PathBuf>,

    /// Treat unseen tokens as OOV instead of learning them.
    #[arg(long)]
    no_train: bool,
}

impl TokenizerArgs {
    fn build(&self) -> anyhow::Result<Tokenizer> {
        let cfg = TokenizerConfig {
            num_words: self.num_words,
            max_seq_len: self.max_seq_len,
            truncate: self.truncate,
            ..TokenizerConfig::default()
        };
        let mut tokenizer = match &self.words {
            Some(path) => {
                let words = read_lines(path)?
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>();
                Tokenizer::from_words(cfg, words)
            }
            None => Tokenizer::new(cfg),
        };
        tokenizer.set_train(!self.no_train);
        Ok(tokenizer)
    }
}

/// Whitespace-tokenized lines of a file.
fn read_lines(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Encode { tokenizer, input } => {
            let mut tokenizer = tokenizer.build()?;
            for sentence in read_lines(&input)? {
                let encoded = tokenizer.encode(&sentence);
                println!("{}", serde_json::to_string(&encoded)?);
            }
            tracing::info!(entries = tokenizer.len(), "vocabulary size");
        }
        Command::Roundtrip { tokenizer, input } => {
            let mut tokenizer = tokenizer.build()?;
            for sentence in read_lines(&input)? {
                let encoded = tokenizer.encode(&sentence);
                let decoded = tokenizer
                    .decode(&encoded)
                    .map_err(|e| anyhow::anyhow!("decode failed: {e}"))?;
                println!("{}", decoded.join(" "));
            }
        }
        Command::Forward {
            tokenizer,
            src,
            tgt,
            config,
        } => {
            let src_lines = read_lines(&src)?;
            let tgt_lines = read_lines(&tgt)?;
            if src_lines.len() != tgt_lines.len() {
                anyhow::bail!(
                    "source has {} lines but target has {}",
                    src_lines.len(),
                    tgt_lines.len()
                );
            }

            let device = Device::Cpu;
            let mut src_tokenizer = tokenizer.build()?;
            let mut tgt_tokenizer = tokenizer.build()?;
            let src_ids = src_tokenizer.encode_batch(&src_lines, &device)?;
            let tgt_ids = tgt_tokenizer.encode_batch(&tgt_lines, &device)?;

            let mut cfg = match config {
                Some(path) => Seq2SeqConfig::from_json_file(&path)
                    .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?,
                None => Seq2SeqConfig::default(),
            };
            cfg.encoder.input_dim = src_tokenizer.index_capacity();
            cfg.decoder.output_dim = tgt_tokenizer.index_capacity();
            let max_length = src_ids.dim(1)?.max(tgt_ids.dim(1)?);
            cfg.encoder.max_length = cfg.encoder.max_length.max(max_length);
            cfg.decoder.max_length = cfg.decoder.max_length.max(max_length);

            tracing::info!(
                src_vocab = cfg.encoder.input_dim,
                tgt_vocab = cfg.decoder.output_dim,
                "building randomly initialised model"
            );
            let varmap = VarMap::new();
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            let model = Seq2Seq::new(&cfg, vb)
                .map_err(|e| anyhow::anyhow!("failed to build model: {e}"))?;

            let out = model
                .forward(&src_ids, &tgt_ids, false)
                .map_err(|e| anyhow::anyhow!("forward pass failed: {e}"))?;

            println!(
                "{}",
                serde_json::json!({
                    "src_shape": src_ids.dims(),
                    "tgt_shape": tgt_ids.dims(),
                    "logits_shape": out.logits.dims(),
                    "attention_shape": out.attention.dims(),
                })
            );
        }
    }

    Ok(())
}
