//! Bounded vocabulary tokenizer.
//!
//! Maps surface tokens to integer indices for model input. Index `0` is
//! padding, `1` is out-of-vocabulary, learned tokens start at `2`.
//!
//! In train mode unseen tokens are learned. Once the table holds more than
//! `num_words` learned entries, the least frequent entry is evicted before
//! the next insertion, so the table settles at `num_words + 1` entries.
//! Tokens seeded from a word list carry a pinned count and are only evicted
//! once nothing with a lower count remains.

mod table;

use candle_core::{Device, Tensor};

pub use table::VocabTable;

use crate::config::TokenizerConfig;
use crate::{Error, Result};

/// Padding index.
pub const PAD_INDEX: u32 = 0;
/// Out-of-vocabulary index.
pub const OOV_INDEX: u32 = 1;
/// Counter value given to seeded words. Counters saturate here.
pub const PINNED_COUNT: u64 = 100_000_000;
/// Decoded form of [`OOV_INDEX`].
pub const OOV_TOKEN: &str = "OOV";

const SOS_TOKEN: &str = "<sos>";
const EOS_TOKEN: &str = "<eos>";

/// Tokenizer with a bounded, frequency-evicted vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    cfg: TokenizerConfig,
    train: bool,
    table: VocabTable,
}

impl Tokenizer {
    /// Empty vocabulary, grown while in train mode.
    pub fn new(cfg: TokenizerConfig) -> Self {
        Self {
            cfg,
            train: true,
            table: VocabTable::new(),
        }
    }

    /// Seed from a token -> index mapping. `<sos>` and `<eos>` are dropped
    /// unless `cfg.sos_eos` is set; missing sentinels are ignored.
    ///
    /// Fails if a kept label sits on index `0` or `1`, or if two kept labels
    /// share an index.
    pub fn from_labels(
        cfg: TokenizerConfig,
        labels: impl IntoIterator<Item = (String, u32)>,
    ) -> Result<Self> {
        let keep_sentinels = cfg.sos_eos;
        let labels = labels
            .into_iter()
            .filter(|(token, _)| keep_sentinels || (token != SOS_TOKEN && token != EOS_TOKEN));
        let table = VocabTable::from_labels(labels)?;
        tracing::debug!(entries = table.len(), "tokenizer seeded from labels");
        Ok(Self {
            cfg,
            train: true,
            table,
        })
    }

    /// Seed from a word list. Words get consecutive indices from `2` and a
    /// pinned count. Repeated words keep their first index.
    pub fn from_words<S: Into<String>>(
        cfg: TokenizerConfig,
        words: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut table = VocabTable::new();
        for word in words {
            let word = word.into();
            if table.index_of(&word).is_some() {
                continue;
            }
            let index = (table.len() + 2) as u32;
            table.insert_pinned(word, index);
        }
        tracing::debug!(entries = table.len(), "tokenizer seeded from word list");
        Self {
            cfg,
            train: true,
            table,
        }
    }

    pub fn set_train(&mut self, train: bool) {
        self.train = train;
    }

    pub fn is_training(&self) -> bool {
        self.train
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.cfg
    }

    /// Number of learned entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.table.index_of(token)
    }

    pub fn token_of(&self, index: u32) -> Option<&str> {
        self.table.token_of(index)
    }

    pub fn frequency_of(&self, token: &str) -> Option<u64> {
        self.table.frequency_of(token)
    }

    pub fn table(&self) -> &VocabTable {
        &self.table
    }

    /// Exclusive upper bound on any index this tokenizer can emit.
    ///
    /// Use it as the row count of the matching embedding table.
    pub fn index_capacity(&self) -> usize {
        let learned_bound = self.cfg.num_words + 3;
        let live_bound = self.table.max_index().map_or(0, |i| i as usize + 1);
        learned_bound.max(live_bound)
    }

    /// Encode a token sequence, right-padded with [`PAD_INDEX`] to
    /// `max_seq_len`.
    ///
    /// Over-length input is kept whole unless `truncate` is configured, in
    /// which case tokens past `max_seq_len` are ignored entirely.
    pub fn encode<S: AsRef<str>>(&mut self, sentence: &[S]) -> Vec<u32> {
        let tokens = if self.cfg.truncate {
            &sentence[..sentence.len().min(self.cfg.max_seq_len)]
        } else {
            sentence
        };

        let mut sequence = Vec::with_capacity(tokens.len().max(self.cfg.max_seq_len));
        for token in tokens {
            let token = token.as_ref();
            let index = match self.table.touch(token) {
                Some(index) => index,
                None if self.train => self.learn(token),
                None => OOV_INDEX,
            };
            sequence.push(index);
        }

        if sequence.len() < self.cfg.max_seq_len {
            sequence.resize(self.cfg.max_seq_len, PAD_INDEX);
        }
        sequence
    }

    /// Encode several sentences into a `[batch, len]` u32 tensor.
    pub fn encode_batch<S: AsRef<str>>(
        &mut self,
        sentences: &[Vec<S>],
        device: &Device,
    ) -> Result<Tensor> {
        let mut flat = Vec::new();
        let mut seq_len = None;
        for sentence in sentences {
            let encoded = self.encode(sentence);
            match seq_len {
                None => seq_len = Some(encoded.len()),
                Some(expected) if expected != encoded.len() => {
                    return Err(Error::RaggedBatch {
                        expected,
                        found: encoded.len(),
                    });
                }
                Some(_) => {}
            }
            flat.extend(encoded);
        }
        let seq_len = seq_len.unwrap_or(self.cfg.max_seq_len);
        Ok(Tensor::from_vec(flat, (sentences.len(), seq_len), device)?)
    }

    /// Decode indices back to tokens. Padding is skipped and
    /// [`OOV_INDEX`] becomes `"OOV"`.
    ///
    /// Fails on indices with no live entry. Eviction frees an index and the
    /// next learned token takes it over, so a sequence encoded before an
    /// eviction can decode the evicted slot to that newer token instead of
    /// failing. Decode with the same vocabulary state that encoded when the
    /// exact tokens matter.
    pub fn decode(&self, sequence: &[u32]) -> Result<Vec<String>> {
        let mut sentence = Vec::with_capacity(sequence.len());
        for &index in sequence {
            match index {
                OOV_INDEX => sentence.push(OOV_TOKEN.to_string()),
                PAD_INDEX => {}
                _ => {
                    let token = self.table.token_of(index).ok_or(Error::UnknownIndex(index))?;
                    sentence.push(token.to_string());
                }
            }
        }
        Ok(sentence)
    }

    fn learn(&mut self, token: &str) -> u32 {
        if self.table.len() > self.cfg.num_words
            && let Some((evicted, index)) = self.table.evict_min()
        {
            tracing::debug!(token = %evicted, index, "evicted least frequent token");
        }
        let index = self.table.insert(token.to_string());
        tracing::trace!(token, index, "learned token");
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(num_words: usize, max_seq_len: usize) -> Tokenizer {
        Tokenizer::new(TokenizerConfig {
            num_words,
            max_seq_len,
            ..TokenizerConfig::default()
        })
    }

    #[test]
    fn test_encode_learns_and_pads() {
        let mut tok = tokenizer(10, 5);
        assert_eq!(tok.encode(&["a", "b"]), vec![2, 3, 0, 0, 0]);
        assert_eq!(tok.encode(&["b", "a", "c"]), vec![3, 2, 4, 0, 0]);
        assert_eq!(tok.frequency_of("a"), Some(2));
        assert_eq!(tok.frequency_of("c"), Some(1));
    }

    #[test]
    fn test_unseen_token_outside_train_is_oov() {
        let mut tok = tokenizer(10, 4);
        tok.encode(&["a"]);
        tok.set_train(false);
        assert!(!tok.is_training());
        assert_eq!(tok.encode(&["zzz", "a"]), vec![OOV_INDEX, 2, 0, 0]);
        assert_eq!(tok.len(), 1);
        assert_eq!(tok.index_of("zzz"), None);
    }

    #[test]
    fn test_capacity_example() {
        let mut tok = tokenizer(3, 5);
        assert_eq!(tok.encode(&["a", "b", "c", "d"]), vec![2, 3, 4, 5, 0]);
        assert_eq!(tok.len(), 4);

        // Table now exceeds num_words, so "e" evicts the oldest of the
        // equally counted entries.
        assert_eq!(tok.encode(&["e"]), vec![2, 0, 0, 0, 0]);
        assert_eq!(tok.index_of("a"), None);
        assert_eq!(tok.len(), 4);

        tok.set_train(false);
        assert_eq!(tok.encode(&["a", "d"]), vec![OOV_INDEX, 5, 0, 0, 0]);
    }

    #[test]
    fn test_learned_entries_never_exceed_ceiling() {
        let mut tok = tokenizer(3, 2);
        for i in 0..50 {
            tok.encode(&[format!("w{i}")]);
            assert!(tok.len() <= 4, "len {} after {} inserts", tok.len(), i + 1);
        }
        assert_eq!(tok.len(), 4);
        for (token, index) in tok.table().iter() {
            assert_eq!(tok.token_of(index), Some(token));
            assert!((2..6).contains(&index));
        }
    }

    #[test]
    fn test_eviction_picks_minimum_frequency() {
        let mut tok = tokenizer(2, 4);
        tok.encode(&["a", "a", "b", "c"]);
        tok.encode(&["c"]);
        // a=2, b=1, c=2
        tok.encode(&["d"]);
        assert_eq!(tok.index_of("b"), None);
        assert!(tok.index_of("a").is_some());
        assert!(tok.index_of("c").is_some());
        assert!(tok.index_of("d").is_some());
    }

    #[test]
    fn test_pinned_words_survive_eviction() {
        let cfg = TokenizerConfig {
            num_words: 2,
            max_seq_len: 3,
            ..TokenizerConfig::default()
        };
        let mut tok = Tokenizer::from_words(cfg, ["x", "y"]);
        assert_eq!(tok.index_of("x"), Some(2));
        assert_eq!(tok.index_of("y"), Some(3));

        for word in ["p", "q", "r", "s"] {
            tok.encode(&[word]);
        }
        assert_eq!(tok.index_of("x"), Some(2));
        assert_eq!(tok.index_of("y"), Some(3));
        assert_eq!(tok.len(), 3);

        tok.encode(&["x"]);
        assert_eq!(tok.frequency_of("x"), Some(PINNED_COUNT));
    }

    #[test]
    fn test_from_words_skips_repeats() {
        let mut tok = Tokenizer::from_words(TokenizerConfig::default(), ["a", "b", "a", "c"]);
        assert_eq!(tok.len(), 3);
        assert_eq!(tok.index_of("c"), Some(4));
        tok.set_train(false);
        assert_eq!(&tok.encode(&["c", "b"])[..2], &[4, 3]);
    }

    #[test]
    fn test_labels_strip_sentinels() {
        let labels = vec![
            ("<sos>".to_string(), 2),
            ("<eos>".to_string(), 3),
            ("hello".to_string(), 4),
        ];
        let tok = Tokenizer::from_labels(TokenizerConfig::default(), labels.clone()).unwrap();
        assert_eq!(tok.len(), 1);
        assert_eq!(tok.index_of("<sos>"), None);
        assert_eq!(tok.frequency_of("hello"), Some(0));

        let cfg = TokenizerConfig {
            sos_eos: true,
            ..TokenizerConfig::default()
        };
        let tok = Tokenizer::from_labels(cfg, labels).unwrap();
        assert_eq!(tok.len(), 3);
        assert_eq!(tok.index_of("<eos>"), Some(3));
    }

    #[test]
    fn test_stripped_sentinel_may_share_index() {
        let labels = vec![("<sos>".to_string(), 2), ("hello".to_string(), 2)];
        let tok = Tokenizer::from_labels(TokenizerConfig::default(), labels.clone()).unwrap();
        assert_eq!(tok.index_of("hello"), Some(2));
        assert_eq!(tok.len(), 1);

        let cfg = TokenizerConfig {
            sos_eos: true,
            ..TokenizerConfig::default()
        };
        assert!(matches!(
            Tokenizer::from_labels(cfg, labels),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_labels_on_reserved_index_rejected() {
        let labels = vec![("<pad>".to_string(), PAD_INDEX), ("hello".to_string(), 2)];
        assert!(Tokenizer::from_labels(TokenizerConfig::default(), labels).is_err());
    }

    #[test]
    fn test_labels_without_sentinels_are_fine() {
        let labels = vec![("hello".to_string(), 2)];
        let tok = Tokenizer::from_labels(TokenizerConfig::default(), labels).unwrap();
        assert_eq!(tok.len(), 1);
    }

    #[test]
    fn test_decode() {
        let mut tok = tokenizer(10, 6);
        let encoded = tok.encode(&["the", "cat"]);
        assert_eq!(tok.decode(&encoded).unwrap(), vec!["the", "cat"]);
        assert_eq!(
            tok.decode(&[2, OOV_INDEX, PAD_INDEX, 3]).unwrap(),
            vec!["the", "OOV", "cat"]
        );
        assert!(matches!(tok.decode(&[99]), Err(Error::UnknownIndex(99))));
    }

    #[test]
    fn test_round_trip_with_oov() {
        let mut tok = tokenizer(10, 6);
        tok.encode(&["a", "b"]);
        tok.set_train(false);
        let encoded = tok.encode(&["b", "x", "a"]);
        assert_eq!(tok.decode(&encoded).unwrap(), vec!["b", "OOV", "a"]);
    }

    #[test]
    fn test_decode_after_eviction_sees_reused_index() {
        let mut tok = tokenizer(1, 2);
        let encoded = tok.encode(&["a", "b"]);
        assert_eq!(encoded, vec![2, 3]);
        // "c" evicts "a" and takes over index 2; index 3 stays live.
        tok.encode(&["c"]);
        assert_eq!(tok.decode(&encoded).unwrap(), vec!["c", "b"]);
        assert!(tok.decode(&[7]).is_err());
    }

    #[test]
    fn test_over_length_kept_by_default() {
        let mut tok = tokenizer(10, 3);
        let encoded = tok.encode(&["a", "b", "c", "d", "e"]);
        assert_eq!(encoded, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_over_length_truncated() {
        let mut tok = Tokenizer::new(TokenizerConfig {
            num_words: 10,
            max_seq_len: 3,
            truncate: true,
            ..TokenizerConfig::default()
        });
        assert_eq!(tok.encode(&["a", "b", "c", "d", "e"]), vec![2, 3, 4]);
        assert_eq!(tok.index_of("d"), None);
        assert_eq!(tok.len(), 3);
    }

    #[test]
    fn test_encode_batch() {
        let mut tok = tokenizer(10, 4);
        let batch = vec![vec!["a", "b"], vec!["c"]];
        let t = tok.encode_batch(&batch, &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[2, 4]);
        assert_eq!(
            t.to_vec2::<u32>().unwrap(),
            vec![vec![2, 3, 0, 0], vec![4, 0, 0, 0]]
        );
    }

    #[test]
    fn test_encode_batch_ragged() {
        let mut tok = tokenizer(10, 2);
        let batch = vec![vec!["a"], vec!["b", "c", "d"]];
        let err = tok.encode_batch(&batch, &Device::Cpu).unwrap_err();
        assert!(matches!(
            err,
            Error::RaggedBatch {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_index_capacity() {
        let mut tok = tokenizer(3, 1);
        assert_eq!(tok.index_capacity(), 6);
        for i in 0..20 {
            let index = tok.encode(&[format!("t{i}")])[0];
            assert!((index as usize) < tok.index_capacity());
        }

        let labels = vec![("far".to_string(), 40)];
        let tok = Tokenizer::from_labels(TokenizerConfig::default(), labels).unwrap();
        assert_eq!(tok.index_capacity(), 203);
        let cfg = TokenizerConfig {
            num_words: 5,
            ..TokenizerConfig::default()
        };
        let tok = Tokenizer::from_labels(cfg, vec![("far".to_string(), 40)]).unwrap();
        assert_eq!(tok.index_capacity(), 41);
    }
}
