//! Weighted n-gram spam classifier
//!
//! Text is tokenized into stemmed words, and every run of 2 to 4 consecutive tokens
//! (a chain) is looked up in a ham and a spam corpus.

pub mod classifier;
pub mod store;
pub mod tokenizer;
pub mod trainer;

pub use classifier::{Analysis, SpamClassifier, SpamDetector};
pub use store::{JsonTrainingStore, MemoryTrainingStore, SpamTrainingStore};
pub use tokenizer::Tokenizer;
pub use trainer::{FolderCheck, SpamTrainer, TrainingSources};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIN_CHAIN_LENGTH: usize = 2;
pub const MAX_CHAIN_LENGTH: usize = 4;

/// Sum of all chain lengths, used per token as the achievable weight of a message.
const CHAIN_LENGTH_SUM: usize =
    (MAX_CHAIN_LENGTH * (MAX_CHAIN_LENGTH + 1) - MIN_CHAIN_LENGTH * (MIN_CHAIN_LENGTH - 1)) / 2;

/// Every chain of `tokens` with its length, shortest chains first.
pub fn chains(tokens: &[String]) -> impl Iterator<Item = (usize, String)> + '_ {
    (MIN_CHAIN_LENGTH..=MAX_CHAIN_LENGTH)
        .flat_map(move |length| tokens.windows(length).map(move |w| (length, w.join(" "))))
}

/// One weighted chain corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub chain_weights: HashMap<String, f64>,
    /// Number of messages that contributed to `chain_weights`.
    pub dataset_size: usize,
}

impl TrainingDataset {
    /// Adds a tokenized message. Returns false when it is too short to contribute.
    pub fn add_message(&mut self, tokens: &[String]) -> bool {
        if tokens.len() < MIN_CHAIN_LENGTH {
            return false;
        }
        let token_count = tokens.len() as f64;
        for (length, chain) in chains(tokens) {
            *self.chain_weights.entry(chain).or_insert(0.0) += length as f64 / token_count;
        }
        self.dataset_size += 1;
        true
    }

    pub fn score(&self, tokens: &[String]) -> f64 {
        if tokens.len() < MIN_CHAIN_LENGTH {
            return 0.0;
        }

        let mut score = 0.0;
        // Tokens times the sum of chain lengths, not the exact number of windows
        let mut achievable = (tokens.len() * CHAIN_LENGTH_SUM) as f64;
        for (length, chain) in chains(tokens) {
            let weight = self.chain_weights.get(&chain).copied().unwrap_or(0.0);
            if weight > 0.0 {
                score += length as f64;
            } else {
                achievable -= length as f64;
            }
        }

        if achievable == 0.0 || self.dataset_size == 0 {
            return 0.0;
        }
        score / achievable / self.dataset_size as f64
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_size == 0
    }
}

/// The ham and spam corpora, always stored together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpamTraining {
    pub ham: TrainingDataset,
    pub spam: TrainingDataset,
}
