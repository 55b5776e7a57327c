use super::tokenizer::Tokenizer;
use super::SpamTraining;
use crate::types::MailContent;
use std::sync::RwLock;

/// Spam verdicts for mail whose sender has no guideline yet.
pub trait SpamClassifier: Send + Sync {
    fn is_spam(&self, content: &MailContent) -> bool;
}

/// Scores and verdict for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub tokens: Vec<String>,
    pub ham_score: f64,
    pub spam_score: f64,
    pub is_spam: bool,
}

/// Chain-similarity classifier over a ham and a spam corpus.
pub struct SpamDetector {
    tokenizer: Tokenizer,
    training: RwLock<SpamTraining>,
}

impl SpamDetector {
    pub fn new(training: SpamTraining) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            training: RwLock::new(training),
        }
    }

    /// Swaps in freshly trained corpora.
    pub fn update(&self, training: SpamTraining) {
        log::info!(
            "Spam detector updated: {} ham and {} spam messages",
            training.ham.dataset_size,
            training.spam.dataset_size
        );
        *self.training.write().unwrap() = training;
    }

    /// `(ham, spam)` dataset sizes.
    pub fn dataset_sizes(&self) -> (usize, usize) {
        let training = self.training.read().unwrap();
        (training.ham.dataset_size, training.spam.dataset_size)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    pub fn analyze(&self, content: &MailContent) -> Analysis {
        let tokens = self.tokenize(&content.text());
        if tokens.is_empty() {
            // Nothing left to compare against: treat as spam
            return Analysis {
                tokens,
                ham_score: 0.0,
                spam_score: 0.0,
                is_spam: true,
            };
        }

        let training = self.training.read().unwrap();
        let ham_score = training.ham.score(&tokens);
        let spam_score = training.spam.score(&tokens);
        let is_spam = ham_score - spam_score < 0.0;
        log::debug!(
            "Mail {}: ham {ham_score:.6}, spam {spam_score:.6}, spam verdict {is_spam}",
            content.id
        );

        Analysis {
            tokens,
            ham_score,
            spam_score,
            is_spam,
        }
    }
}

impl SpamClassifier for SpamDetector {
    fn is_spam(&self, content: &MailContent) -> bool {
        self.analyze(content).is_spam
    }
}
