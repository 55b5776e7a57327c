use crate::language::{LanguageDetector, StemmingLanguage};
use crate::normalization::{Fragment, TextNormalizer};

/// Token standing in for any URL. It survives filtering.
pub const URL_TOKEN: &str = "<url>";

#[derive(Default)]
pub struct Tokenizer {
    normalizer: TextNormalizer,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizes `text`, stemming in its detected language.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenize_as(text, LanguageDetector::detect(text))
    }

    pub fn tokenize_as(&self, text: &str, language: StemmingLanguage) -> Vec<String> {
        self.normalizer
            .normalize(text)
            .into_iter()
            .filter_map(|fragment| match fragment {
                Fragment::Url => Some(URL_TOKEN.to_string()),
                Fragment::NonAlpha => None,
                // Single letters carry no signal
                Fragment::Word(word) if word.chars().count() <= 1 => None,
                Fragment::Word(word) => {
                    let stem = language.stem(&word);
                    (!stem.is_empty()).then_some(stem)
                }
            })
            .collect()
    }
}
