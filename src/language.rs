use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use whatlang::{Detector, Lang};

/// Minimum detector confidence before French or German stemming is used.
const MIN_CONFIDENCE: f64 = 0.3;

// Stateless and read-only, shared by every tokenizer call
static DETECTOR: Lazy<Detector> = Lazy::new(Detector::new);

static ENGLISH: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));
static FRENCH: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::French));
static GERMAN: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::German));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemmingLanguage {
    English,
    French,
    German,
}

impl StemmingLanguage {
    pub fn stemmer(self) -> &'static Stemmer {
        match self {
            StemmingLanguage::English => &ENGLISH,
            StemmingLanguage::French => &FRENCH,
            StemmingLanguage::German => &GERMAN,
        }
    }

    pub fn stem(self, word: &str) -> String {
        self.stemmer().stem(word).into_owned()
    }
}

pub struct LanguageDetector;

impl LanguageDetector {
    /// Dominant language of `text` among French and German, English otherwise.
    pub fn detect(text: &str) -> StemmingLanguage {
        let Some(info) = DETECTOR.detect(text) else {
            return StemmingLanguage::English;
        };

        match info.lang() {
            Lang::Deu if info.confidence() > MIN_CONFIDENCE => StemmingLanguage::German,
            Lang::Fra if info.confidence() > MIN_CONFIDENCE => StemmingLanguage::French,
            lang => {
                log::debug!(
                    "Stemming as English (detected {} with confidence {:.2})",
                    lang.eng_name(),
                    info.confidence()
                );
                StemmingLanguage::English
            }
        }
    }
}
