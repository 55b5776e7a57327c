use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A piece of normalized text, before stemming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Url,
    /// A maximal run of characters that are neither ASCII letters nor whitespace.
    NonAlpha,
    /// A lower-cased run of ASCII letters.
    Word(String),
}

fn fold_letter(c: char) -> Option<&'static str> {
    let folded = match c {
        'ß' => "ss",
        'ẞ' => "SS",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ø' => "o",
        'Ø' => "O",
        'ł' => "l",
        'Ł' => "L",
        'đ' | 'ð' => "d",
        'Đ' | 'Ð' => "D",
        'þ' => "th",
        'Þ' => "TH",
        'ı' => "i",
        _ => return None,
    };
    Some(folded)
}

pub struct TextNormalizer {
    url_regex: Regex,
    non_alpha_regex: Regex,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            url_regex: Regex::new(r#"(?i)(?:https?://|www\.)[^\s<>"']+"#).unwrap(),
            non_alpha_regex: Regex::new(r"[^a-zA-Z\s]+").unwrap(),
        }
    }

    /// Strips diacritics: `é` becomes `e`, `ü` becomes `u`. Letters without a
    /// decomposition are folded to their usual Latin spelling (`ß` becomes `ss`).
    pub fn remove_accents(text: &str) -> String {
        let mut folded = String::with_capacity(text.len());
        for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
            match fold_letter(c) {
                Some(replacement) => folded.push_str(replacement),
                None => folded.push(c),
            }
        }
        folded
    }

    pub fn normalize(&self, text: &str) -> Vec<Fragment> {
        let text = Self::remove_accents(text);
        let mut fragments = Vec::new();
        let mut last = 0;

        for url in self.url_regex.find_iter(&text) {
            self.push_plain(&text[last..url.start()], &mut fragments);
            fragments.push(Fragment::Url);
            last = url.end();
        }
        self.push_plain(&text[last..], &mut fragments);

        fragments
    }

    fn push_plain(&self, text: &str, fragments: &mut Vec<Fragment>) {
        let spaced = self.non_alpha_regex.replace_all(text, " . ");
        for piece in spaced.split_whitespace() {
            if piece == "." {
                fragments.push(Fragment::NonAlpha);
            } else {
                fragments.push(Fragment::Word(piece.to_lowercase()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(w: &str) -> Fragment {
        Fragment::Word(w.to_string())
    }

    #[test]
    fn test_remove_accents() {
        assert_eq!(TextNormalizer::remove_accents("Déjà vu à Zürich"), "Deja vu a Zurich");
        assert_eq!(TextNormalizer::remove_accents("plain"), "plain");
    }

    #[test]
    fn test_urls_become_a_single_fragment() {
        let normalizer = TextNormalizer::new();
        let fragments = normalizer.normalize("Visit https://example.com/a?b=1 now");
        assert_eq!(fragments, vec![word("visit"), Fragment::Url, word("now")]);

        let fragments = normalizer.normalize("www.shop.example");
        assert_eq!(fragments, vec![Fragment::Url]);
    }

    #[test]
    fn test_non_letter_runs_collapse() {
        let normalizer = TextNormalizer::new();
        let fragments = normalizer.normalize("Save 50%!!! Today");
        assert_eq!(
            fragments,
            vec![word("save"), Fragment::NonAlpha, word("today")]
        );

        let fragments = normalizer.normalize("e-mail");
        assert_eq!(fragments, vec![word("e"), Fragment::NonAlpha, word("mail")]);
    }

    #[test]
    fn test_letters_without_decomposition_are_folded() {
        assert_eq!(
            TextNormalizer::remove_accents("Grüße aus der Straße"),
            "Grusse aus der Strasse"
        );
        assert_eq!(
            TextNormalizer::remove_accents("Øresund Æble œuvre"),
            "Oresund AEble oeuvre"
        );
        assert_eq!(TextNormalizer::remove_accents("Łódź"), "Lodz");

        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize("Straße, Øresund"),
            vec![word("strasse"), Fragment::NonAlpha, word("oresund")]
        );
    }

    #[test]
    fn test_accents_are_removed_before_splitting() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("Café"), vec![word("cafe")]);
    }

    #[test]
    fn test_empty_text() {
        assert!(TextNormalizer::new().normalize("   ").is_empty());
    }
}
