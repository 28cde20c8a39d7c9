//! Multilingual tokenization for lexical scoring.
//!
//! Tokens are lowercased, Arabic text is normalized (diacritics stripped,
//! alef and teh-marbuta variants collapsed), and per-language stopwords are
//! removed. The output only depends on `(text, language)`, which BM25 relies
//! on for exact term identity between indexing and querying.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("static word pattern"));

static ARABIC_DIACRITICS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{0617}-\x{061A}\x{064B}-\x{0652}]").expect("static diacritics pattern")
});

const ENGLISH_STOPWORDS: &[&str] = &["the", "a", "an", "and", "of", "to", "in", "is", "for", "on"];
const SPANISH_STOPWORDS: &[&str] = &["el", "la", "los", "las", "de", "y", "en", "que", "es"];
const ARABIC_STOPWORDS: &[&str] = &["و", "في", "من", "على", "أن", "هو", "هي"];

/// How raw text is split into candidate words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segmenter {
    /// Unicode word boundaries (UAX #29)
    #[default]
    UnicodeWords,
    /// Runs of `\w` characters
    Regex,
}

#[derive(Debug, Clone)]
pub struct MultilingualTokenizer {
    segmenter: Segmenter,
    stopwords: HashMap<&'static str, HashSet<&'static str>>,
}

impl MultilingualTokenizer {
    pub fn new() -> Self {
        Self::with_segmenter(Segmenter::default())
    }

    pub fn with_segmenter(segmenter: Segmenter) -> Self {
        let stopwords = HashMap::from([
            ("en", ENGLISH_STOPWORDS.iter().copied().collect()),
            ("es", SPANISH_STOPWORDS.iter().copied().collect()),
            ("ar", ARABIC_STOPWORDS.iter().copied().collect()),
        ]);

        Self { segmenter, stopwords }
    }

    pub fn segmenter(&self) -> Segmenter {
        self.segmenter
    }

    pub fn tokenize(&self, text: &str, language: &str) -> Vec<String> {
        let mut text = text.to_lowercase();
        if language == "ar" {
            text = normalize_arabic(&text);
        }

        let stopwords = self.stopwords.get(language);
        let keep = |token: &str| {
            token.chars().all(char::is_alphanumeric)
                && !stopwords.is_some_and(|set| set.contains(token))
        };

        match self.segmenter {
            Segmenter::UnicodeWords => text
                .unicode_words()
                .filter(|t| keep(t))
                .map(str::to_string)
                .collect(),
            Segmenter::Regex => WORD_RE
                .find_iter(&text)
                .map(|m| m.as_str())
                .filter(|t| keep(t))
                .map(str::to_string)
                .collect(),
        }
    }
}

impl Default for MultilingualTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip tashkeel and collapse letterform variants.
pub fn normalize_arabic(text: &str) -> String {
    ARABIC_DIACRITICS_RE
        .replace_all(text, "")
        .chars()
        .map(|c| match c {
            'أ' | 'إ' | 'آ' => 'ا',
            'ة' => 'ه',
            other => other,
        })
        .collect()
}
