//! Grapheme-to-phoneme conversion backed by the CMU Pronouncing Dictionary.
//!
//! Dictionary lines look like `HELLO  HH AH0 L OW1`; alternate pronunciations are
//! written `HELLO(2) ...` and ignored. Words missing from the dictionary are spelled
//! out with a small letter-to-sound table, which is crude but always yields a first
//! phoneme for the aligner.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoachError, Result};

/// Word → ordered ARPAbet phoneme codes (with stress digits where known).
pub trait GraphemeToPhoneme: Send + Sync {
    fn phonemes(&self, word: &str) -> Vec<String>;
}

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z']").expect("NON_WORD regex is invalid"));

/// Lowercase and strip everything but letters and apostrophes.
fn clean_word(word: &str) -> String {
    NON_WORD
        .replace_all(&word.trim().to_lowercase(), "")
        .into_owned()
}

// Multi-letter spellings first so "sh" wins over "s"
const SPELLING: &[(&str, &str)] = &[
    ("tch", "CH"),
    ("sh", "SH"),
    ("ch", "CH"),
    ("th", "TH"),
    ("ph", "F"),
    ("ng", "NG"),
    ("ck", "K"),
    ("wh", "W"),
    ("ee", "IY1"),
    ("ea", "IY1"),
    ("oo", "UW1"),
    ("ou", "AW1"),
    ("ow", "OW1"),
    ("oy", "OY1"),
    ("oi", "OY1"),
    ("ai", "EY1"),
    ("ay", "EY1"),
    ("a", "AE1"),
    ("b", "B"),
    ("c", "K"),
    ("d", "D"),
    ("e", "EH1"),
    ("f", "F"),
    ("g", "G"),
    ("h", "HH"),
    ("i", "IH1"),
    ("j", "JH"),
    ("k", "K"),
    ("l", "L"),
    ("m", "M"),
    ("n", "N"),
    ("o", "AA1"),
    ("p", "P"),
    ("q", "K"),
    ("r", "R"),
    ("s", "S"),
    ("t", "T"),
    ("u", "AH1"),
    ("v", "V"),
    ("w", "W"),
    ("x", "K"),
    ("y", "Y"),
    ("z", "Z"),
];

/// Naive letter-to-sound rendering for out-of-vocabulary words.
pub fn spell_out(word: &str) -> Vec<String> {
    let mut rest = word;
    let mut phonemes = Vec::new();

    while !rest.is_empty() {
        match SPELLING.iter().find(|(graph, _)| rest.starts_with(graph)) {
            Some((graph, phoneme)) => {
                phonemes.push(phoneme.to_string());
                rest = &rest[graph.len()..];
            }
            None => {
                // Apostrophes and anything else without a sound
                let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                rest = &rest[skip..];
            }
        }
    }

    phonemes
}

#[derive(Debug, Clone, Default)]
pub struct CmuDictionary {
    entries: HashMap<String, Vec<String>>,
}

impl CmuDictionary {
    /// Parse dictionary text. Comment lines (`;;;`) and alternates are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(";;;") {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(head) = parts.next() else {
                continue;
            };
            if head.ends_with(')') {
                continue;
            }
            let phonemes: Vec<String> = parts.map(str::to_string).collect();
            if phonemes.is_empty() {
                continue;
            }
            entries.entry(head.to_lowercase()).or_insert(phonemes);
        }

        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        // The upstream file is Latin-1; non-ASCII entries are irrelevant here
        let text = String::from_utf8_lossy(&bytes);
        let dictionary = Self::parse(&text);
        if dictionary.is_empty() {
            return Err(CoachError::Config(format!(
                "No pronunciations found in {}",
                path.display()
            )));
        }
        log::info!(
            "📖 Loaded {} pronunciations from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, word: &str) -> Option<&[String]> {
        self.entries.get(&clean_word(word)).map(Vec::as_slice)
    }
}

impl GraphemeToPhoneme for CmuDictionary {
    fn phonemes(&self, word: &str) -> Vec<String> {
        match self.lookup(word) {
            Some(phonemes) => phonemes.to_vec(),
            None => {
                let cleaned = clean_word(word);
                log::debug!("'{}' not in dictionary, spelling it out", cleaned);
                spell_out(&cleaned)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = ";;; CMU dictionary excerpt
SUN  S AH1 N
SNAKE  S N EY1 K
HELLO  HH AH0 L OW1
HELLO(2)  HH EH0 L OW1
DON'T  D OW1 N T
";

    #[test]
    fn test_parse_keeps_first_pronunciation() {
        let dict = CmuDictionary::parse(SAMPLE);
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.phonemes("hello"), vec!["HH", "AH0", "L", "OW1"]);
    }

    #[test]
    fn test_clean_word() {
        assert_eq!(clean_word("  Don't! "), "don't");
        assert_eq!(clean_word("SUN,"), "sun");
        assert_eq!(clean_word("42"), "");
    }

    #[test]
    fn test_lookup_ignores_case_and_punctuation() {
        let dict = CmuDictionary::parse(SAMPLE);
        assert_eq!(dict.phonemes("Snake!"), vec!["S", "N", "EY1", "K"]);
        assert_eq!(dict.phonemes("don't"), vec!["D", "OW1", "N", "T"]);
    }

    #[test]
    fn test_unknown_word_is_spelled_out() {
        let dict = CmuDictionary::default();
        assert_eq!(dict.phonemes("shoe"), vec!["SH", "AA1", "EH1"]);
        assert_eq!(dict.phonemes("Zip"), vec!["Z", "IH1", "P"]);
        assert!(dict.phonemes("123").is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let dict = CmuDictionary::load(file.path()).unwrap();
        assert_eq!(dict.phonemes("sun"), vec!["S", "AH1", "N"]);
    }

    #[test]
    fn test_load_rejects_empty_dictionary() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(CmuDictionary::load(file.path()).is_err());
        assert!(CmuDictionary::load("/nonexistent/cmudict.dict").is_err());
    }
}
