//! Unicode normalization and name-similarity helpers
//!
//! Authority files disagree on diacritics and name order, so comparisons
//! are done on folded, optionally reordered forms.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Categories removed when folding: combining marks, controls, format
    // characters, modifier letters and other symbols.
    static ref FOLDED_AWAY: Regex = Regex::new(r"[\p{Mn}\p{Cc}\p{Cf}\p{Lm}\p{So}]").unwrap();
    static ref WORD: Regex = Regex::new(r"\w+").unwrap();
}

/// Characters kept intact by default when folding accents. The tilde on
/// the enie is contrastive in Spanish authority headings.
pub const DEFAULT_KEEP: &str = "ñÑ";

/// NFKC-normalize a string.
pub fn nfkc(s: &str) -> String {
    s.nfkc().collect()
}

/// Remove diacritics and invisible characters from `text`, keeping any
/// character listed in `keep`. The input is NFKC-normalized first, each
/// remaining character is decomposed (NFKD) and stripped of the folded
/// categories, and the result is NFKC-normalized again.
pub fn fold_accents(text: &str, keep: &str) -> String {
    let keep: HashSet<char> = keep.nfkc().collect();
    let mut folded = String::with_capacity(text.len());
    for c in text.nfkc() {
        if keep.contains(&c) {
            folded.push(c);
            continue;
        }
        for d in std::iter::once(c).nfkd() {
            if !FOLDED_AWAY.is_match(d.encode_utf8(&mut [0u8; 4])) {
                folded.push(d);
            }
        }
    }
    folded.nfkc().collect()
}

/// Unit of comparison for [`similarity`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Granularity {
    /// Compare character sequences.
    #[default]
    Chars,
    /// Compare word sequences, one edit per word.
    Words,
}

/// Preprocessing applied to both strings before measuring similarity.
#[derive(Clone, Debug, Default)]
pub struct SimilarityOptions<'a> {
    pub fold_accents: bool,
    pub lowercase: bool,
    /// Sort words before comparing, so "García, Ana" matches "Ana García".
    pub sort_words: bool,
    pub granularity: Granularity,
    /// Words dropped before comparison. Only used with `Granularity::Words`.
    pub stopwords: &'a [&'a str],
}

/// Normalized Levenshtein similarity in [0, 1] between `a` and `b` after
/// applying `opts`. Two empty inputs compare as 1.0.
pub fn similarity(a: &str, b: &str, opts: &SimilarityOptions) -> f64 {
    let mut a = a.to_string();
    let mut b = b.to_string();
    if opts.fold_accents {
        a = fold_accents(&a, "");
        b = fold_accents(&b, "");
    }
    if opts.lowercase {
        a = a.to_lowercase();
        b = b.to_lowercase();
    }
    match opts.granularity {
        Granularity::Chars => {
            if opts.sort_words {
                a = sorted_words(&a);
                b = sorted_words(&b);
            }
            strsim::normalized_levenshtein(&a, &b)
        }
        Granularity::Words => {
            let mut wa = words(&a, opts.stopwords);
            let mut wb = words(&b, opts.stopwords);
            if opts.sort_words {
                wa.sort();
                wb.sort();
            }
            let longest = wa.len().max(wb.len());
            if longest == 0 {
                return 1.0;
            }
            let distance = strsim::generic_levenshtein(&wa, &wb);
            1.0 - (distance as f64) / (longest as f64)
        }
    }
}

fn words(s: &str, stopwords: &[&str]) -> Vec<String> {
    WORD.find_iter(s)
        .map(|m| m.as_str().to_string())
        .filter(|w| !stopwords.contains(&w.as_str()))
        .collect()
}

fn sorted_words(s: &str) -> String {
    let mut w: Vec<&str> = WORD.find_iter(s).map(|m| m.as_str()).collect();
    w.sort_unstable();
    w.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_accents_basic() {
        assert_eq!(fold_accents("Ángel Zazo", ""), "Angel Zazo");
        assert_eq!(fold_accents("Müller", ""), "Muller");
        assert_eq!(fold_accents("café", ""), "cafe");
    }

    #[test]
    fn test_fold_accents_keeps_enie() {
        assert_eq!(fold_accents("ñoño", DEFAULT_KEEP), "ñoño");
        assert_eq!(fold_accents("ñoño", ""), "nono");
        assert_eq!(fold_accents("Muñoz, Óscar", DEFAULT_KEEP), "Muñoz, Oscar");
    }

    #[test]
    fn test_fold_accents_decomposed_input() {
        // "a" followed by a combining caron
        assert_eq!(fold_accents("a\u{030C}", ""), "a");
        // Soft hyphen and zero-width space are format characters
        assert_eq!(fold_accents("Cer\u{00AD}van\u{200B}tes", ""), "Cervantes");
    }

    #[test]
    fn test_fold_accents_empty() {
        assert_eq!(fold_accents("", ""), "");
        assert_eq!(fold_accents("", DEFAULT_KEEP), "");
    }

    #[test]
    fn test_nfkc_compatibility_forms() {
        assert_eq!(nfkc("ﬁn"), "fin");
        assert_eq!(nfkc("①"), "1");
    }

    #[test]
    fn test_similarity_identical() {
        let opts = SimilarityOptions::default();
        assert_eq!(similarity("Cervantes", "Cervantes", &opts), 1.0);
        assert_eq!(similarity("", "", &opts), 1.0);
    }

    #[test]
    fn test_similarity_folded_and_reordered() {
        let opts = SimilarityOptions {
            fold_accents: true,
            lowercase: true,
            sort_words: true,
            granularity: Granularity::Words,
            ..Default::default()
        };
        assert_eq!(similarity("García, Ángel", "angel garcia", &opts), 1.0);
    }

    #[test]
    fn test_similarity_stopwords() {
        let opts = SimilarityOptions {
            lowercase: true,
            granularity: Granularity::Words,
            stopwords: &["de", "la"],
            ..Default::default()
        };
        assert_eq!(similarity("Vega, Lope de", "vega lope", &opts), 1.0);
    }

    #[test]
    fn test_similarity_word_distance() {
        let opts = SimilarityOptions {
            granularity: Granularity::Words,
            ..Default::default()
        };
        // One of two words differs
        let s = similarity("Miguel Cervantes", "Miguel Unamuno", &opts);
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_disjoint() {
        let opts = SimilarityOptions::default();
        assert!(similarity("abc", "xyz", &opts) < 0.01);
    }
}
