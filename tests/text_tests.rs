//! Text normalization and similarity integration tests

use proptest::prelude::*;
use rstest::rstest;
use wikitools::text::{Granularity, DEFAULT_KEEP};
use wikitools::{fold_accents, nfkc, similarity, SimilarityOptions};

#[rstest]
#[case("Ángel Zazo", "", "Angel Zazo")]
#[case("Müller, Jürgen", "", "Muller, Jurgen")]
#[case("Gabriel García Márquez", "", "Gabriel Garcia Marquez")]
#[case("Muñoz", DEFAULT_KEEP, "Muñoz")]
#[case("Muñoz", "", "Munoz")]
#[case("Þórður", "", "Þorður")]
fn test_fold_accents_cases(#[case] input: &str, #[case] keep: &str, #[case] expected: &str) {
    assert_eq!(fold_accents(input, keep), expected);
}

#[test]
fn test_fold_accents_handles_decomposed_input() {
    // Precomposed and decomposed forms fold identically
    assert_eq!(fold_accents("Garc\u{ED}a", ""), fold_accents("Garci\u{301}a", ""));
}

#[test]
fn test_nfkc_ligatures() {
    assert_eq!(nfkc("ﬁchier"), "fichier");
}

proptest! {
    #[test]
    fn prop_fold_accents_idempotent(s in "\\PC{0,40}") {
        let once = fold_accents(&s, DEFAULT_KEEP);
        let twice = fold_accents(&once, DEFAULT_KEEP);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_fold_accents_ascii_fixed_point(s in "[ -~]{0,40}") {
        // Printable ASCII has no diacritics to fold
        prop_assert_eq!(fold_accents(&s, ""), s);
    }

    #[test]
    fn prop_similarity_bounded_and_symmetric(a in "\\PC{0,20}", b in "\\PC{0,20}") {
        let opts = SimilarityOptions::default();
        let s = similarity(&a, &b, &opts);
        prop_assert!((0.0..=1.0).contains(&s));
        prop_assert!((s - similarity(&b, &a, &opts)).abs() < 1e-9);
    }
}

#[test]
fn test_similarity_reordered_names() {
    let opts = SimilarityOptions {
        fold_accents: true,
        lowercase: true,
        sort_words: true,
        granularity: Granularity::Words,
        ..Default::default()
    };
    assert_eq!(
        similarity("Cervantes Saavedra, Miguel de", "miguel de cervantes saavedra", &opts),
        1.0
    );
}

#[test]
fn test_similarity_char_vs_word_granularity() {
    let chars = SimilarityOptions::default();
    let words = SimilarityOptions {
        granularity: Granularity::Words,
        ..Default::default()
    };
    // One word of three replaced: word similarity is exactly 2/3
    let a = "Miguel de Cervantes";
    let b = "Miguel de Unamuno";
    let w = similarity(a, b, &words);
    assert!((w - 2.0 / 3.0).abs() < 1e-9);
    assert!(similarity(a, b, &chars) > 0.5);
}
