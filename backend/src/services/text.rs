//! Shared text normalization and release-quality rules
//!
//! Everything downstream of the scraper (pre-filter, fuzzy scoring, entity
//! comparison) operates on the canonical form produced by [`normalize`].

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]+").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static YEAR_PADDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\b(19\d{2}|20\d{2})\b\s*").unwrap());

/// Release-quality tokens that disqualify a candidate outright.
/// Matched against uppercased sub-tokens only, never substrings.
const BANNED_QUALITY_TOKENS: &[&str] = &["TS", "CAM", "TELECINE", "HDCAM", "CAMRIP", "HDTS"];

/// Canonicalize a title for comparison: lowercase, separators to spaces,
/// punctuation to spaces, whitespace collapsed.
pub fn normalize(s: &str) -> String {
    let s = s.to_lowercase().replace(['_', '-'], " ");
    let s = NON_ALNUM.replace_all(&s, " ");
    MULTI_SPACE.replace_all(s.trim(), " ").into_owned()
}

/// First 4-digit year token in [1900, 2099], as it appears in the input
pub fn extract_year(s: &str) -> Option<String> {
    YEAR.find(s).map(|m| m.as_str().to_string())
}

/// Remove all year tokens and the whitespace around them
pub fn remove_year(s: &str) -> String {
    YEAR_PADDED.replace_all(s, " ").trim().to_string()
}

/// True when a release title fails the quality gate.
///
/// Disqualified candidates are dropped before any scoring or LLM call:
/// - "soundtrack" anywhere, case-insensitive
/// - "Telesync" anywhere, case-sensitive
/// - a banned token (TS, CAM, TELECINE, HDCAM, CAMRIP, HDTS) standing alone
///   after splitting on whitespace and then on `.`, `-`, `_`
pub fn is_disqualified(title: &str) -> bool {
    if title.to_lowercase().contains("soundtrack") {
        return true;
    }

    if title.contains("Telesync") {
        return true;
    }

    for token in title.split_whitespace() {
        for sub in token.split(['.', '-', '_']) {
            let upper = sub.to_uppercase();
            if BANNED_QUALITY_TOKENS.iter().any(|t| *t == upper) {
                return true;
            }
        }
    }

    false
}

/// The contiguous-phrase pre-filter: does the item label (year removed)
/// appear as a phrase inside the candidate title, once both are normalized?
///
/// Used to skip the LLM on obvious non-matches.
pub fn contains_as_phrase(candidate_title: &str, item_label: &str) -> bool {
    let title = normalize(candidate_title);
    let item = normalize(&remove_year(item_label));
    title.contains(&item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize("Dune.Part_Two-2024"), "dune part two 2024");
        assert_eq!(normalize("  The   Batman  "), "the batman");
        assert_eq!(normalize("Amélie!"), "am lie");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["Dune.2021.1080p", "Foo_bar-BAZ  qux", "", "a"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_extract_year_bounds() {
        assert_eq!(extract_year("Dune 2021"), Some("2021".to_string()));
        assert_eq!(extract_year("Metropolis 1927 restored"), Some("1927".to_string()));
        assert_eq!(extract_year("Back to 1899"), None);
        assert_eq!(extract_year("Year 2100 odyssey"), None);
        // Embedded digits inside longer numeric tokens do not count
        assert_eq!(extract_year("x120211080p"), None);
        assert_eq!(extract_year("no year here"), None);
    }

    #[test]
    fn test_extract_year_first_wins() {
        assert_eq!(extract_year("1984 remake 2023"), Some("1984".to_string()));
    }

    #[test]
    fn test_remove_year() {
        assert_eq!(remove_year("Dune 2021"), "Dune");
        assert_eq!(remove_year("2001 A Space Odyssey 1968"), "A Space Odyssey");
        assert_eq!(remove_year("No year"), "No year");
    }

    #[test]
    fn test_remove_year_idempotent() {
        for s in ["Dune 2021", "1984 remake 2023", "plain title"] {
            let once = remove_year(s);
            assert_eq!(remove_year(&once), once);
        }
    }

    #[test]
    fn test_disqualify_tokens() {
        assert!(is_disqualified("Movie TS 1080p"));
        assert!(is_disqualified("Movie.TELECINE.avi"));
        assert!(is_disqualified("Movie.2023.HDCAM-GROUP"));
        assert!(is_disqualified("Movie_CAMRIP_x264"));
        assert!(is_disqualified("Dune.2021.TS.XviD"));
        assert!(is_disqualified("Show HDTS rip"));
        // lowercase sub-tokens still match after uppercasing
        assert!(is_disqualified("movie.ts.xvid"));
    }

    #[test]
    fn test_disqualify_requires_standalone_token() {
        assert!(!is_disqualified("CATS the musical film"));
        assert!(!is_disqualified("Paints and brushes"));
        assert!(!is_disqualified("TSAR documentary"));
        assert!(!is_disqualified("Movie 1080p BluRay x264"));
    }

    #[test]
    fn test_disqualify_soundtrack_and_telesync() {
        assert!(is_disqualified("Dune (Original Motion Picture Soundtrack)"));
        assert!(is_disqualified("Dune SOUNDTRACK flac"));
        assert!(is_disqualified("Dune 2021 Telesync x264"));
        // "Telesync" is matched case-sensitively
        assert!(!is_disqualified("Dune 2021 telesync x264"));
    }

    #[test]
    fn test_contains_as_phrase() {
        assert!(contains_as_phrase("Dune.2021.1080p.BluRay.x264", "Dune 2021"));
        assert!(contains_as_phrase("dune part two 2160p", "Dune Part Two 2024"));
        assert!(!contains_as_phrase("Arrival 2016 720p", "Dune 2021"));
        // Phrase must be contiguous
        assert!(!contains_as_phrase("Dune extras Part Two", "Dune Part Two"));
    }
}
