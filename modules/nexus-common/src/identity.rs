//! Entity identity: canonical ids and collective-name rejection.
//!
//! Producers spell the same company many ways ("NVIDIA Inc.", "nvidia, inc",
//! "NVIDIA"). Every node and edge endpoint goes through [`normalize_id`] so
//! those collapse onto one canonical id.

use regex::Regex;
use std::sync::LazyLock;

static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[,.'"]"#).unwrap());
static LEGAL_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:inc|corp|co|ltd|llc|plc|company|corporation)\b").unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collective phrases that name a group of companies rather than one company.
/// Matched as whole words inside the normalized name, so a single word only
/// belongs here if no real company would carry it ("partners" and "investors"
/// would drop "Silver Lake Partners" and "Investors Title").
pub const GENERIC_TERMS: &[&str] = &[
    // single words
    "suppliers",
    "customers",
    "competitors",
    "vendors",
    "oem",
    "oems",
    "odms",
    "hyperscalers",
    "distributors",
    "resellers",
    // phrases
    "supplier base",
    "contract manufacturers",
    "server manufacturers",
    "chip manufacturers",
    "equipment manufacturers",
    "component makers",
    "cloud providers",
    "service providers",
    "system integrators",
    "various companies",
    "other companies",
    "multiple companies",
    "industry players",
    "end users",
    "ai startups",
    "government agencies",
];

/// Canonicalize a free-text entity name into a stable id.
///
/// Lowercases, turns `,` `.` `'` `"` into spaces, drops whole-word legal
/// suffixes, collapses whitespace. Empty input yields an empty id, which
/// callers must reject.
pub fn normalize_id(name: &str) -> String {
    let lowered = name.to_lowercase();
    let spaced = PUNCTUATION_RE.replace_all(&lowered, " ");
    let stripped = LEGAL_SUFFIX_RE.replace_all(&spaced, " ");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// True when the name describes a collective ("server manufacturers") instead
/// of a concrete entity. Such names never become nodes or edge endpoints.
pub fn is_generic_name(name: &str) -> bool {
    let normalized = normalize_id(name);
    if normalized.is_empty() {
        return false;
    }
    let padded = format!(" {normalized} ");
    GENERIC_TERMS
        .iter()
        .any(|term| padded.contains(&format!(" {term} ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_suffix_variants_collapse() {
        assert_eq!(normalize_id("NVIDIA Inc."), "nvidia");
        assert_eq!(normalize_id("nvidia, inc"), "nvidia");
        assert_eq!(normalize_id("NVIDIA"), "nvidia");
        assert_eq!(normalize_id("  NVIDIA   Corporation "), "nvidia");
    }

    #[test]
    fn multi_suffix_names_strip_every_suffix() {
        assert_eq!(
            normalize_id("Taiwan Semiconductor Manufacturing Co., Ltd."),
            "taiwan semiconductor manufacturing"
        );
        assert_eq!(normalize_id("Arm Holdings plc"), "arm holdings");
    }

    #[test]
    fn suffix_inside_a_word_is_kept() {
        assert_eq!(normalize_id("Cisco"), "cisco");
        assert_eq!(normalize_id("Incyte"), "incyte");
        assert_eq!(normalize_id("Coherent Corp."), "coherent");
    }

    #[test]
    fn quotes_become_spaces() {
        assert_eq!(normalize_id("Macy's"), "macy s");
        assert_eq!(normalize_id("\"Foxconn\""), "foxconn");
    }

    #[test]
    fn empty_and_suffix_only_names_normalize_to_empty() {
        assert_eq!(normalize_id(""), "");
        assert_eq!(normalize_id("   "), "");
        assert_eq!(normalize_id("Inc."), "");
    }

    #[test]
    fn collective_names_are_generic() {
        assert!(is_generic_name("Server Manufacturers"));
        assert!(is_generic_name("Cloud Providers"));
        assert!(is_generic_name("OEM"));
        assert!(is_generic_name("Contract manufacturers"));
        assert!(is_generic_name("suppliers"));
    }

    #[test]
    fn concrete_names_are_not_generic() {
        assert!(!is_generic_name("Supermicro"));
        assert!(!is_generic_name("NVIDIA"));
        assert!(!is_generic_name("Lehman Brothers"));
        assert!(!is_generic_name("Goodman Group"));
        assert!(!is_generic_name(""));
    }

    #[test]
    fn companies_named_after_a_category_word_survive() {
        assert!(!is_generic_name("Silver Lake Partners"));
        assert!(!is_generic_name("Brookfield Infrastructure Partners"));
        assert!(!is_generic_name("Manufacturers and Traders Trust"));
        assert!(!is_generic_name("Investors Title Company"));
        assert!(!is_generic_name("Poema Global"));
        assert!(!is_generic_name("GlobalFoundries"));
    }

    #[test]
    fn collective_phrase_inside_a_longer_name_is_generic() {
        assert!(is_generic_name("Various Tier-2 Suppliers"));
        assert!(is_generic_name("Major cloud providers"));
        assert!(is_generic_name("Asian OEMs"));
    }
}
