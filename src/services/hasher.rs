//! Deterministic address fingerprint ("hexacle") hashing.
//!
//! The fingerprint is the only join key between imported rows and the
//! reference store, so it must be byte-for-byte reproducible across runs.
//! Everything here is a pure function of its inputs.

use chrono::{DateTime, SecondsFormat, Utc};

/// Maximum fingerprint length in characters.
const MAX_HASH_LEN: usize = 255;

/// Normalize a fingerprint component string.
///
/// Strips all whitespace plus `-`, `.` and `:`, upper-cases, and truncates to
/// 255 characters. Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | ':'))
        .collect();

    cleaned.to_uppercase().chars().take(MAX_HASH_LEN).collect()
}

/// Compute the address fingerprint from the four address components.
///
/// Components are concatenated in fixed order with missing values treated as
/// empty strings, then normalized. All-empty input yields the empty string,
/// which callers must never use as a lookup key.
pub fn hexacle_hash(
    numero: Option<&str>,
    voie: Option<&str>,
    ville: Option<&str>,
    cod_post: Option<&str>,
) -> String {
    let concatenated = format!(
        "{}{}{}{}",
        numero.unwrap_or(""),
        voie.unwrap_or(""),
        ville.unwrap_or(""),
        cod_post.unwrap_or("")
    );

    normalize(&concatenated)
}

/// Time-salted fingerprint variant for audit trails.
///
/// Prefixes the computation timestamp (ISO 8601) before normalization. Not
/// stable across runs and never used for matching.
pub fn salted_hash(
    computed_at: DateTime<Utc>,
    numero: Option<&str>,
    voie: Option<&str>,
    ville: Option<&str>,
    cod_post: Option<&str>,
) -> String {
    let concatenated = format!(
        "{}{}{}{}{}",
        computed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        numero.unwrap_or(""),
        voie.unwrap_or(""),
        ville.unwrap_or(""),
        cod_post.unwrap_or("")
    );

    normalize(&concatenated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = hexacle_hash(Some("12"), Some("rue de la Paix"), Some("Paris"), Some("75002"));
        let b = hexacle_hash(Some("12"), Some("rue de la Paix"), Some("Paris"), Some("75002"));
        assert_eq!(a, b);
        assert_eq!(a, "12RUEDELAPAIXPARIS75002");
    }

    #[test]
    fn test_separators_and_case_are_normalized() {
        let spaced = hexacle_hash(Some(" 12 "), Some("Rue-de-la-Paix"), Some("paris"), Some("75.002"));
        let plain = hexacle_hash(Some("12"), Some("ruedelapaix"), Some("PARIS"), Some("75002"));
        assert_eq!(spaced, plain);
    }

    #[test]
    fn test_missing_components_collapse() {
        assert_eq!(hexacle_hash(None, Some("voie"), None, None), "VOIE");
        assert_eq!(hexacle_hash(None, None, None, None), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("  12 rue: de-la.Paix  ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_hash_is_truncated() {
        let long = "x".repeat(600);
        assert_eq!(hexacle_hash(Some(&long), None, None, None).len(), 255);
    }

    #[test]
    fn test_salted_hash_embeds_timestamp() {
        let at = "2026-08-30T10:00:00Z".parse().unwrap();
        let salted = salted_hash(at, Some("12"), Some("rue"), None, None);
        assert!(salted.starts_with("20260830T100000Z"));
        assert!(salted.ends_with("12RUE"));
    }
}
