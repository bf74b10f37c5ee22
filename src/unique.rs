//! Duplicate-key mapping onto declared domain errors.
//!
//! Records declare which unique index corresponds to which domain error;
//! when an insert or update trips one, the driver error is swapped for the
//! declared error with the raw failure kept as the source. Anything that
//! does not parse or does not match passes through untouched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SkiffError;
use crate::record::Record;

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"for key '(.*?)'").unwrap());
static CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"constraint "(.*?)""#).unwrap());

/// True when the driver message reads as a unique violation.
pub(crate) fn is_unique_violation(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("duplicate key")
        || lower.contains("duplicate entry")
        || lower.contains("unique constraint")
        || lower.contains("unique violation")
}

fn extract_index(message: &str) -> Option<String> {
    KEY_RE
        .captures(message)
        .or_else(|| CONSTRAINT_RE.captures(message))
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_lowercase())
}

fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Map a duplicate-key failure to the record's declared index error.
///
/// The index name is matched exact-qualified first, then by the suffix after
/// the last qualifier, case-insensitively. A miss at any stage returns `raw`
/// unchanged. Never invents an error class.
pub fn map_duplicate_key<R: Record>(raw: SkiffError) -> SkiffError {
    let entries = R::unique_index_errors();
    if entries.is_empty() {
        return raw;
    }
    let message = raw.to_string();
    if !is_unique_violation(&message) {
        return raw;
    }
    let Some(extracted) = extract_index(&message) else {
        return raw;
    };

    let matched = entries
        .iter()
        .find(|entry| entry.index.to_lowercase() == extracted)
        .or_else(|| {
            entries
                .iter()
                .find(|entry| unqualified(&entry.index.to_lowercase()) == unqualified(&extracted))
        });

    match matched {
        Some(entry) => SkiffError::DuplicateKey {
            index: entry.index.clone(),
            error: entry.error.clone(),
            cause: Box::new(raw),
        },
        None => raw,
    }
}
