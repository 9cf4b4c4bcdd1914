//! Course-code canonicalization
//!
//! Extracts course-code tokens (2-6 uppercase letters, 2-4 digits, optional
//! trailing letter, e.g. "CS 137", "MATH119", "ECE105A") from arbitrary text
//! and normalizes them into one of two canonical profiles. All downstream
//! joins inside the compiler use [`CanonProfile::Compact`].

use regex::Regex;
use std::sync::LazyLock;

/// Matches a course code in running text, tolerating an optional space or
/// hyphen between subject and number ("CS 137", "CS-137", "CS137").
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,6})[ -]?(\d{2,4}[A-Z]?)\b").unwrap());

/// Anchored match for an already-collapsed token like "CS341".
static BARE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{2,6})(\d{2,4}[A-Z]?)$").unwrap());

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Canonical rendering of a course code.
///
/// Some consumers join on "CS137", others on "CS 137"; both forms are
/// supported, selected by the caller. The merge stage uses `Compact`
/// repo-wide so the two spellings never become distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonProfile {
    /// "CS137" - subject letters concatenated with digits+suffix.
    #[default]
    Compact,
    /// "CS 137" - a single space between subject and number.
    Spaced,
}

impl CanonProfile {
    fn render(&self, subject: &str, number: &str) -> String {
        match self {
            CanonProfile::Compact => format!("{}{}", subject, number),
            CanonProfile::Spaced => format!("{} {}", subject, number),
        }
    }
}

/// Canonicalize the first course code found in `text`, or None.
///
/// Uppercases first, so "cs341" and "CS 341" both canonicalize. Never
/// errors; unparseable input yields None.
pub fn canonicalize(text: &str, profile: CanonProfile) -> Option<String> {
    let upper = text.to_uppercase();
    if let Some(caps) = CODE_RE.captures(&upper) {
        return Some(profile.render(&caps[1], &caps[2]));
    }
    // Collapsed fallback: strip whitespace and try an anchored match,
    // catching inputs like "cs 341" that word boundaries missed.
    let collapsed: String = upper.chars().filter(|c| !c.is_whitespace()).collect();
    BARE_CODE_RE
        .captures(&collapsed)
        .map(|caps| profile.render(&caps[1], &caps[2]))
}

/// Extract every course code in `text`, in order of appearance.
///
/// Duplicates are preserved; callers dedup where set semantics apply.
pub fn find_codes(text: &str, profile: CanonProfile) -> Vec<String> {
    CODE_RE
        .captures_iter(&text.to_uppercase())
        .map(|caps| profile.render(&caps[1], &caps[2]))
        .collect()
}

/// Derive (subject, level) from a canonical code.
///
/// Level buckets by the leading digits: >=400 -> 400, >=300 -> 300,
/// >=200 -> 200, otherwise 100. A code with no digits yields level 0.
pub fn subject_and_level(code: &str) -> (String, u32) {
    let upper = code.to_uppercase();
    let parts = CODE_RE
        .captures(&upper)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .or_else(|| {
            let collapsed: String = upper.chars().filter(|c| !c.is_whitespace()).collect();
            BARE_CODE_RE
                .captures(&collapsed)
                .map(|c| (c[1].to_string(), c[2].to_string()))
        });
    let Some((subject, number)) = parts else {
        return (String::new(), 0);
    };
    let level = DIGITS_RE
        .find(&number)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|n| {
            if n >= 400 {
                400
            } else if n >= 300 {
                300
            } else if n >= 200 {
                200
            } else {
                100
            }
        })
        .unwrap_or(0);
    (subject, level)
}
