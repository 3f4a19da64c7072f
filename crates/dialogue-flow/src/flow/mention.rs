//! `@name` mention extraction and participant resolution.
//!
//! Resolution is deliberately permissive. A candidate matches a participant
//! when, ignoring case, the two are equal, the display name contains the
//! candidate, or the candidate contains the display name. The first
//! participant in registration order that matches wins.
//!
//! This tolerates nicknames and partial names (`@ali` finds "Alice") at the
//! price of false positives between overlapping names: `@Bob` resolves to
//! "Bobby" if "Bobby" registered first. There is no best-match ranking.
//!
//! `\w` is Unicode-aware, so `@José` and `@Zoë` capture the whole name
//! rather than stopping at the first non-ASCII letter.

use super::participant::Participant;
use regex::Regex;
use std::sync::LazyLock;

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("mention pattern is valid"));

/// Returns the `@name` tokens of `text` in order of appearance.
///
/// Names keep their original case. Repeated mentions are returned repeatedly.
///
/// # Examples
///
/// ```
/// use dialogue_flow::flow::extract_mentions;
///
/// let names = extract_mentions("@Bob and @carol, then @Bob again");
/// assert_eq!(names, vec!["Bob", "carol", "Bob"]);
/// ```
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}

/// Resolves a mention candidate to the first matching participant.
pub fn resolve_mention<'a>(
    candidate: &str,
    participants: &'a [Participant],
) -> Option<&'a Participant> {
    let candidate = candidate.to_lowercase();
    if candidate.is_empty() {
        return None;
    }

    participants.iter().find(|participant| {
        let name = participant.display_name.to_lowercase();
        // An empty name would be "contained" in every candidate.
        !name.is_empty()
            && (name == candidate || name.contains(&candidate) || candidate.contains(&name))
    })
}

/// Resolves every mention in `text`, in order, skipping unknown names.
pub(crate) fn resolve_all<'a>(text: &str, participants: &'a [Participant]) -> Vec<&'a Participant> {
    extract_mentions(text)
        .iter()
        .filter_map(|candidate| resolve_mention(candidate, participants))
        .collect()
}
