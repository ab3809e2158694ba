//! Tri-state first-time-buyer classifier.
//!
//! Returns `Some(true)`, `Some(false)`, or `None` when the text does not settle the question.
//! Negation always beats affirmation.

use std::sync::OnceLock;

use regex::Regex;

const FIRST_TIME: &str = r"\b(?:first|1st)(?:\s|-)*time(?:\s+(?:home\s*)?buyer|\s+homeowner)?\b";
const SEGMENT: &str = r"[^.!?]+[.!?]?";
const NEGATION_TOKENS: &[&str] = &[
    "not", "don't", "dont", "didn't", "didnt", "no", "never", "isn't", "isnt", "aren't", "arent",
    "ain't", "aint", "without",
];
const AFFIRMATIVE_TOKENS: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "sure",
    "correct",
    "true",
    "absolutely",
    "indeed",
    "definitely",
    "affirmative",
];
const NEGATION_BEFORE: &str = r"\b(?:not|no)\b[^.]*\b(?:first|1st)\b";
const NEGATION_AFTER: &str = r"\b(?:first|1st)\b[^.]*\b(?:not|no)\b";
const SELF_REFERENCE: &str = r"\b(?:i\s*(?:am|'m)|we\s*(?:are|'re)|this\s+is\s+my|it's\s+my|its\s+my)\b";
const DECLARATIVE: &str = r"\bfirst(?:\s|-)*time\s+buyer(?:\s+here)?\b";

struct Patterns {
    first_time: Regex,
    segment: Regex,
    negation: Regex,
    negation_before: Regex,
    negation_after: Regex,
    affirmative: Regex,
    self_reference: Regex,
    declarative: Regex,
}

fn token_pattern(tokens: &[&str]) -> String {
    format!(r"\b(?:{})\b", tokens.join("|"))
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            first_time: Regex::new(FIRST_TIME)?,
            segment: Regex::new(SEGMENT)?,
            negation: Regex::new(&token_pattern(NEGATION_TOKENS))?,
            negation_before: Regex::new(NEGATION_BEFORE)?,
            negation_after: Regex::new(NEGATION_AFTER)?,
            affirmative: Regex::new(&token_pattern(AFFIRMATIVE_TOKENS))?,
            self_reference: Regex::new(SELF_REFERENCE)?,
            declarative: Regex::new(DECLARATIVE)?,
        })
    }

    fn is_negated(&self, segment: &str) -> bool {
        self.negation.is_match(segment)
            || self.negation_before.is_match(segment)
            || self.negation_after.is_match(segment)
    }

    fn is_affirmed(&self, segment: &str) -> bool {
        if self.affirmative.is_match(segment) || self.self_reference.is_match(segment) {
            return true;
        }
        !segment.ends_with('?') && self.declarative.is_match(segment)
    }
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| match Patterns::compile() {
            Ok(patterns) => Some(patterns),
            Err(error) => {
                tracing::error!(%error, "first-time-buyer patterns failed to compile");
                None
            }
        })
        .as_ref()
}

pub fn classify(text: &str) -> Option<bool> {
    let patterns = patterns()?;
    let lower = text.to_lowercase();

    if !patterns.first_time.is_match(&lower) {
        return None;
    }

    let segments = patterns
        .segment
        .find_iter(&lower)
        .map(|found| found.as_str().trim())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();

    let relevant = if segments.is_empty() {
        vec![lower.as_str()]
    } else {
        segments.into_iter().filter(|segment| patterns.first_time.is_match(segment)).collect()
    };

    if relevant.is_empty() {
        return None;
    }

    if relevant.iter().any(|segment| patterns.is_negated(segment)) {
        return Some(false);
    }

    if relevant.iter().any(|segment| patterns.is_affirmed(segment)) {
        return Some(true);
    }

    if relevant.iter().all(|segment| segment.ends_with('?')) {
        None
    } else {
        Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, patterns};

    #[test]
    fn patterns_compile() {
        assert!(patterns().is_some());
    }

    #[test]
    fn affirmative_statements() {
        assert_eq!(classify("I am a first time buyer."), Some(true));
        assert_eq!(classify("Yes, first-time buyer here!"), Some(true));
        assert_eq!(classify("It's my first time buying a home."), Some(true));
        assert_eq!(classify("1st time homeowner"), Some(true));
    }

    #[test]
    fn negated_statements() {
        assert_eq!(classify("I am not a first time buyer."), Some(false));
        assert_eq!(classify("No, not a first-time buyer."), Some(false));
        assert_eq!(classify("We've never been first time buyers before"), Some(false));
    }

    #[test]
    fn negation_wins_over_affirmation_in_the_same_segment() {
        assert_eq!(classify("Yes, I'm not a first time buyer"), Some(false));
    }

    #[test]
    fn questions_do_not_decide() {
        assert_eq!(classify("What qualifies someone as a first time buyer?"), None);
        assert_eq!(classify("Am I a first-time buyer?"), None);
    }

    #[test]
    fn unrelated_text_does_not_decide() {
        assert_eq!(classify("Tell me about mortgage options."), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn only_segments_mentioning_first_time_are_considered() {
        assert_eq!(classify("No questions so far. First time buyer."), Some(true));
    }
}
