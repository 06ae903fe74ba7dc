//! Parsing of the judge's raw text into a verdict.
//!
//! The service is asked for exactly `true` or `false`, but models drift.
//! Matchers are tried from strictest to loosest and each one reports how much
//! it trusts its answer. Text nothing matches is a `false` verdict with zero
//! confidence; it is never an error.

use std::sync::LazyLock;

use regex::Regex;

/// Verdict extracted from the judge's text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedVerdict {
    pub beats: bool,
    /// 1.0 for an exact token, 0.0 for unparseable text.
    pub confidence: f64,
}

impl ParsedVerdict {
    const fn new(beats: bool, confidence: f64) -> Self {
        Self { beats, confidence }
    }
}

/// The token alone on the line. Decorated answers such as `True.` or
/// `Yes!` are left to the looser layers.
static ANCHORED: LazyLock<[(Regex, ParsedVerdict); 4]> = LazyLock::new(|| {
    let anchored =
        |word: &str| Regex::new(&format!(r"^\s*{word}\s*$")).expect("static verdict pattern");
    [
        (anchored("true"), ParsedVerdict::new(true, 0.95)),
        (anchored("false"), ParsedVerdict::new(false, 0.95)),
        (anchored("yes"), ParsedVerdict::new(true, 0.9)),
        (anchored("no"), ParsedVerdict::new(false, 0.9)),
    ]
});

pub fn parse_verdict(raw: &str) -> ParsedVerdict {
    let text = raw.trim().to_lowercase();

    match text.as_str() {
        "true" => return ParsedVerdict::new(true, 1.0),
        "false" => return ParsedVerdict::new(false, 1.0),
        _ => {}
    }

    if let Some((_, verdict)) = ANCHORED.iter().find(|(re, _)| re.is_match(&text)) {
        return *verdict;
    }

    match (text.contains("true"), text.contains("false")) {
        (true, false) => {
            tracing::warn!(response = %text, "verdict parsed by substring fallback");
            ParsedVerdict::new(true, 0.6)
        }
        (false, true) => {
            tracing::warn!(response = %text, "verdict parsed by substring fallback");
            ParsedVerdict::new(false, 0.6)
        }
        _ => {
            tracing::warn!(response = %text, "unparseable verdict, defaulting to false");
            ParsedVerdict::new(false, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_tokens() {
        assert_eq!(parse_verdict("true"), ParsedVerdict::new(true, 1.0));
        assert_eq!(parse_verdict("  FALSE\n"), ParsedVerdict::new(false, 1.0));
    }

    #[test]
    fn bare_yes_and_no() {
        assert_eq!(parse_verdict("Yes"), ParsedVerdict::new(true, 0.9));
        assert_eq!(parse_verdict("  NO\n"), ParsedVerdict::new(false, 0.9));
    }

    #[test]
    fn decorated_tokens_drop_to_looser_layers() {
        assert_eq!(parse_verdict("\"True.\""), ParsedVerdict::new(true, 0.6));
        assert_eq!(parse_verdict("**false**"), ParsedVerdict::new(false, 0.6));
        assert_eq!(parse_verdict("Yes!"), ParsedVerdict::new(false, 0.0));
        assert_eq!(parse_verdict("no."), ParsedVerdict::new(false, 0.0));
    }

    #[test]
    fn substring_fallback() {
        assert_eq!(
            parse_verdict("I think that is true, paper wins"),
            ParsedVerdict::new(true, 0.6)
        );
        assert_eq!(
            parse_verdict("that would be false I believe"),
            ParsedVerdict::new(false, 0.6)
        );
    }

    #[test]
    fn ambiguous_or_garbage_is_false_with_zero_confidence() {
        assert_eq!(parse_verdict("true or false?"), ParsedVerdict::new(false, 0.0));
        assert_eq!(parse_verdict("maybe"), ParsedVerdict::new(false, 0.0));
        assert_eq!(parse_verdict(""), ParsedVerdict::new(false, 0.0));
    }

    proptest! {
        #[test]
        fn confidence_stays_in_range(raw in ".{0,64}") {
            let parsed = parse_verdict(&raw);
            prop_assert!((0.0..=1.0).contains(&parsed.confidence));
            if parsed.confidence == 0.0 {
                prop_assert!(!parsed.beats);
            }
        }
    }
}
