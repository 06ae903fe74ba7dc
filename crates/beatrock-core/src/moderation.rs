//! Guess moderation and prompt-injection screening.
//!
//! Guesses are forwarded to a text-generation service, so anything offensive
//! or shaped like an instruction is turned away before a verdict is requested.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Outcome of [`moderate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationResult {
    pub is_acceptable: bool,
    pub reason: String,
}

impl ModerationResult {
    fn accept() -> Self {
        Self {
            is_acceptable: true,
            reason: String::new(),
        }
    }

    fn reject(reason: &str) -> Self {
        Self {
            is_acceptable: false,
            reason: reason.to_string(),
        }
    }
}

const BLOCKED_WORDS: &[&str] = &[
    "ass", "asshole", "bitch", "bullshit", "crap", "cunt", "damn", "dick", "fuck", "piss",
    "shit", "slut", "whore",
];

const LEET_SUBSTITUTIONS: &[(char, &[char])] = &[
    ('a', &['@', '4']),
    ('b', &['8']),
    ('e', &['3']),
    ('i', &['1', '!']),
    ('l', &['1']),
    ('o', &['0']),
    ('s', &['5', '$']),
    ('t', &['7']),
];

const INAPPROPRIATE: &str = "Content contains inappropriate language";

/// Blocked words plus every leetspeak spelling of them.
static BLOCKED_VARIANTS: LazyLock<BTreeSet<String>> = LazyLock::new(|| {
    BLOCKED_WORDS
        .iter()
        .flat_map(|word| leet_variants(word))
        .collect()
});

/// Blocked words spelled out with separators between the letters.
static EVASION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"f+[^a-z]*u+[^a-z]*c+[^a-z]*k+",
        r"s+[^a-z]*h+[^a-z]*i+[^a-z]*t+",
        r"b+[^a-z]*i+[^a-z]*t+[^a-z]*c+[^a-z]*h+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"ignore (previous|above|all) instructions",
        r"disregard .*? instructions",
        r"do not (follow|adhere to) .*? (instructions|rules)",
        r"new instructions",
        r"your (real|actual) purpose",
        r"you (are|will) (now|actually) (act|work) as",
        r"system (prompt|message|instruction)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// All spellings of `word` reachable through [`LEET_SUBSTITUTIONS`],
/// including the word itself.
fn leet_variants(word: &str) -> Vec<String> {
    let mut variants = vec![word.to_string()];
    for (plain, replacements) in LEET_SUBSTITUTIONS {
        if !word.contains(*plain) {
            continue;
        }
        let mut added = Vec::new();
        for variant in &variants {
            for replacement in *replacements {
                added.push(variant.replace(*plain, &replacement.to_string()));
            }
        }
        variants.extend(added);
    }
    variants
}

/// True when any character repeats `run` or more times in a row.
fn has_repeated_run(text: &str, run: usize) -> bool {
    let mut previous = None;
    let mut length = 0;
    for c in text.chars() {
        if Some(c) == previous {
            length += 1;
        } else {
            previous = Some(c);
            length = 1;
        }
        if length >= run {
            return true;
        }
    }
    false
}

fn is_leet_char(c: char) -> bool {
    LEET_SUBSTITUTIONS
        .iter()
        .any(|(_, replacements)| replacements.contains(&c))
}

/// Whole words of `lower` that are blocked, leetspeak spellings included.
/// Words are split on anything that is neither alphanumeric nor a leetspeak
/// character, so "glass" or "scunthorpe" never match.
fn blocked_tokens(lower: &str) -> impl Iterator<Item = &str> {
    lower
        .split(|c: char| !(c.is_alphanumeric() || is_leet_char(c)))
        .filter(|token| {
            let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
            BLOCKED_VARIANTS.contains(*token) || BLOCKED_VARIANTS.contains(bare)
        })
}

/// Check a guess for offensive or junk content.
pub fn moderate(text: &str) -> ModerationResult {
    if text.trim().chars().count() < 2 {
        return ModerationResult::reject("Content is too short");
    }

    let lower = text.to_lowercase();

    if blocked_tokens(&lower).next().is_some() {
        return ModerationResult::reject(INAPPROPRIATE);
    }

    if EVASION_PATTERNS.iter().any(|re| re.is_match(&lower)) {
        return ModerationResult::reject(INAPPROPRIATE);
    }

    let words: Vec<&str> = lower.split_whitespace().collect();

    let total = text.chars().count();
    let special = text.chars().filter(|c| !c.is_alphanumeric()).count();
    if special * 2 > total {
        return ModerationResult::reject("Content contains too many special characters");
    }

    if has_repeated_run(text, 5) {
        return ModerationResult::reject("Content contains repetitive patterns");
    }

    if words.iter().any(|word| word.chars().count() > 30) {
        return ModerationResult::reject("Content contains suspiciously long words");
    }

    ModerationResult::accept()
}

/// Reject guesses that try to steer the judge.
pub fn check_prompt_injection(text: &str) -> Result<(), &'static str> {
    let lower = text.to_lowercase();
    if INJECTION_PATTERNS.iter().any(|re| re.is_match(&lower)) {
        tracing::warn!(guess = %text, "prompt injection attempt rejected");
        return Err("Potential prompt injection attempt detected");
    }
    Ok(())
}
