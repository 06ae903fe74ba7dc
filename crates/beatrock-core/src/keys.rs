//! Case-folded keys for verdicts and counters.

use std::fmt;

/// Case-fold a word for comparison and keying.
pub fn fold(word: &str) -> String {
    word.to_lowercase()
}

/// Ordered (subject, challenger) pair identifying one verdict.
///
/// Both words are folded on construction, so `("Rock", "PAPER")` and
/// `("rock", "paper")` address the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerdictKey {
    subject: String,
    challenger: String,
}

impl VerdictKey {
    pub fn new(subject: &str, challenger: &str) -> Self {
        Self {
            subject: fold(subject),
            challenger: fold(challenger),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn challenger(&self) -> &str {
        &self.challenger
    }
}

impl fmt::Display for VerdictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject, self.challenger)
    }
}

/// Key of a usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CounterKey {
    /// How often a word has been played, across all games.
    Word(String),
    /// How often `beater` has been played against `beaten`.
    Pair { beaten: String, beater: String },
}

impl CounterKey {
    pub fn word(word: &str) -> Self {
        CounterKey::Word(fold(word))
    }

    pub fn pair(beaten: &str, beater: &str) -> Self {
        CounterKey::Pair {
            beaten: fold(beaten),
            beater: fold(beater),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKey::Word(word) => f.write_str(word),
            CounterKey::Pair { beaten, beater } => write!(f, "{beaten}:{beater}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_key_folds_both_words() {
        let a = VerdictKey::new("Rock", "PAPER");
        let b = VerdictKey::new("rock", "paper");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "rock:paper");
    }

    #[test]
    fn verdict_key_is_ordered() {
        assert_ne!(VerdictKey::new("rock", "paper"), VerdictKey::new("paper", "rock"));
    }

    #[test]
    fn counter_keys_render_suffixes() {
        assert_eq!(CounterKey::word("Paper").to_string(), "paper");
        assert_eq!(CounterKey::pair("Rock", "Paper").to_string(), "rock:paper");
    }
}
