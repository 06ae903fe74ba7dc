//! Judge personas and the prompts sent to the text-generation service.

use std::fmt;

/// Tone of the judge. Unknown persona ids resolve to [`Persona::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persona {
    #[default]
    Default,
    Serious,
    Cheery,
}

impl Persona {
    pub fn from_id(id: &str) -> Self {
        match id.to_ascii_lowercase().as_str() {
            "serious" => Persona::Serious,
            "cheery" => Persona::Cheery,
            _ => Persona::Default,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Persona::Default => "default",
            Persona::Serious => "serious",
            Persona::Cheery => "cheery",
        }
    }

    /// System prompt for the true/false judgment call.
    pub fn judgment_prompt(&self) -> &'static str {
        match self {
            Persona::Default => {
                "You are a judge in a game called \"What Beats Rock\". \
                 Decide whether one item beats another in a logical or conceptual sense. \
                 Respond with ONLY a single word: either \"true\" or \"false\". \
                 No explanations and no additional text."
            }
            Persona::Serious => {
                "You are a logical and serious judge in a game called \"What Beats Rock\". \
                 Analyze carefully whether one item beats another in a rational sense. \
                 Respond with ONLY a single word: either \"true\" or \"false\". \
                 No explanations and no additional text."
            }
            Persona::Cheery => {
                "You are an enthusiastic, fun-loving judge in a game called \"What Beats Rock\"! \
                 Decide whether one item beats another in a creative, playful sense. \
                 Respond with ONLY a single word: either \"true\" or \"false\". \
                 No explanations and no additional text."
            }
        }
    }

    /// System prompt for the feedback call.
    pub fn feedback_prompt(&self) -> &'static str {
        match self {
            Persona::Default => {
                "You are giving feedback in a game called \"What Beats Rock\". \
                 Your tone is neutral and straightforward. \
                 Explain briefly why the guess does or does not beat the current word, \
                 in 1-2 sentences focused on the logical relationship."
            }
            Persona::Serious => {
                "You are giving feedback as a logical and serious judge in \"What Beats Rock\". \
                 Your tone is formal and analytical. \
                 Explain with precision why the guess does or does not beat the current word, \
                 in 1-2 sentences focused on the rational relationship."
            }
            Persona::Cheery => {
                "You are giving feedback as an enthusiastic judge in \"What Beats Rock\"! \
                 Your tone is playful and energetic, with the odd exclamation point or emoji. \
                 Explain creatively why the guess does or does not beat the current word, \
                 in 1-2 sentences."
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// User prompt for the judgment call.
pub fn judgment_request(current_word: &str, guess: &str) -> String {
    format!("Does '{guess}' beat '{current_word}'? Answer only with true or false.")
}

/// User prompt for the feedback call.
pub fn feedback_request(current_word: &str, guess: &str, beats: bool) -> String {
    let relation = if beats { "beats" } else { "doesn't beat" };
    format!("Explain why '{guess}' {relation} '{current_word}'. Be concise.")
}

/// Feedback used when the service cannot provide any.
pub fn fallback_feedback(current_word: &str, guess: &str, beats: bool) -> String {
    if beats {
        format!("Correct! '{guess}' beats '{current_word}'.")
    } else {
        format!("Incorrect! '{guess}' does not beat '{current_word}'.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_persona_falls_back_to_default() {
        assert_eq!(Persona::from_id("pirate"), Persona::Default);
        assert_eq!(Persona::from_id("Serious"), Persona::Serious);
        assert_eq!(Persona::from_id("cheery").id(), "cheery");
    }

    #[test]
    fn fallback_feedback_is_never_empty() {
        assert_eq!(
            fallback_feedback("Rock", "Paper", true),
            "Correct! 'Paper' beats 'Rock'."
        );
        assert_eq!(
            fallback_feedback("Rock", "Feather", false),
            "Incorrect! 'Feather' does not beat 'Rock'."
        );
    }

    #[test]
    fn prompts_mention_both_words() {
        let p = judgment_request("Rock", "Paper");
        assert!(p.contains("'Paper'") && p.contains("'Rock'"));
        assert!(feedback_request("Rock", "Paper", false).contains("doesn't beat"));
    }
}
