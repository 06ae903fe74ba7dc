//! The judgment boundary.
//!
//! The game only sees [`Judge`]: a [`Verdict`] and a feedback sentence,
//! neither of which can fail. [`GatedJudge`] provides that contract over any
//! [`TextGenerator`] by rate limiting, retrying with backoff and falling back
//! to defaults.

pub mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use beatrock_core::persona::{fallback_feedback, feedback_request, judgment_request};
use beatrock_core::{Persona, parse_verdict};
use tracing::warn;

pub use gemini::GeminiClient;

use crate::error::JudgeError;
use crate::throttle::{CallCategory, CallGate};

/// Below this parse confidence the raw answer is logged.
const LOW_CONFIDENCE: f64 = 0.7;

/// Outcome of one judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The service answered and the answer was understood.
    Judged(bool),
    /// No usable answer. Counts as a loss but must not be cached.
    Defaulted,
}

impl Verdict {
    pub fn beats(self) -> bool {
        matches!(self, Verdict::Judged(true))
    }
}

#[async_trait]
pub trait Judge: Send + Sync {
    /// Whether `challenger` beats `subject`.
    async fn evaluate(&self, subject: &str, challenger: &str, persona: Persona) -> Verdict;

    /// A short, never empty explanation of the verdict.
    async fn explain(&self, subject: &str, challenger: &str, beats: bool, persona: Persona)
    -> String;
}

/// One prompt for the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub category: CallCategory,
    pub system_prompt: String,
    pub user_prompt: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, JudgeError>;
}

/// [`Judge`] over a [`TextGenerator`], throttled by a [`CallGate`].
pub struct GatedJudge {
    generator: Arc<dyn TextGenerator>,
    gate: CallGate,
}

impl GatedJudge {
    pub fn new(generator: Arc<dyn TextGenerator>, gate: CallGate) -> Self {
        Self { generator, gate }
    }

    pub fn gate(&self) -> &CallGate {
        &self.gate
    }

    async fn generate(&self, request: GenerationRequest) -> Option<String> {
        let generator = &self.generator;
        let request = &request;
        self.gate
            .run(request.category, || generator.generate(request))
            .await
    }
}

#[async_trait]
impl Judge for GatedJudge {
    async fn evaluate(&self, subject: &str, challenger: &str, persona: Persona) -> Verdict {
        let request = GenerationRequest {
            category: CallCategory::Judgment,
            system_prompt: persona.judgment_prompt().to_string(),
            user_prompt: judgment_request(subject, challenger),
        };
        let Some(raw) = self.generate(request).await else {
            return Verdict::Defaulted;
        };

        let parsed = parse_verdict(&raw);
        if parsed.confidence < LOW_CONFIDENCE {
            warn!(
                subject = %subject,
                challenger = %challenger,
                raw = %raw,
                confidence = parsed.confidence,
                beats = parsed.beats,
                "low confidence verdict"
            );
        }
        if parsed.confidence > 0.0 {
            Verdict::Judged(parsed.beats)
        } else {
            Verdict::Defaulted
        }
    }

    async fn explain(
        &self,
        subject: &str,
        challenger: &str,
        beats: bool,
        persona: Persona,
    ) -> String {
        let request = GenerationRequest {
            category: CallCategory::Feedback,
            system_prompt: persona.feedback_prompt().to_string(),
            user_prompt: feedback_request(subject, challenger, beats),
        };
        match self.generate(request).await {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => fallback_feedback(subject, challenger, beats),
        }
    }
}
