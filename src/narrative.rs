//! Narrative generation
//!
//! Turns a scored recovery day into a short user-facing summary. A text
//! completion provider can be plugged in at the seam defined here; its output
//! is checked against a safety filter before use. Any provider error or
//! filter rejection falls back to a deterministic template built from the
//! scored result, so narrative generation can never block or distort a
//! decision.

use crate::error::EngineError;
use crate::recovery::RecoveryResult;
use crate::types::RecoveryZone;

/// Words that must not appear in user-facing narrative text.
///
/// The engine describes readiness, never medical conditions. Provider output
/// containing any of these is discarded in favor of the template.
const BANNED_TERMS: &[&str] = &[
    "diagnos",
    "disease",
    "disorder",
    "cure",
    "treatment",
    "medication",
    "prescri",
    "symptom of",
    "medical condition",
];

/// Seam for an external text completion provider
pub trait TextCompletion {
    /// Produce a completion for the prompt, or fail
    fn complete(&self, prompt: &str) -> Result<String, EngineError>;
}

/// Whether text passes the safety filter
pub fn passes_safety_filter(text: &str) -> bool {
    let lowered = text.to_lowercase();
    !BANNED_TERMS.iter().any(|term| lowered.contains(term))
}

/// Deterministic narrative built from the scored result alone
pub fn template_narrative(result: &RecoveryResult) -> String {
    let opener = match result.zone {
        RecoveryZone::Red => "Your body is asking for an easier day.",
        RecoveryZone::Yellow => "You're partially recovered today.",
        RecoveryZone::Green => "You're well recovered today.",
    };
    let lead = result
        .recommendations
        .first()
        .map(String::as_str)
        .unwrap_or("Listen to how you feel");
    format!(
        "{opener} Recovery is {score:.0} ({zone}). {reasoning} {lead}.",
        score = result.score,
        zone = result.zone.as_str(),
        reasoning = result.reasoning,
    )
}

fn prompt_for(result: &RecoveryResult) -> String {
    format!(
        "Write two friendly sentences summarizing this recovery readout for the user. \
         Do not give medical advice. Score: {:.0} ({}). Basis: {}",
        result.score,
        result.zone.as_str(),
        result.reasoning
    )
}

/// Narrate a scored day, preferring the provider when one is given.
///
/// Provider failures and filter rejections are logged and swallowed; the
/// template is always a valid answer.
pub fn narrate(result: &RecoveryResult, provider: Option<&dyn TextCompletion>) -> String {
    let Some(provider) = provider else {
        return template_narrative(result);
    };

    match provider.complete(&prompt_for(result)) {
        Ok(text) if passes_safety_filter(&text) && !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::warn!(date = result.date.as_str(), "narrative failed safety filter");
            template_narrative(result)
        }
        Err(err) => {
            tracing::warn!(
                date = result.date.as_str(),
                error = %err,
                "narrative provider failed"
            );
            template_narrative(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::edge_cases::EdgeCases;

    struct FixedProvider(&'static str);
    impl TextCompletion for FixedProvider {
        fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
            Ok(self.0.to_owned())
        }
    }

    struct FailingProvider;
    impl TextCompletion for FailingProvider {
        fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
            Err(EngineError::NarrativeError("provider offline".to_owned()))
        }
    }

    fn sample_result() -> RecoveryResult {
        RecoveryResult {
            date: "2024-03-08".to_owned(),
            score: 72.0,
            zone: RecoveryZone::Green,
            components: Vec::new(),
            edge_cases: EdgeCases::default(),
            temperature_penalty: 0.0,
            confidence: 0.8,
            reasoning: "HRV near baseline; sleep on target.".to_owned(),
            recommendations: vec!["Good day for higher intensity".to_owned()],
        }
    }

    #[test]
    fn test_safety_filter_blocks_medical_language() {
        assert!(!passes_safety_filter("This may be a symptom of a disease."));
        assert!(!passes_safety_filter("Consider Medication adjustments"));
        assert!(passes_safety_filter("You look well recovered, take it easy."));
    }

    #[test]
    fn test_provider_output_used_when_clean() {
        let provider = FixedProvider("Nice green day, enjoy the training window.");
        let narrative = narrate(&sample_result(), Some(&provider));
        assert_eq!(narrative, "Nice green day, enjoy the training window.");
    }

    #[test]
    fn test_unsafe_output_falls_back_to_template() {
        let provider = FixedProvider("Your HRV suggests a disease.");
        let narrative = narrate(&sample_result(), Some(&provider));
        assert_eq!(narrative, template_narrative(&sample_result()));
    }

    #[test]
    fn test_provider_error_falls_back_to_template() {
        let narrative = narrate(&sample_result(), Some(&FailingProvider));
        assert_eq!(narrative, template_narrative(&sample_result()));
    }

    #[test]
    fn test_no_provider_uses_template() {
        let narrative = narrate(&sample_result(), None);
        assert!(narrative.contains("well recovered"));
        assert!(narrative.contains("72"));
    }

    #[test]
    fn test_template_per_zone() {
        let mut result = sample_result();
        result.zone = RecoveryZone::Red;
        result.score = 25.0;
        assert!(template_narrative(&result).contains("easier day"));
    }
}
