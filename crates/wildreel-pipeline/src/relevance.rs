//! Relevance gate: accept or reject one candidate against the expected
//! subject.
//!
//! The gate is selected once per subject. Subjects the classifier
//! vocabulary can represent use the automatic path; anything else falls
//! back to a human reviewer. Rejection is a normal outcome and never an
//! error.

use image::DynamicImage;
use tracing::info;
use wildreel_models::Subject;

use crate::classifier::{label_matches, ImageClassifier};
use crate::error::PipelineResult;
use crate::ports::CandidateReviewer;

/// Outcome of gating one candidate. The predicted label is diagnostic
/// only; control flow depends solely on `accepted`.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub accepted: bool,
    pub predicted_label: Option<String>,
}

/// How candidates are judged for one subject.
pub enum RelevanceGate {
    /// Vision-model inference against the classifier vocabulary.
    Automatic(ImageClassifier),
    /// Human confirmation via the candidate's source locator.
    Manual(Box<dyn CandidateReviewer>),
}

impl RelevanceGate {
    /// Pick the gate for a subject: automatic when the vocabulary covers
    /// it, manual otherwise.
    pub fn for_subject(
        subject: &Subject,
        classifier: ImageClassifier,
        reviewer: Box<dyn CandidateReviewer>,
    ) -> Self {
        if classifier.vocabulary_covers(subject.name()) {
            info!(subject = %subject, "subject covered by classifier vocabulary");
            Self::Automatic(classifier)
        } else {
            info!(subject = %subject, "subject outside vocabulary, using manual review");
            Self::Manual(reviewer)
        }
    }

    /// Judge one candidate.
    pub async fn classify(
        &self,
        image: &DynamicImage,
        locator: &str,
        subject: &Subject,
    ) -> PipelineResult<GateDecision> {
        match self {
            Self::Automatic(classifier) => {
                let predicted = classifier.predict_label(&image.to_rgb8())?;
                let accepted = label_matches(subject.name(), &predicted);
                if !accepted {
                    info!(
                        subject = %subject,
                        predicted = %predicted,
                        "classifier identified a different subject"
                    );
                }
                Ok(GateDecision {
                    accepted,
                    predicted_label: Some(predicted),
                })
            }
            Self::Manual(reviewer) => {
                let accepted = reviewer.confirm(subject.name(), locator).await?;
                Ok(GateDecision {
                    accepted,
                    predicted_label: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::ports::ReviewError;

    struct FixedReviewer(bool);

    #[async_trait]
    impl CandidateReviewer for FixedReviewer {
        async fn confirm(&self, _subject: &str, _locator: &str) -> Result<bool, ReviewError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_manual_gate_follows_reviewer() {
        let subject = Subject::new("quokka");
        let image = DynamicImage::new_rgb8(4, 4);

        let gate = RelevanceGate::Manual(Box::new(FixedReviewer(true)));
        let decision = gate.classify(&image, "img-1", &subject).await.unwrap();
        assert!(decision.accepted);
        assert!(decision.predicted_label.is_none());

        let gate = RelevanceGate::Manual(Box::new(FixedReviewer(false)));
        let decision = gate.classify(&image, "img-1", &subject).await.unwrap();
        assert!(!decision.accepted);
    }
}
