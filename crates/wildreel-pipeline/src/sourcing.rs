//! Candidate sourcing: drive provider queries through the geometry and
//! relevance gates until enough candidates are accepted.
//!
//! Per-candidate rejections are normal and the loop continues; a quota
//! signal is handled per the configured policy; the run as a whole only
//! fails when the partial-success threshold is missed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use tokio::time::sleep;
use tracing::{info, warn};

use wildreel_media::geometry::{fit_to_spec, meets_resolution_floor, GeometrySpec};
use wildreel_media::segments::{extract_first_frame, trim_segment};
use wildreel_models::{QuotaPolicy, SourcingPolicy, SourcingReport, Subject};

use crate::error::{PipelineError, PipelineResult};
use crate::ports::{ImageProvider, SegmentProvider};
use crate::relevance::RelevanceGate;

/// Result of an image sourcing run.
pub struct SourcingOutcome {
    /// Accepted candidates in acceptance order, converted to the
    /// pipeline's fixed color model.
    pub images: Vec<RgbImage>,
    pub report: SourcingReport,
}

/// Result of a video-segment sourcing run.
pub struct SegmentOutcome {
    /// Trimmed, audio-stripped segment files in acceptance order.
    pub segments: Vec<PathBuf>,
    pub report: SourcingReport,
}

/// Sources still images for one subject.
pub struct CandidateSourcer {
    provider: Arc<dyn ImageProvider>,
    gate: RelevanceGate,
    geometry: GeometrySpec,
    policy: SourcingPolicy,
}

impl CandidateSourcer {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        gate: RelevanceGate,
        geometry: GeometrySpec,
        policy: SourcingPolicy,
    ) -> Self {
        Self {
            provider,
            gate,
            geometry,
            policy,
        }
    }

    /// Query the provider until the target count is reached, the quota
    /// policy stops the loop, or the attempt ceiling is hit; then apply
    /// the partial-success policy.
    pub async fn source_images(&self, subject: &Subject) -> PipelineResult<SourcingOutcome> {
        self.policy
            .validate()
            .map_err(|e| PipelineError::config(e.to_string()))?;

        let mut accepted: Vec<(String, DynamicImage)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = SourcingReport::new(self.policy.target_count);

        while accepted.len() < self.policy.target_count && report.attempts < self.policy.max_attempts
        {
            report.attempts += 1;

            let sourced = match self
                .provider
                .fetch_image(
                    subject.name(),
                    self.geometry.target_width,
                    self.geometry.target_height,
                )
                .await
            {
                Ok(sourced) => sourced,
                Err(e) if e.is_quota_signal() => {
                    report.quota_exhausted = true;
                    match self.policy.quota_policy {
                        QuotaPolicy::Abort => {
                            warn!(error = %e, "provider quota exhausted, stopping sourcing");
                            break;
                        }
                        QuotaPolicy::CooldownResume { cooldown } => {
                            warn!(
                                error = %e,
                                cooldown_secs = cooldown.as_secs(),
                                accepted = accepted.len(),
                                "provider quota exhausted, cooling down"
                            );
                            sleep(cooldown).await;
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "discarding unusable provider response");
                    continue;
                }
            };

            let image = match image::load_from_memory(&sourced.bytes) {
                Ok(image) => image,
                Err(e) => {
                    warn!(locator = %sourced.locator, error = %e, "failed to decode candidate");
                    continue;
                }
            };

            let Some(fitted) = fit_to_spec(&image, &self.geometry) else {
                report.rejected_geometry += 1;
                continue;
            };

            let decision = self
                .gate
                .classify(&fitted, &sourced.locator, subject)
                .await?;
            if !decision.accepted {
                report.rejected_relevance += 1;
                continue;
            }

            if !seen.insert(sourced.locator.clone()) {
                report.duplicates += 1;
                continue;
            }

            accepted.push((sourced.locator, fitted));
        }

        report.accepted = accepted.len();
        let required = self.policy.required_count();
        info!(
            subject = %subject,
            accepted = report.accepted,
            requested = report.requested,
            required,
            attempts = report.attempts,
            rejected_geometry = report.rejected_geometry,
            rejected_relevance = report.rejected_relevance,
            duplicates = report.duplicates,
            quota_exhausted = report.quota_exhausted,
            "sourcing finished"
        );

        if !report.met(required) {
            return Err(PipelineError::InsufficientMedia {
                accepted: report.accepted,
                required,
            });
        }

        let images = accepted.into_iter().map(|(_, img)| img.to_rgb8()).collect();
        Ok(SourcingOutcome { images, report })
    }
}

/// Derived identity used to deduplicate video segments.
fn segment_key(locator: &str, width: u32, height: u32) -> String {
    format!("{locator}#{width}x{height}")
}

/// Sources short video segments for one subject (the video variant).
pub struct SegmentSourcer {
    provider: Arc<dyn SegmentProvider>,
    gate: RelevanceGate,
    geometry: GeometrySpec,
    policy: SourcingPolicy,
    /// Segments longer than this are truncated, never sped up.
    max_segment_secs: f64,
}

impl SegmentSourcer {
    pub fn new(
        provider: Arc<dyn SegmentProvider>,
        gate: RelevanceGate,
        geometry: GeometrySpec,
        policy: SourcingPolicy,
        max_segment_secs: f64,
    ) -> Self {
        Self {
            provider,
            gate,
            geometry,
            policy,
            max_segment_secs,
        }
    }

    /// Source segments into `work_dir`. Accepted segments are trimmed to
    /// the maximum duration and stripped of embedded audio; the
    /// narration track supplies all audio downstream.
    pub async fn source_segments(
        &self,
        subject: &Subject,
        work_dir: &Path,
    ) -> PipelineResult<SegmentOutcome> {
        self.policy
            .validate()
            .map_err(|e| PipelineError::config(e.to_string()))?;
        tokio::fs::create_dir_all(work_dir).await?;

        let mut accepted: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = SourcingReport::new(self.policy.target_count);
        let mut sequence = 0usize;

        while accepted.len() < self.policy.target_count && report.attempts < self.policy.max_attempts
        {
            report.attempts += 1;

            let remaining = self.policy.target_count - accepted.len();
            let batch = match self.provider.fetch_segments(subject.name(), remaining).await {
                Ok(batch) => batch,
                Err(e) if e.is_quota_signal() => {
                    report.quota_exhausted = true;
                    match self.policy.quota_policy {
                        QuotaPolicy::Abort => {
                            warn!(error = %e, "provider quota exhausted, stopping sourcing");
                            break;
                        }
                        QuotaPolicy::CooldownResume { cooldown } => {
                            warn!(
                                error = %e,
                                cooldown_secs = cooldown.as_secs(),
                                "provider quota exhausted, cooling down"
                            );
                            sleep(cooldown).await;
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "discarding unusable provider response");
                    continue;
                }
            };

            for segment in batch {
                if accepted.len() == self.policy.target_count {
                    break;
                }

                if !meets_resolution_floor(segment.width, segment.height, &self.geometry)
                    || !self
                        .geometry
                        .aspect_within_threshold(segment.width, segment.height)
                {
                    report.rejected_geometry += 1;
                    continue;
                }

                let key = segment_key(&segment.locator, segment.width, segment.height);
                if seen.contains(&key) {
                    report.duplicates += 1;
                    continue;
                }

                let raw_path = work_dir.join(format!("segment_{sequence:03}_raw.mp4"));
                let frame_path = work_dir.join(format!("segment_{sequence:03}_frame.png"));
                let trimmed_path = work_dir.join(format!("segment_{sequence:03}.mp4"));
                sequence += 1;

                tokio::fs::write(&raw_path, &segment.bytes).await?;

                if let Err(e) = extract_first_frame(&raw_path, &frame_path).await {
                    warn!(locator = %segment.locator, error = %e, "discarding unreadable segment");
                    continue;
                }
                let frame = match image::open(&frame_path) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(locator = %segment.locator, error = %e, "discarding undecodable frame");
                        continue;
                    }
                };

                let decision = self.gate.classify(&frame, &segment.locator, subject).await?;
                if !decision.accepted {
                    report.rejected_relevance += 1;
                    continue;
                }

                if let Err(e) = trim_segment(&raw_path, &trimmed_path, self.max_segment_secs).await
                {
                    warn!(locator = %segment.locator, error = %e, "discarding untrimmable segment");
                    continue;
                }

                seen.insert(key);
                accepted.push(trimmed_path);
            }
        }

        report.accepted = accepted.len();
        let required = self.policy.required_count();
        info!(
            subject = %subject,
            accepted = report.accepted,
            required,
            attempts = report.attempts,
            quota_exhausted = report.quota_exhausted,
            "segment sourcing finished"
        );

        if !report.met(required) {
            return Err(PipelineError::InsufficientMedia {
                accepted: report.accepted,
                required,
            });
        }

        Ok(SegmentOutcome {
            segments: accepted,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use image::ImageOutputFormat;

    use crate::ports::{CandidateReviewer, ProviderError, ReviewError, SourcedMedia};

    /// Provider that replays a scripted sequence of responses, then
    /// signals quota exhaustion.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<SourcedMedia, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<SourcedMedia, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        async fn fetch_image(
            &self,
            _subject: &str,
            _width: u32,
            _height: u32,
        ) -> Result<SourcedMedia, ProviderError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::QuotaExhausted("script ended".into())))
        }
    }

    struct FixedReviewer(bool);

    #[async_trait]
    impl CandidateReviewer for FixedReviewer {
        async fn confirm(&self, _subject: &str, _locator: &str) -> Result<bool, ReviewError> {
            Ok(self.0)
        }
    }

    fn png_candidate(locator: &str) -> SourcedMedia {
        let image = DynamicImage::new_rgb8(640, 360);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        SourcedMedia {
            bytes,
            locator: locator.to_string(),
        }
    }

    fn test_geometry() -> GeometrySpec {
        GeometrySpec::new(64, 36)
    }

    fn accepting_gate() -> RelevanceGate {
        RelevanceGate::Manual(Box::new(FixedReviewer(true)))
    }

    fn rejecting_gate() -> RelevanceGate {
        RelevanceGate::Manual(Box::new(FixedReviewer(false)))
    }

    #[tokio::test]
    async fn test_valid_provider_reaches_target_exactly() {
        let provider = ScriptedProvider::new(vec![
            Ok(png_candidate("img-1")),
            Ok(png_candidate("img-2")),
            Ok(png_candidate("img-3")),
            Ok(png_candidate("img-4")),
        ]);
        let sourcer = CandidateSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(3),
        );

        let outcome = sourcer.source_images(&Subject::new("lion")).await.unwrap();
        assert_eq!(outcome.images.len(), 3);
        assert_eq!(outcome.report.accepted, 3);
        assert_eq!(outcome.report.attempts, 3);
        assert!(!outcome.report.quota_exhausted);
    }

    #[tokio::test]
    async fn test_duplicates_are_not_double_counted() {
        let provider = ScriptedProvider::new(vec![
            Ok(png_candidate("img-1")),
            Ok(png_candidate("img-1")),
            Ok(png_candidate("img-2")),
        ]);
        let sourcer = CandidateSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(2),
        );

        let outcome = sourcer.source_images(&Subject::new("lion")).await.unwrap();
        assert_eq!(outcome.images.len(), 2);
        assert_eq!(outcome.report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_rejecting_gate_hits_attempt_ceiling() {
        let candidates: Vec<_> = (0..10)
            .map(|i| Ok(png_candidate(&format!("img-{i}"))))
            .collect();
        let provider = ScriptedProvider::new(candidates);
        let sourcer = CandidateSourcer::new(
            provider,
            rejecting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(3).with_max_attempts(5),
        );

        let err = sourcer
            .source_images(&Subject::new("lion"))
            .await
            .unwrap_err();
        match err {
            PipelineError::InsufficientMedia { accepted, required } => {
                assert_eq!(accepted, 0);
                assert_eq!(required, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_quota_abort_keeps_partial_success() {
        let provider = ScriptedProvider::new(vec![
            Ok(png_candidate("img-1")),
            Ok(png_candidate("img-2")),
            Err(ProviderError::QuotaExhausted("no requests remaining".into())),
        ]);
        let sourcer = CandidateSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(3).with_min_fraction(0.6),
        );

        let outcome = sourcer.source_images(&Subject::new("lion")).await.unwrap();
        assert_eq!(outcome.images.len(), 2);
        assert!(outcome.report.quota_exhausted);
    }

    #[tokio::test]
    async fn test_quota_abort_below_threshold_fails() {
        let provider = ScriptedProvider::new(vec![
            Ok(png_candidate("img-1")),
            Err(ProviderError::QuotaExhausted("no requests remaining".into())),
        ]);
        let sourcer = CandidateSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(3),
        );

        let err = sourcer
            .source_images(&Subject::new("lion"))
            .await
            .unwrap_err();
        assert!(err.is_insufficient_media());
    }

    #[tokio::test]
    async fn test_cooldown_resume_retains_accepted_candidates() {
        let provider = ScriptedProvider::new(vec![
            Ok(png_candidate("img-1")),
            Err(ProviderError::Transport("rate limited".into())),
            Ok(png_candidate("img-2")),
            Ok(png_candidate("img-3")),
        ]);
        let policy = SourcingPolicy::with_target(3).with_quota_policy(
            QuotaPolicy::CooldownResume {
                cooldown: Duration::from_millis(1),
            },
        );
        let sourcer = CandidateSourcer::new(provider, accepting_gate(), test_geometry(), policy);

        let outcome = sourcer.source_images(&Subject::new("lion")).await.unwrap();
        assert_eq!(outcome.images.len(), 3);
        assert!(outcome.report.quota_exhausted);
    }

    #[tokio::test]
    async fn test_geometry_rejections_are_counted() {
        let portrait = {
            let image = DynamicImage::new_rgb8(360, 640);
            let mut bytes = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
                .unwrap();
            SourcedMedia {
                bytes,
                locator: "img-portrait".to_string(),
            }
        };
        let provider =
            ScriptedProvider::new(vec![Ok(portrait), Ok(png_candidate("img-landscape"))]);
        let sourcer = CandidateSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(1),
        );

        let outcome = sourcer.source_images(&Subject::new("lion")).await.unwrap();
        assert_eq!(outcome.images.len(), 1);
        assert_eq!(outcome.report.rejected_geometry, 1);
    }

    #[tokio::test]
    async fn test_three_candidates_plan_into_even_timeline() {
        // The scenario the whole pipeline is built around: three
        // accepted candidates against a 30-second narration.
        let provider = ScriptedProvider::new(vec![
            Ok(png_candidate("img-1")),
            Ok(png_candidate("img-2")),
            Ok(png_candidate("img-3")),
        ]);
        let sourcer = CandidateSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(3),
        );

        let outcome = sourcer.source_images(&Subject::new("lion")).await.unwrap();
        assert_eq!(outcome.images.len(), 3);

        let plan = wildreel_models::plan_timeline(30.0, outcome.images.len(), 1.0).unwrap();
        assert_eq!(plan.entries.len(), 3);
        for entry in &plan.entries {
            assert!((entry.duration_secs - 10.0).abs() < 1e-9);
        }
        assert!(plan.entries[0].fade_out && !plan.entries[0].fade_in);
        assert!(plan.entries[2].fade_in && !plan.entries[2].fade_out);
    }

    #[test]
    fn test_segment_key_includes_geometry() {
        assert_eq!(segment_key("vid-1", 1280, 720), "vid-1#1280x720");
        assert_ne!(
            segment_key("vid-1", 1280, 720),
            segment_key("vid-1", 1920, 1080)
        );
    }

    /// Segment provider that replays one scripted batch response.
    struct ScriptedSegmentProvider {
        responses: Mutex<VecDeque<Result<Vec<crate::ports::SourcedSegment>, ProviderError>>>,
    }

    #[async_trait]
    impl SegmentProvider for ScriptedSegmentProvider {
        async fn fetch_segments(
            &self,
            _subject: &str,
            _count: usize,
        ) -> Result<Vec<crate::ports::SourcedSegment>, ProviderError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::QuotaExhausted("script ended".into())))
        }
    }

    #[tokio::test]
    async fn test_segment_quota_abort_below_threshold_fails() {
        let provider = Arc::new(ScriptedSegmentProvider {
            responses: Mutex::new(
                vec![Err(ProviderError::QuotaExhausted("no requests remaining".into()))].into(),
            ),
        });
        let sourcer = SegmentSourcer::new(
            provider,
            accepting_gate(),
            test_geometry(),
            SourcingPolicy::with_target(3),
            10.0,
        );

        let work_dir = tempfile::tempdir().unwrap();
        let err = sourcer
            .source_segments(&Subject::new("lion"), work_dir.path())
            .await
            .unwrap_err();
        assert!(err.is_insufficient_media());
    }

    #[tokio::test]
    async fn test_segments_below_resolution_floor_are_rejected() {
        let tiny = crate::ports::SourcedSegment {
            bytes: Vec::new(),
            locator: "vid-tiny".to_string(),
            width: 320,
            height: 180,
            duration_secs: 5.0,
        };
        let provider = Arc::new(ScriptedSegmentProvider {
            responses: Mutex::new(vec![Ok(vec![tiny])].into()),
        });
        let geometry = GeometrySpec::new(64, 36).with_resolution_floor(640, 360);
        let sourcer = SegmentSourcer::new(
            provider,
            accepting_gate(),
            geometry,
            SourcingPolicy::with_target(1).with_max_attempts(1),
            10.0,
        );

        let work_dir = tempfile::tempdir().unwrap();
        let err = sourcer
            .source_segments(&Subject::new("lion"), work_dir.path())
            .await
            .unwrap_err();
        match err {
            PipelineError::InsufficientMedia { accepted, .. } => assert_eq!(accepted, 0),
            other => panic!("unexpected error: {other}"),
        }
    }
}
