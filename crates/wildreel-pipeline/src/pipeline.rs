//! End-to-end production: source, assemble, publish, curate.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use wildreel_media::assemble::{assemble_slideshow, AssembleRequest};
use wildreel_media::probe::probe_media;
use wildreel_models::{plan_timeline, SourcingReport, Subject};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::ports::{ImageProvider, VideoId, VideoPlatform, VideoUpload, DEFAULT_CATEGORY_ID};
use crate::relevance::RelevanceGate;
use crate::sourcing::CandidateSourcer;
use crate::thumbnail::ThumbnailCurator;

/// One production request.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub subject: Subject,
    /// Narration track the timeline is synchronized to.
    pub narration_audio: PathBuf,
    /// Narration script, uploaded as captions.
    pub script: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Optional pre-recorded intro segment.
    pub intro: Option<PathBuf>,
}

impl ProduceRequest {
    /// Request with the standard tag set for a subject.
    pub fn new(
        subject: Subject,
        narration_audio: PathBuf,
        script: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let tags = default_tags(&subject);
        Self {
            subject,
            narration_audio,
            script: script.into(),
            title: title.into(),
            description: description.into(),
            tags,
            intro: None,
        }
    }

    /// Attach an intro segment.
    pub fn with_intro(mut self, intro: PathBuf) -> Self {
        self.intro = Some(intro);
        self
    }
}

/// Standard tag set for a subject.
pub fn default_tags(subject: &Subject) -> Vec<String> {
    vec![
        "animals".to_string(),
        "safari".to_string(),
        subject.name().to_string(),
        "expedition".to_string(),
    ]
}

/// What one production run did.
#[derive(Debug, Clone)]
pub struct ProduceReport {
    pub video_id: VideoId,
    pub output_path: PathBuf,
    pub sourcing: SourcingReport,
}

/// The production pipeline with its injected collaborators.
pub struct VideoPipeline {
    sourcer: CandidateSourcer,
    platform: Arc<dyn VideoPlatform>,
    curator: ThumbnailCurator,
    config: PipelineConfig,
}

impl VideoPipeline {
    /// Wire a pipeline from its collaborators. The relevance gate has
    /// already been selected for the subject being produced.
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        platform: Arc<dyn VideoPlatform>,
        gate: RelevanceGate,
        config: PipelineConfig,
    ) -> Self {
        let sourcer = CandidateSourcer::new(
            provider,
            gate,
            config.geometry.clone(),
            config.sourcing.clone(),
        );
        let curator = ThumbnailCurator::new(platform.clone(), config.thumbnail.clone());
        Self {
            sourcer,
            platform,
            curator,
            config,
        }
    }

    /// Produce and publish one video.
    pub async fn produce(&self, request: ProduceRequest) -> PipelineResult<ProduceReport> {
        let work_dir = self.config.work_root.join(request.subject.slug());
        tokio::fs::create_dir_all(&work_dir).await?;
        info!(
            subject = %request.subject,
            work_dir = %work_dir.display(),
            "starting production run"
        );

        let outcome = self.sourcer.source_images(&request.subject).await?;

        let audio_info = probe_media(&request.narration_audio).await?;
        let plan = plan_timeline(
            audio_info.duration_secs,
            outcome.images.len(),
            self.config.crossfade_secs,
        )?;

        let output = work_dir.join("video.mp4");
        assemble_slideshow(AssembleRequest {
            audio: &request.narration_audio,
            frames: &outcome.images,
            intro: request.intro.as_deref(),
            plan: &plan,
            narration_span: self.config.narration_span,
            settings: &self.config.render,
            work_dir: &work_dir,
            output: &output,
        })
        .await?;

        let upload = VideoUpload {
            path: output.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            tags: request.tags.clone(),
            category_id: DEFAULT_CATEGORY_ID,
            language: self.config.caption_language.clone(),
        };
        let video_id = self.platform.publish(&upload).await?;
        info!(video_id = %video_id, "video published");

        self.curator
            .curate_and_set(&video_id, &request.subject)
            .await?;

        self.platform
            .insert_captions(&video_id, &request.script, &self.config.caption_language)
            .await?;
        info!(video_id = %video_id, "captions published");

        Ok(ProduceReport {
            video_id,
            output_path: output,
            sourcing: outcome.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tags_include_subject() {
        let tags = default_tags(&Subject::new("lion"));
        assert!(tags.contains(&"lion".to_string()));
        assert!(tags.contains(&"safari".to_string()));
    }
}
