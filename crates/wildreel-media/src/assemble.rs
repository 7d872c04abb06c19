//! Slideshow assembly: accepted frames plus narration audio rendered
//! into one continuous clip.
//!
//! The timeline plan fixes every entry's duration and transition flags;
//! this module turns the plan into a single FFmpeg invocation. Fades are
//! rendered per segment (in on every entry but the first, out on every
//! entry but the last) and the segments are concatenated in acceptance
//! order, so the visual span equals the narration span by construction.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::info;
use wildreel_models::{NarrationSpan, TimelinePlan};

use crate::error::{MediaError, MediaResult};
use crate::ffmpeg::{FfmpegJob, FfmpegRunner};
use crate::probe::probe_media;

/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 24;
/// Default pixel format; broadly compatible with players.
pub const DEFAULT_PIX_FMT: &str = "yuv420p";

/// Encoding settings for the assembled clip.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub fps: u32,
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub pix_fmt: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            codec: "libx264".to_string(),
            preset: "fast".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            pix_fmt: DEFAULT_PIX_FMT.to_string(),
        }
    }
}

impl RenderSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fps: std::env::var("WILDREEL_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fps),
            codec: std::env::var("WILDREEL_VIDEO_CODEC").unwrap_or(defaults.codec),
            preset: std::env::var("WILDREEL_PRESET").unwrap_or(defaults.preset),
            crf: std::env::var("WILDREEL_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crf),
            audio_codec: defaults.audio_codec,
            audio_bitrate: defaults.audio_bitrate,
            pix_fmt: defaults.pix_fmt,
        }
    }
}

/// One rendered segment's place in the filter graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSegment {
    /// FFmpeg input index the segment reads from.
    pub input: usize,
    pub duration_secs: f64,
    pub fade_in: bool,
    pub fade_out: bool,
}

/// Map timeline entries onto FFmpeg input indices starting at
/// `first_input` (inputs below that are reserved, e.g. for an intro).
pub fn chain_segments(plan: &TimelinePlan, first_input: usize) -> Vec<ChainSegment> {
    plan.entries
        .iter()
        .map(|entry| ChainSegment {
            input: first_input + entry.index,
            duration_secs: entry.duration_secs,
            fade_in: entry.fade_in,
            fade_out: entry.fade_out,
        })
        .collect()
}

/// Fade length for a segment, kept inside the segment's own span.
fn fade_length(segment: &ChainSegment, crossfade_secs: f64) -> f64 {
    crossfade_secs.min(segment.duration_secs / 2.0)
}

/// Build the filter graph: per-segment format + fades, then concat.
pub fn build_fade_chain(segments: &[ChainSegment], crossfade_secs: f64, pix_fmt: &str) -> String {
    let mut chains = Vec::with_capacity(segments.len() + 1);

    for (k, segment) in segments.iter().enumerate() {
        let mut filters = vec![format!("format={pix_fmt}"), "setsar=1".to_string()];
        let fade = fade_length(segment, crossfade_secs);
        if segment.fade_in {
            filters.push(format!("fade=t=in:st=0:d={fade:.3}"));
        }
        if segment.fade_out {
            let start = (segment.duration_secs - fade).max(0.0);
            filters.push(format!("fade=t=out:st={start:.3}:d={fade:.3}"));
        }
        chains.push(format!("[{}:v]{}[v{k}]", segment.input, filters.join(",")));
    }

    let concat_inputs: String = (0..segments.len()).map(|k| format!("[v{k}]")).collect();
    chains.push(format!(
        "{concat_inputs}concat=n={}:v=1:a=0[vout]",
        segments.len()
    ));

    chains.join(";")
}

/// Everything needed to render one slideshow.
#[derive(Debug)]
pub struct AssembleRequest<'a> {
    /// Narration track the timeline was planned against.
    pub audio: &'a Path,
    /// Accepted frames in timeline order; must match the plan's entries.
    pub frames: &'a [RgbImage],
    /// Optional pre-recorded intro, concatenated before the main timeline
    /// with only a fade-out.
    pub intro: Option<&'a Path>,
    pub plan: &'a TimelinePlan,
    pub narration_span: NarrationSpan,
    pub settings: &'a RenderSettings,
    /// Directory frames are written into before rendering.
    pub work_dir: &'a Path,
    pub output: &'a Path,
}

/// Render the slideshow described by `request`.
pub async fn assemble_slideshow(request: AssembleRequest<'_>) -> MediaResult<PathBuf> {
    if request.frames.is_empty() {
        return Err(MediaError::invalid_media("no frames to assemble"));
    }
    if request.frames.len() != request.plan.entries.len() {
        return Err(MediaError::invalid_media(format!(
            "{} frames but {} timeline entries",
            request.frames.len(),
            request.plan.entries.len()
        )));
    }
    if !request.audio.exists() {
        return Err(MediaError::FileNotFound(request.audio.to_path_buf()));
    }

    let frames_dir = request.work_dir.join("frames");
    tokio::fs::create_dir_all(&frames_dir).await?;

    let mut job = FfmpegJob::new(request.output);
    let mut segments = Vec::with_capacity(request.frames.len() + 1);

    let intro_duration = match request.intro {
        Some(intro) => {
            let info = probe_media(intro).await?;
            job = job.input(intro);
            segments.push(ChainSegment {
                input: 0,
                duration_secs: info.duration_secs,
                fade_in: false,
                fade_out: true,
            });
            Some(info.duration_secs)
        }
        None => None,
    };
    let first_frame_input = if intro_duration.is_some() { 1 } else { 0 };

    for (entry, frame) in request.plan.entries.iter().zip(request.frames) {
        let frame_path = frames_dir.join(format!("frame_{:03}.png", entry.index));
        frame.save(&frame_path)?;
        job = job.looped_image(&frame_path, entry.duration_secs, request.settings.fps);
    }
    segments.extend(chain_segments(request.plan, first_frame_input));

    let audio_input = first_frame_input + request.frames.len();
    job = job.input(request.audio);

    let mut filter = build_fade_chain(
        &segments,
        request.plan.crossfade_secs,
        &request.settings.pix_fmt,
    );
    let audio_map = match (intro_duration, request.narration_span) {
        (Some(duration), NarrationSpan::MainOnly) => {
            let delay_ms = (duration * 1000.0).round() as u64;
            filter.push_str(&format!(";[{audio_input}:a]adelay={delay_ms}:all=1[aout]"));
            "[aout]".to_string()
        }
        _ => format!("{audio_input}:a"),
    };

    let job = job
        .filter_complex(filter)
        .map("[vout]")
        .map(audio_map)
        .video_codec(&request.settings.codec)
        .preset(&request.settings.preset)
        .crf(request.settings.crf)
        .framerate(request.settings.fps)
        .audio_codec(&request.settings.audio_codec)
        .audio_bitrate(&request.settings.audio_bitrate)
        .faststart();

    FfmpegRunner::new().run(&job).await?;

    info!(
        output = %request.output.display(),
        entries = request.plan.entries.len(),
        "slideshow assembled"
    );
    Ok(request.output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildreel_models::plan_timeline;

    #[test]
    fn test_fade_chain_for_three_entries() {
        let plan = plan_timeline(30.0, 3, 1.0).unwrap();
        let segments = chain_segments(&plan, 0);
        let chain = build_fade_chain(&segments, plan.crossfade_secs, "yuv420p");

        assert!(chain.starts_with("[0:v]format=yuv420p,setsar=1,fade=t=out:st=9.000:d=1.000[v0]"));
        assert!(chain.contains("[1:v]format=yuv420p,setsar=1,fade=t=in:st=0:d=1.000,fade=t=out:st=9.000:d=1.000[v1]"));
        assert!(chain.contains("[2:v]format=yuv420p,setsar=1,fade=t=in:st=0:d=1.000[v2]"));
        assert!(chain.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[vout]"));
    }

    #[test]
    fn test_fade_chain_single_entry_has_no_fades() {
        let plan = plan_timeline(12.0, 1, 1.0).unwrap();
        let segments = chain_segments(&plan, 0);
        let chain = build_fade_chain(&segments, plan.crossfade_secs, "yuv420p");
        assert!(!chain.contains("fade="));
        assert!(chain.ends_with("concat=n=1:v=1:a=0[vout]"));
    }

    #[test]
    fn test_chain_segments_respects_input_offset() {
        let plan = plan_timeline(20.0, 2, 1.0).unwrap();
        let segments = chain_segments(&plan, 1);
        assert_eq!(segments[0].input, 1);
        assert_eq!(segments[1].input, 2);
    }

    #[test]
    fn test_fade_is_clamped_for_short_segments() {
        let segment = ChainSegment {
            input: 0,
            duration_secs: 1.0,
            fade_in: true,
            fade_out: false,
        };
        let chain = build_fade_chain(&[segment], 1.0, "yuv420p");
        assert!(chain.contains("fade=t=in:st=0:d=0.500"));
    }
}
