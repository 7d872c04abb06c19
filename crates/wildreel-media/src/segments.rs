//! Operations on sourced video segments.

use std::path::Path;

use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::ffmpeg::{FfmpegJob, FfmpegRunner};

/// Truncate a segment to `max_secs` and strip any embedded audio.
///
/// Truncation only; playback speed is never changed. The narration track
/// supplies all audio downstream, so embedded audio is dropped here.
pub async fn trim_segment(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    max_secs: f64,
) -> MediaResult<()> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    debug!(input = %input.display(), max_secs, "trimming segment");

    let job = FfmpegJob::new(output.as_ref())
        .bounded_input(input, max_secs)
        .codec_copy()
        .strip_audio();

    FfmpegRunner::new().run(&job).await
}

/// Extract the first frame of a video as an image file.
///
/// The frame stands in for the whole segment during relevance
/// classification.
pub async fn extract_first_frame(
    video: impl AsRef<Path>,
    frame: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    let job = FfmpegJob::new(frame.as_ref()).input(video).single_frame();

    FfmpegRunner::new().run(&job).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let err = trim_segment("/nonexistent/clip.mp4", "/tmp/out.mp4", 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
