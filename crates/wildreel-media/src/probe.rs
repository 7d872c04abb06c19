//! FFprobe media information.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Basic facts about a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Width of the first video stream, 0 for audio-only files.
    pub width: u32,
    /// Height of the first video stream, 0 for audio-only files.
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse ffprobe's JSON output into a [`MediaInfo`].
pub fn parse_probe_output(bytes: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)?;

    let duration_secs = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::invalid_media("missing duration in probe output"))?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let width = video.and_then(|s| s.width).unwrap_or(0);
    let height = video.and_then(|s| s.height).unwrap_or(0);

    Ok(MediaInfo {
        duration_secs,
        width,
        height,
    })
}

/// Probe a media file for duration and dimensions.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    parse_probe_output(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_probe() {
        let json = br#"{
            "format": { "duration": "30.500000" },
            "streams": [
                { "codec_type": "audio" },
                { "codec_type": "video", "width": 1280, "height": 720 }
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_secs, 30.5);
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
    }

    #[test]
    fn test_parse_audio_only_probe() {
        let json = br#"{
            "format": { "duration": "12.000000" },
            "streams": [ { "codec_type": "audio" } ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_secs, 12.0);
        assert_eq!(info.width, 0);
        assert_eq!(info.height, 0);
    }

    #[test]
    fn test_missing_duration_is_rejected() {
        let json = br#"{ "format": {}, "streams": [] }"#;
        assert!(parse_probe_output(json).is_err());
    }
}
