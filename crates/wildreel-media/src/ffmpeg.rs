//! FFmpeg command builder and runner.
//!
//! The builder models a single FFmpeg invocation over an ordered list of
//! inputs (looped stills, an intro video, the narration track) feeding
//! one filter graph and one output. `build_args` is pure so the argument
//! layout can be unit-tested without spawning anything.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// One input file with its preceding arguments.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for a multi-input FFmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegJob {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegJob {
    /// Create a job writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a plain `-i` input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args::<[&str; 0], &str>([], path)
    }

    /// Add an input preceded by the given arguments.
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add a still image looped for `duration_secs` at `framerate`.
    pub fn looped_image(self, path: impl AsRef<Path>, duration_secs: f64, framerate: u32) -> Self {
        self.input_with_args(
            [
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                framerate.to_string(),
                "-t".to_string(),
                format!("{:.3}", duration_secs),
            ],
            path,
        )
    }

    /// Limit how much of the input is read.
    pub fn bounded_input(self, path: impl AsRef<Path>, max_secs: f64) -> Self {
        self.input_with_args(["-t".to_string(), format!("{:.3}", max_secs)], path)
    }

    /// Set the filter graph.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set the video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set the audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set the encoding preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set the CRF quality level.
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set the audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set the output frame rate.
    pub fn framerate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-vframes").output_arg("1")
    }

    /// Stream-copy both codecs.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Drop any audio streams from the output.
    pub fn strip_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Enable faststart for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Add a raw output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set the FFmpeg log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the full argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.clone());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg jobs with timeout and cancellation.
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Set a cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set a timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg job to completion.
    pub async fn run(&self, job: &FfmpegJob) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = job.build_args();
        debug!(args = ?args, "running ffmpeg");

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let mut cancel_rx = self.cancel_rx.clone();
        let cancelled = async {
            match cancel_rx.as_mut() {
                Some(rx) => {
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            // Sender dropped without cancelling.
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending().await,
            }
        };

        let timed_out = async {
            match self.timeout_secs {
                Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            output = &mut wait => {
                let output = output?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                    return Err(MediaError::ffmpeg_failed(
                        "FFmpeg exited with an error",
                        Some(stderr),
                        output.status.code(),
                    ));
                }
                Ok(())
            }
            _ = timed_out => Err(MediaError::Timeout(self.timeout_secs.unwrap_or(0))),
            _ = cancelled => Err(MediaError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_orders_inputs_before_output() {
        let job = FfmpegJob::new("out.mp4")
            .looped_image("frame_0.png", 10.0, 24)
            .input("audio.wav")
            .filter_complex("[0:v]fade=t=out:st=9:d=1[vout]")
            .map("[vout]")
            .map("1:a")
            .video_codec("libx264")
            .crf(18);

        let args = job.build_args();
        assert_eq!(args[0], "-y");
        assert_eq!(args[1], "-v");
        assert_eq!(args[2], "error");

        let image_i = args.iter().position(|a| a == "frame_0.png").unwrap();
        let audio_i = args.iter().position(|a| a == "audio.wav").unwrap();
        let filter_i = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(image_i < audio_i);
        assert!(audio_i < filter_i);
        assert_eq!(args.last().unwrap(), "out.mp4");

        // Loop flags precede the image's -i.
        assert_eq!(args[image_i - 1], "-i");
        let loop_i = args[..image_i].iter().position(|a| a == "-loop").unwrap();
        assert_eq!(args[loop_i + 1], "1");
        let t_i = args[..image_i].iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_i + 1], "10.000");
    }

    #[test]
    fn test_trim_style_args() {
        let job = FfmpegJob::new("trimmed.mp4")
            .bounded_input("raw.mp4", 12.0)
            .codec_copy()
            .strip_audio();

        let args = job.build_args();
        let t = args.iter().position(|a| a == "-t").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(t < i, "-t must be an input option");
        assert!(args.contains(&"-an".to_string()));
    }
}
