//! Timeline planning: per-entry display durations and transition flags.
//!
//! Planning is pure arithmetic; rendering the plan belongs to the media
//! crate. The invariant maintained here is that the sum of all entry
//! durations equals the narration audio duration exactly, with the last
//! entry absorbing any rounding drift.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from timeline planning.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("cannot plan a timeline with no entries")]
    NoEntries,

    #[error("invalid audio duration: {0}")]
    InvalidAudioDuration(f64),
}

/// One visual segment's placement within the assembled clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Position in the accepted-candidate order.
    pub index: usize,
    /// Display duration in seconds.
    pub duration_secs: f64,
    /// Whether the segment fades in from the previous one.
    pub fade_in: bool,
    /// Whether the segment fades out into the next one.
    pub fade_out: bool,
}

/// A fully planned timeline for one narration track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePlan {
    pub entries: Vec<TimelineEntry>,
    /// Transition length applied at each interior boundary, in seconds.
    pub crossfade_secs: f64,
    /// Duration of the narration track the plan was computed against.
    pub audio_duration_secs: f64,
}

impl TimelinePlan {
    /// Total visual duration. Equals `audio_duration_secs` by construction.
    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.duration_secs).sum()
    }
}

/// Where the narration audio binds when an intro segment is present.
///
/// This is a single explicit policy choice; the assembler never decides
/// it implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationSpan {
    /// Audio starts after the intro segment.
    MainOnly,
    /// Audio covers the whole concatenation, intro included.
    #[default]
    FullTimeline,
}

/// Divide the narration duration evenly across `item_count` entries.
///
/// Entries other than the last get the per-item duration rounded to
/// milliseconds; the last entry takes whatever remains, so the durations
/// sum to `audio_duration_secs` exactly. The first entry never fades in
/// and the last never fades out; a single-entry plan has no transitions
/// at all.
pub fn plan_timeline(
    audio_duration_secs: f64,
    item_count: usize,
    crossfade_secs: f64,
) -> Result<TimelinePlan, TimelineError> {
    if item_count == 0 {
        return Err(TimelineError::NoEntries);
    }
    if !audio_duration_secs.is_finite() || audio_duration_secs <= 0.0 {
        return Err(TimelineError::InvalidAudioDuration(audio_duration_secs));
    }

    let per_item = audio_duration_secs / item_count as f64;
    let rounded = (per_item * 1000.0).round() / 1000.0;

    let mut entries = Vec::with_capacity(item_count);
    for index in 0..item_count {
        let duration_secs = if index == item_count - 1 {
            audio_duration_secs - rounded * (item_count - 1) as f64
        } else {
            rounded
        };
        entries.push(TimelineEntry {
            index,
            duration_secs,
            fade_in: index != 0,
            fade_out: index != item_count - 1,
        });
    }

    Ok(TimelinePlan {
        entries,
        crossfade_secs,
        audio_duration_secs,
    })
}
