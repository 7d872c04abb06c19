//! WildReel production pipeline.
//!
//! This crate drives one production run end to end:
//! - Candidate sourcing: repeated provider queries gated by geometry and
//!   relevance checks, with quota-exhaustion and partial-success policies
//! - Relevance gating: ONNX classification or a human-review fallback,
//!   selected once per subject
//! - Timeline assembly and publishing via an injected platform client
//! - Thumbnail curation: poll for the platform-generated preview, then
//!   normalize and composite overlays
//!
//! External collaborators (stock-media provider, hosting platform, human
//! reviewer) are consumed through the traits in [`ports`]; nothing in
//! this crate constructs a network client for them.

pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod relevance;
pub mod sourcing;
pub mod thumbnail;

pub use classifier::{ClassifierConfig, ImageClassifier};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use ports::{
    CandidateReviewer, ImageProvider, PlatformError, ProviderError, ReviewError, SegmentProvider,
    SourcedMedia, SourcedSegment, VideoId, VideoPlatform, VideoUpload,
};
pub use relevance::{GateDecision, RelevanceGate};
pub use sourcing::{CandidateSourcer, SegmentOutcome, SegmentSourcer, SourcingOutcome};
pub use thumbnail::{ThumbnailConfig, ThumbnailCurator};
pub use pipeline::{ProduceReport, ProduceRequest, VideoPipeline};
