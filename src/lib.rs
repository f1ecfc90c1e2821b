//! Clipscout - a media-research aggregator service
//!
//! This library downloads videos from social platforms, transcribes their audio,
//! and, for Instagram reels, fetches comments and derives sentiment plus key
//! talking points. Work runs as background tasks that clients poll over HTTP.

pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod instagram;
pub mod pipeline;
pub mod platform;
pub mod tasks;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use download::MediaInfo;
pub use pipeline::{PipelineOrchestrator, ResearchResult, StageAdapters};
pub use platform::Platform;
pub use tasks::{Task, TaskRegistry, TaskStatus};
pub use transcribe::Transcript;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Callback handle stage adapters use to report fractional progress
/// (0.0..=1.0) together with a short activity message
#[derive(Clone)]
pub struct ProgressReporter(std::sync::Arc<dyn Fn(f64, &str) + Send + Sync>);

impl ProgressReporter {
    pub fn new(callback: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        Self(std::sync::Arc::new(callback))
    }

    /// Reporter that discards all updates
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    pub fn report(&self, fraction: f64, message: &str) {
        (self.0)(fraction, message);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressReporter")
    }
}

/// Error types specific to the aggregator
#[derive(thiserror::Error, Debug)]
pub enum ClipscoutError {
    #[error("Task not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Comment fetch failed: {0}")]
    CommentFetchFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Task is already terminal: {0}")]
    AlreadyTerminal(uuid::Uuid),
}
