//! Pipeline orchestration and result aggregation.
//!
//! One orchestrator run owns one task id end to end: it calls the stage
//! adapters in order, writes progress into the task registry after every
//! stage boundary, and merges whatever sections the run produced into the
//! final result. Download and transcription failures are task-fatal; comment
//! fetching and analysis degrade to absent sections instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{self, KeyPointReport, SentimentReport};
use crate::config::Config;
use crate::download::{DownloadRequest, MediaInfo, VideoDownloader};
use crate::instagram::{Comment, CommentFetcher, CommentRequest, CommentSet};
use crate::platform::Platform;
use crate::tasks::{PipelineStep, TaskRegistry};
use crate::transcribe::{TranscribeRequest, Transcriber, Transcript};
use crate::{ClipscoutError, ProgressReporter, Result};

/// External stage adapters the orchestrator drives.
///
/// The seam exists so the pipeline can be exercised without yt-dlp, whisper
/// or Instagram in reach; `LiveAdapters` is the production implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageAdapters: Send + Sync {
    async fn download(
        &self,
        request: DownloadRequest,
        output_dir: PathBuf,
        progress: ProgressReporter,
    ) -> Result<MediaInfo>;

    async fn transcribe(
        &self,
        request: TranscribeRequest,
        work_dir: PathBuf,
        progress: ProgressReporter,
    ) -> Result<Transcript>;

    async fn fetch_comments(
        &self,
        request: CommentRequest,
        progress: ProgressReporter,
    ) -> Result<CommentSet>;

    fn analyze_sentiment(&self, comments: &[Comment]) -> Result<SentimentReport>;

    fn comment_key_points(&self, comments: &[Comment]) -> Result<KeyPointReport>;

    fn transcript_key_points(&self, text: &str) -> Result<KeyPointReport>;
}

/// Production adapters wrapping the real external collaborators
pub struct LiveAdapters {
    downloader: VideoDownloader,
    transcriber: Transcriber,
    comment_fetcher: CommentFetcher,
    max_key_points: usize,
    top_comments: usize,
}

impl LiveAdapters {
    pub fn from_config(config: &Config) -> Self {
        Self {
            downloader: VideoDownloader::new(config.download.yt_dlp_path.clone()),
            transcriber: Transcriber::new(
                config.transcription.whisper_path.clone(),
                config.download.ffmpeg_path.clone(),
                config.transcription.models_dir.clone(),
            ),
            comment_fetcher: CommentFetcher::new(Duration::from_secs(
                config.instagram.request_timeout_secs,
            )),
            max_key_points: config.analysis.max_key_points,
            top_comments: config.analysis.top_comments,
        }
    }
}

#[async_trait]
impl StageAdapters for LiveAdapters {
    async fn download(
        &self,
        request: DownloadRequest,
        output_dir: PathBuf,
        progress: ProgressReporter,
    ) -> Result<MediaInfo> {
        self.downloader.download(&request, &output_dir, &progress).await
    }

    async fn transcribe(
        &self,
        request: TranscribeRequest,
        work_dir: PathBuf,
        progress: ProgressReporter,
    ) -> Result<Transcript> {
        self.transcriber.transcribe(&request, &work_dir, &progress).await
    }

    async fn fetch_comments(
        &self,
        request: CommentRequest,
        progress: ProgressReporter,
    ) -> Result<CommentSet> {
        self.comment_fetcher.fetch_comments(&request, &progress).await
    }

    fn analyze_sentiment(&self, comments: &[Comment]) -> Result<SentimentReport> {
        Ok(analysis::sentiment::analyze_comments(comments, self.top_comments))
    }

    fn comment_key_points(&self, comments: &[Comment]) -> Result<KeyPointReport> {
        Ok(analysis::keypoints::extract_key_points_from_comments(
            comments,
            self.max_key_points,
        ))
    }

    fn transcript_key_points(&self, text: &str) -> Result<KeyPointReport> {
        Ok(analysis::keypoints::extract_key_points_from_transcription(
            text,
            self.max_key_points,
        ))
    }
}

/// A validated processing request, ready to run
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub url: String,
    pub model_size: String,
    pub language: Option<String>,
    pub insta_username: Option<String>,
    pub insta_password: Option<String>,
    pub max_comments: u32,
    pub cookies_file: Option<PathBuf>,
}

/// Video metadata section of the final result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSection {
    pub title: String,
    pub uploader: String,
    pub description: String,
    pub duration: f64,
    pub thumbnail: String,
    pub url: String,
    /// Relative URL of the retained video file, when media is kept
    pub media_url: Option<String>,
}

/// The aggregated payload attached to a completed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub platform: Platform,
    pub is_instagram: bool,
    pub has_video: bool,
    pub video: Option<VideoSection>,
    pub transcription: Option<Transcript>,
    pub transcription_key_points: Option<KeyPointReport>,
    pub instagram: Option<CommentSet>,
    pub sentiment: Option<SentimentReport>,
    pub key_points: Option<KeyPointReport>,
}

/// Sections collected over one orchestrator run, before merging
#[derive(Debug)]
pub struct ResultParts {
    pub platform: Platform,
    pub media: Option<MediaInfo>,
    pub media_url: Option<String>,
    pub transcript: Option<Transcript>,
    pub comments: Option<CommentSet>,
    pub sentiment: Option<SentimentReport>,
    pub comment_key_points: Option<KeyPointReport>,
    pub transcript_key_points: Option<KeyPointReport>,
}

impl ResultParts {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            media: None,
            media_url: None,
            transcript: None,
            comments: None,
            sentiment: None,
            comment_key_points: None,
            transcript_key_points: None,
        }
    }
}

/// Merge whichever sections are present into the final result.
///
/// A missing section never fails the merge; it is simply null in the output.
pub fn aggregate(parts: ResultParts) -> ResearchResult {
    let is_instagram = parts.platform == Platform::Instagram;
    let has_video = parts.media_url.is_some();
    let media_url = parts.media_url;

    let video = parts.media.map(|media| VideoSection {
        title: media.title,
        uploader: media.uploader,
        description: media.description,
        duration: media.duration,
        thumbnail: media.thumbnail,
        url: media.url,
        media_url,
    });

    ResearchResult {
        platform: parts.platform,
        is_instagram,
        has_video,
        video,
        transcription: parts.transcript,
        transcription_key_points: parts.transcript_key_points,
        instagram: parts.comments,
        sentiment: parts.sentiment,
        key_points: parts.comment_key_points,
    }
}

/// Stages that may follow the download, resolved once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Transcribe,
    FetchComments,
    Analyse,
}

/// Resolve the remaining stage list once the platform is confirmed
pub(crate) fn stage_plan(platform: Platform) -> Vec<Stage> {
    let mut plan = vec![Stage::Transcribe];
    if platform == Platform::Instagram {
        plan.push(Stage::FetchComments);
        plan.push(Stage::Analyse);
    }
    plan
}

/// Runs the fixed stage sequence for one task at a time
#[derive(Clone)]
pub struct PipelineOrchestrator {
    config: Config,
    registry: Arc<TaskRegistry>,
    adapters: Arc<dyn StageAdapters>,
}

impl PipelineOrchestrator {
    pub fn new(config: Config, registry: Arc<TaskRegistry>, adapters: Arc<dyn StageAdapters>) -> Self {
        Self {
            config,
            registry,
            adapters,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Create a task and schedule its pipeline run in the background.
    ///
    /// Returns immediately with the task id; the submitting request never
    /// waits on any stage.
    pub fn spawn(&self, request: ProcessRequest) -> Uuid {
        let id = self.registry.create();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(id, request).await;
        });
        id
    }

    /// Run the pipeline for an already-created task id
    pub async fn run(&self, id: Uuid, request: ProcessRequest) {
        if let Err(error) = self.execute(id, &request).await {
            tracing::warn!(task = %id, error = %error, "Task failed");
            if let Err(registry_error) = self.registry.fail(id, error.to_string()) {
                tracing::error!(
                    task = %id,
                    error = %registry_error,
                    "Could not record task failure"
                );
            }
        }
    }

    async fn execute(&self, id: Uuid, request: &ProcessRequest) -> Result<()> {
        let cancel = self
            .registry
            .cancel_token(id)
            .ok_or(ClipscoutError::NotFound(id))?;

        // Scratch space owned by this run; dropped (and deleted) on any exit.
        let work_dir = tempfile::tempdir().context("Failed to create task work directory")?;

        self.registry
            .update(id, PipelineStep::Downloading, 0, "Downloading video...")?;

        let media = self
            .adapters
            .download(
                DownloadRequest {
                    url: request.url.clone(),
                    cookies_file: request.cookies_file.clone(),
                },
                work_dir.path().to_path_buf(),
                self.stage_reporter(id, PipelineStep::Downloading, 0, 25),
            )
            .await
            .map_err(|error| ClipscoutError::DownloadFailed(error.to_string()))?;

        self.registry
            .update(id, PipelineStep::Downloading, 25, "Download complete")?;

        let mut parts = ResultParts::new(media.platform);
        parts.media = Some(media);

        // The platform is confirmed; resolve the rest of the run up front.
        for stage in stage_plan(parts.platform) {
            if cancel.is_cancelled() {
                anyhow::bail!("Task cancelled");
            }

            match stage {
                Stage::Transcribe => {
                    self.run_transcribe(id, request, work_dir.path().to_path_buf(), &mut parts)
                        .await?
                }
                Stage::FetchComments => self.run_fetch_comments(id, request, &mut parts).await?,
                Stage::Analyse => self.run_analysis(id, &mut parts)?,
            }
        }

        parts.media_url = self.finalize_media(parts.media.as_ref());
        self.registry.complete(id, aggregate(parts))?;
        Ok(())
    }

    /// Transcription stage (25-60%); failure here is task-fatal
    async fn run_transcribe(
        &self,
        id: Uuid,
        request: &ProcessRequest,
        work_dir: PathBuf,
        parts: &mut ResultParts,
    ) -> Result<()> {
        self.registry.update(
            id,
            PipelineStep::Transcribing,
            25,
            "Loading transcription model...",
        )?;

        let video_path = parts
            .media
            .as_ref()
            .map(|media| media.video_path.clone())
            .ok_or_else(|| anyhow::anyhow!("Transcription scheduled without downloaded media"))?;

        let transcript = self
            .adapters
            .transcribe(
                TranscribeRequest {
                    video_path,
                    model_size: request.model_size.clone(),
                    language: request.language.clone(),
                },
                work_dir,
                self.stage_reporter(id, PipelineStep::Transcribing, 25, 35),
            )
            .await
            .map_err(|error| ClipscoutError::TranscriptionFailed(error.to_string()))?;

        self.registry
            .update(id, PipelineStep::Transcribing, 60, "Transcription complete")?;
        parts.transcript = Some(transcript);
        Ok(())
    }

    /// Comment-fetch stage (60-75%); failure degrades to an absent section
    async fn run_fetch_comments(
        &self,
        id: Uuid,
        request: &ProcessRequest,
        parts: &mut ResultParts,
    ) -> Result<()> {
        self.registry.update(
            id,
            PipelineStep::FetchingComments,
            60,
            "Fetching Instagram comments...",
        )?;

        let comment_request = CommentRequest {
            url: request.url.clone(),
            username: request.insta_username.clone(),
            password: request.insta_password.clone(),
            max_comments: request.max_comments,
            cookies_file: request.cookies_file.clone(),
        };

        match self
            .adapters
            .fetch_comments(
                comment_request,
                self.stage_reporter(id, PipelineStep::FetchingComments, 60, 15),
            )
            .await
        {
            Ok(comments) => {
                self.registry
                    .update(id, PipelineStep::FetchingComments, 75, "Comments fetched")?;
                parts.comments = Some(comments);
            }
            Err(error) => {
                tracing::warn!(task = %id, error = %error, "Comment fetch failed; continuing without comments");
                self.registry.update(
                    id,
                    PipelineStep::FetchingComments,
                    75,
                    format!("Could not fetch comments: {error}"),
                )?;
            }
        }

        Ok(())
    }

    /// Analysis stage (75-95%); each sub-step fails independently
    fn run_analysis(&self, id: Uuid, parts: &mut ResultParts) -> Result<()> {
        let comments: Vec<Comment> = match parts.comments.as_ref() {
            Some(set) if !set.comments.is_empty() => set.comments.clone(),
            _ => return Ok(()),
        };

        self.registry.update(
            id,
            PipelineStep::Analysing,
            75,
            "Running sentiment analysis...",
        )?;

        match self.adapters.analyze_sentiment(&comments) {
            Ok(report) => parts.sentiment = Some(report),
            Err(error) => {
                tracing::warn!(task = %id, error = %error, "Sentiment analysis failed");
            }
        }

        self.registry.update(
            id,
            PipelineStep::Analysing,
            85,
            "Extracting key talking points...",
        )?;

        match self.adapters.comment_key_points(&comments) {
            Ok(report) => parts.comment_key_points = Some(report),
            Err(error) => {
                tracing::warn!(task = %id, error = %error, "Comment key-point extraction failed");
            }
        }

        if let Some(transcript) = parts.transcript.as_ref() {
            match self.adapters.transcript_key_points(&transcript.text) {
                Ok(report) => parts.transcript_key_points = Some(report),
                Err(error) => {
                    tracing::warn!(task = %id, error = %error, "Transcript key-point extraction failed");
                }
            }
        }

        self.registry
            .update(id, PipelineStep::Analysing, 95, "Analysis complete")?;
        Ok(())
    }

    /// Promote the downloaded video into the served media directory, or let
    /// the scratch dir drop it. Promotion problems never fail the task.
    fn finalize_media(&self, media: Option<&MediaInfo>) -> Option<String> {
        let media = media?;
        if !self.config.download.keep_media {
            return None;
        }

        let file_name = media.video_path.file_name()?.to_string_lossy().to_string();
        let destination = self.config.download.media_dir.join(&file_name);

        let promoted = fs_err::create_dir_all(&self.config.download.media_dir)
            .and_then(|_| fs_err::copy(&media.video_path, &destination));
        match promoted {
            Ok(_) => Some(format!("/media/{file_name}")),
            Err(error) => {
                tracing::warn!(error = %error, "Could not retain downloaded media");
                None
            }
        }
    }

    /// Reporter mapping a stage's 0..=1 fraction into its progress window
    fn stage_reporter(
        &self,
        id: Uuid,
        step: PipelineStep,
        base: u8,
        span: u8,
    ) -> ProgressReporter {
        let registry = Arc::clone(&self.registry);
        ProgressReporter::new(move |fraction, message| {
            let bounded = fraction.clamp(0.0, 1.0);
            let progress = base.saturating_add((bounded * span as f64).round() as u8);
            if let Err(error) = registry.update(id, step, progress, message) {
                tracing::debug!(task = %id, error = %error, "Dropped progress update");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instagram::PostInfo;
    use crate::tasks::TaskStatus;
    use crate::transcribe::TranscriptSegment;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.download.keep_media = false;
        config
    }

    fn media_info(platform: Platform, url: &str) -> MediaInfo {
        MediaInfo {
            video_path: PathBuf::from("/tmp/does-not-exist/video_test.mp4"),
            title: "Test video".to_string(),
            description: "A test clip".to_string(),
            duration: 42.0,
            platform,
            thumbnail: "https://cdn.example.com/thumb.jpg".to_string(),
            uploader: "creator".to_string(),
            url: url.to_string(),
        }
    }

    fn transcript() -> Transcript {
        let segments = vec![TranscriptSegment {
            start: 0.0,
            end: 4.0,
            text: "Today we are testing the new espresso machine.".to_string(),
            start_formatted: "00:00".to_string(),
            end_formatted: "00:04".to_string(),
        }];
        Transcript {
            text: "Today we are testing the new espresso machine.".to_string(),
            formatted: "[00:00 - 00:04] Today we are testing the new espresso machine.".to_string(),
            formatted_plain: "Today we are testing the new espresso machine.".to_string(),
            segments,
            language: "en".to_string(),
            language_probability: Some(0.98),
        }
    }

    fn comment_set() -> CommentSet {
        let comments = vec![
            Comment {
                text: "I love this machine, amazing crema".to_string(),
                owner: "fan1".to_string(),
                likes: 12,
                timestamp: None,
            },
            Comment {
                text: "Way too expensive, disappointing".to_string(),
                owner: "critic".to_string(),
                likes: 3,
                timestamp: None,
            },
        ];
        CommentSet {
            comment_count: comments.len(),
            comments,
            post_info: PostInfo {
                caption: "New reel".to_string(),
                likes: 100,
                owner: "creator".to_string(),
                date: None,
                is_video: true,
                video_view_count: Some(5000),
                media_type: "reel".to_string(),
            },
            login_used: false,
        }
    }

    fn request(url: &str) -> ProcessRequest {
        ProcessRequest {
            url: url.to_string(),
            model_size: "tiny".to_string(),
            language: None,
            insta_username: None,
            insta_password: None,
            max_comments: 200,
            cookies_file: None,
        }
    }

    fn orchestrator(adapters: MockStageAdapters) -> (PipelineOrchestrator, Arc<TaskRegistry>) {
        let registry = Arc::new(TaskRegistry::new());
        let orchestrator =
            PipelineOrchestrator::new(test_config(), Arc::clone(&registry), Arc::new(adapters));
        (orchestrator, registry)
    }

    #[test]
    fn test_stage_plan_instagram() {
        assert_eq!(
            stage_plan(Platform::Instagram),
            vec![Stage::Transcribe, Stage::FetchComments, Stage::Analyse]
        );
    }

    #[test]
    fn test_stage_plan_other_platforms() {
        assert_eq!(stage_plan(Platform::Youtube), vec![Stage::Transcribe]);
        assert_eq!(stage_plan(Platform::Other), vec![Stage::Transcribe]);
    }

    #[test]
    fn test_aggregate_flags_and_sections() {
        let mut parts = ResultParts::new(Platform::Instagram);
        parts.media = Some(media_info(Platform::Instagram, "https://instagram.com/reel/XYZ/"));
        parts.media_url = Some("/media/video_test.mp4".to_string());
        parts.transcript = Some(transcript());

        let result = aggregate(parts);
        assert!(result.is_instagram);
        assert!(result.has_video);
        assert_eq!(
            result.video.as_ref().unwrap().media_url.as_deref(),
            Some("/media/video_test.mp4")
        );
        assert!(result.transcription.is_some());
        assert!(result.sentiment.is_none());
        assert!(result.key_points.is_none());
    }

    #[test]
    fn test_aggregate_without_media() {
        let result = aggregate(ResultParts::new(Platform::Youtube));
        assert!(!result.is_instagram);
        assert!(!result.has_video);
        assert!(result.video.is_none());
    }

    #[tokio::test]
    async fn test_instagram_run_produces_full_result() {
        let url = "https://www.instagram.com/reel/XYZ/";
        let mut adapters = MockStageAdapters::new();
        adapters
            .expect_download()
            .returning(move |request, _, progress| {
                progress.report(0.5, "Downloading...");
                Ok(media_info(Platform::Instagram, &request.url))
            });
        adapters
            .expect_transcribe()
            .returning(|_, _, _| Ok(transcript()));
        adapters
            .expect_fetch_comments()
            .returning(|_, _| Ok(comment_set()));
        adapters
            .expect_analyze_sentiment()
            .returning(|comments| Ok(analysis::sentiment::analyze_comments(comments, 5)));
        adapters.expect_comment_key_points().returning(|comments| {
            Ok(analysis::keypoints::extract_key_points_from_comments(comments, 10))
        });
        adapters.expect_transcript_key_points().returning(|text| {
            Ok(analysis::keypoints::extract_key_points_from_transcription(text, 10))
        });

        let (orchestrator, registry) = orchestrator(adapters);
        let id = registry.create();
        orchestrator.run(id, request(url)).await;

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.progress, 100);
        assert!(task.error.is_none());

        let result = task.result.unwrap();
        assert!(result.is_instagram);
        assert!(result.transcription.is_some());
        assert!(result.instagram.is_some());
        assert!(result.key_points.is_some());
        assert!(result.transcription_key_points.is_some());

        let sentiment = result.sentiment.unwrap();
        assert_eq!(sentiment.distribution.total(), 2);
    }

    #[tokio::test]
    async fn test_youtube_run_skips_comment_stages() {
        let url = "https://youtube.com/watch?v=abc";
        let mut adapters = MockStageAdapters::new();
        adapters
            .expect_download()
            .returning(move |request, _, _| Ok(media_info(Platform::Youtube, &request.url)));
        adapters
            .expect_transcribe()
            .returning(|_, _, _| Ok(transcript()));
        adapters.expect_fetch_comments().never();
        adapters.expect_analyze_sentiment().never();

        let (orchestrator, registry) = orchestrator(adapters);
        let id = registry.create();
        orchestrator.run(id, request(url)).await;

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Complete);

        let result = task.result.unwrap();
        assert!(!result.is_instagram);
        assert!(result.transcription.is_some());
        assert!(result.sentiment.is_none());
        assert!(result.key_points.is_none());
    }

    #[tokio::test]
    async fn test_download_failure_is_fatal() {
        let mut adapters = MockStageAdapters::new();
        adapters
            .expect_download()
            .returning(|_, _, _| Err(anyhow::anyhow!("malformed URL")));
        adapters.expect_transcribe().never();

        let (orchestrator, registry) = orchestrator(adapters);
        let id = registry.create();
        orchestrator.run(id, request("https://example.com/broken")).await;

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        let error = task.error.unwrap();
        assert!(error.contains("Download failed"), "got: {error}");
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_transcription_failure_is_fatal() {
        let mut adapters = MockStageAdapters::new();
        adapters
            .expect_download()
            .returning(move |request, _, _| Ok(media_info(Platform::Youtube, &request.url)));
        adapters
            .expect_transcribe()
            .returning(|_, _, _| Err(anyhow::anyhow!("model missing")));

        let (orchestrator, registry) = orchestrator(adapters);
        let id = registry.create();
        orchestrator.run(id, request("https://youtube.com/watch?v=abc")).await;

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.error.unwrap().contains("Transcription failed"));
    }

    #[tokio::test]
    async fn test_comment_fetch_failure_degrades_gracefully() {
        let url = "https://www.instagram.com/reel/XYZ/";
        let mut adapters = MockStageAdapters::new();
        adapters
            .expect_download()
            .returning(move |request, _, _| Ok(media_info(Platform::Instagram, &request.url)));
        adapters
            .expect_transcribe()
            .returning(|_, _, _| Ok(transcript()));
        adapters
            .expect_fetch_comments()
            .returning(|_, _| Err(anyhow::anyhow!("requires authentication")));
        adapters.expect_analyze_sentiment().never();

        let (orchestrator, registry) = orchestrator(adapters);
        let id = registry.create();
        orchestrator.run(id, request(url)).await;

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Complete);

        let result = task.result.unwrap();
        assert!(result.transcription.is_some());
        assert!(result.instagram.is_none());
        assert!(result.sentiment.is_none());
        assert!(result.key_points.is_none());
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let mut adapters = MockStageAdapters::new();
        adapters
            .expect_download()
            .returning(move |request, _, _| Ok(media_info(Platform::Youtube, &request.url)));
        adapters.expect_transcribe().never();

        let (orchestrator, registry) = orchestrator(adapters);
        let id = registry.create();
        registry.request_cancel(id).unwrap();
        orchestrator.run(id, request("https://youtube.com/watch?v=abc")).await;

        let task = registry.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.error.unwrap().contains("cancelled"));
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_stage_reporter_maps_into_window() {
        let (orchestrator, registry) = orchestrator(MockStageAdapters::new());
        let id = registry.create();

        let reporter = orchestrator.stage_reporter(id, PipelineStep::Downloading, 0, 25);
        reporter.report(0.5, "halfway");
        assert_eq!(registry.get(id).unwrap().progress, 13);

        reporter.report(2.0, "overflow is clamped");
        assert_eq!(registry.get(id).unwrap().progress, 25);
    }
}
