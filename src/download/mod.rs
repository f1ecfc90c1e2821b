use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use crate::platform::{self, Platform};
use crate::{ProgressReporter, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Descriptor for a downloaded video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the downloaded video file
    pub video_path: PathBuf,

    /// Video title
    pub title: String,

    /// Video description
    pub description: String,

    /// Duration in seconds
    pub duration: f64,

    /// Detected platform
    pub platform: Platform,

    /// Thumbnail URL
    pub thumbnail: String,

    /// Uploader name
    pub uploader: String,

    /// Original URL that was processed
    pub url: String,
}

/// Download request assembled by the orchestrator
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub cookies_file: Option<PathBuf>,
}

/// Video downloader wrapping the yt-dlp binary
pub struct VideoDownloader {
    yt_dlp_path: String,
}

impl VideoDownloader {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> Result<bool> {
        let output = Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        Ok(output.map(|o| o.status.success()).unwrap_or(false))
    }

    /// Get video metadata using yt-dlp without downloading
    async fn probe(&self, request: &DownloadRequest) -> Result<Value> {
        tracing::debug!("Extracting video info for: {}", request.url);

        let mut command = Command::new(&self.yt_dlp_path);
        command.args(["--dump-json", "--no-playlist", "--user-agent", USER_AGENT]);
        if let Some(cookies) = &request.cookies_file {
            command.arg("--cookies").arg(cookies);
        }
        command.arg(&request.url);

        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let json_str = String::from_utf8(output.stdout)?;
        let info: Value = serde_json::from_str(&json_str)?;

        Ok(info)
    }

    /// Download a video into `output_dir`, reporting incremental progress.
    ///
    /// yt-dlp is asked for an mp4 muxing of the best available streams; the
    /// resulting file lands at a unique name so concurrent tasks never collide.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        output_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<MediaInfo> {
        let info = self.probe(request).await?;
        let detected = platform::detect(&request.url);
        let filename = format!("video_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let output_template = output_dir.join(format!("{filename}.%(ext)s"));

        fs_err::create_dir_all(output_dir)?;

        let mut command = Command::new(&self.yt_dlp_path);
        command.args([
            "--output",
            &output_template.to_string_lossy(),
            "--format",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            "--merge-output-format",
            "mp4",
            "--no-playlist",
            "--socket-timeout",
            "30",
            "--user-agent",
            USER_AGENT,
            "--newline",
        ]);
        if let Some(cookies) = &request.cookies_file {
            command.arg("--cookies").arg(cookies);
        }
        command.arg(&request.url);

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr in the background so the child never blocks on a full
        // pipe while we are reading progress lines from stdout.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr_pipe {
                use tokio::io::AsyncReadExt;
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        });

        // --newline makes yt-dlp emit one "[download]  42.1% ..." line per
        // update, which we translate into registry progress.
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(pct) = parse_progress_line(&line) {
                    progress.report(pct, "Downloading...");
                }
            }
        }

        let status = child.wait().await?;
        let stderr_output = stderr_task.await.unwrap_or_default();
        if !status.success() {
            anyhow::bail!("yt-dlp failed to download video: {}", stderr_output.trim());
        }

        progress.report(1.0, "Download complete, processing...");

        let video_path = find_downloaded_file(output_dir, &filename)?;

        Ok(MediaInfo {
            video_path,
            title: info["title"].as_str().unwrap_or("Unknown").to_string(),
            description: info["description"].as_str().unwrap_or("").to_string(),
            duration: info["duration"].as_f64().unwrap_or(0.0),
            platform: detected,
            thumbnail: info["thumbnail"].as_str().unwrap_or("").to_string(),
            uploader: info["uploader"].as_str().unwrap_or("Unknown").to_string(),
            url: request.url.clone(),
        })
    }
}

/// Parse a fractional completion value out of a yt-dlp progress line
fn parse_progress_line(line: &str) -> Option<f64> {
    static PROGRESS_RE: OnceLock<Regex> = OnceLock::new();
    let re = PROGRESS_RE.get_or_init(|| {
        Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").expect("progress regex is valid")
    });

    let caps = re.captures(line)?;
    let pct: f64 = caps[1].parse().ok()?;
    Some((pct / 100.0).clamp(0.0, 1.0))
}

/// Locate the file yt-dlp produced for the given unique stem.
///
/// The merge step usually yields `.mp4`, but some sources fall back to other
/// containers, so check the common ones before scanning the directory.
fn find_downloaded_file(output_dir: &Path, filename: &str) -> Result<PathBuf> {
    for ext in ["mp4", "webm", "mkv"] {
        let candidate = output_dir.join(format!("{filename}.{ext}"));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    for entry in fs_err::read_dir(output_dir)? {
        let path = entry?.path();
        if path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem == filename)
        {
            return Ok(path);
        }
    }

    anyhow::bail!(
        "Downloaded video file not found in {}",
        output_dir.display()
    )
}
