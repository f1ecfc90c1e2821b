use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::utils::format_timestamp;
use crate::{ProgressReporter, Result};

pub mod processor;

/// Available model sizes (speed vs accuracy tradeoff)
pub const MODEL_SIZES: &[(&str, &str)] = &[
    ("tiny", "Fastest, least accurate (~1GB RAM)"),
    ("base", "Good balance of speed and accuracy (~1GB RAM)"),
    ("small", "Better accuracy, moderate speed (~2GB RAM)"),
    ("medium", "High accuracy, slower (~5GB RAM)"),
    ("large-v3", "Best accuracy, slowest (~10GB RAM)"),
];

pub const DEFAULT_MODEL_SIZE: &str = "base";

/// Whether `size` names a supported whisper model
pub fn is_known_model_size(size: &str) -> bool {
    MODEL_SIZES.iter().any(|(name, _)| *name == size)
}

/// Names of the supported model sizes
pub fn model_sizes() -> Vec<&'static str> {
    MODEL_SIZES.iter().map(|(name, _)| *name).collect()
}

/// Transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcription text
    pub text: String,

    /// Segments with timing information
    pub segments: Vec<TranscriptSegment>,

    /// Detected (or requested) language
    pub language: String,

    /// Confidence of language detection, when the model auto-detected it
    pub language_probability: Option<f64>,

    /// Rendered transcript with `[MM:SS - MM:SS]` stamps per line
    pub formatted: String,

    /// Rendered transcript without timestamps
    pub formatted_plain: String,
}

/// Individual transcript segment with timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    /// Segment text
    pub text: String,

    /// Start time as MM:SS / HH:MM:SS
    pub start_formatted: String,

    /// End time as MM:SS / HH:MM:SS
    pub end_formatted: String,
}

/// Transcription request assembled by the orchestrator
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub video_path: PathBuf,
    pub model_size: String,
    pub language: Option<String>,
}

/// Transcriber wrapping ffmpeg audio extraction and the whisper.cpp CLI
pub struct Transcriber {
    whisper_path: String,
    ffmpeg_path: String,
    models_dir: PathBuf,
}

impl Transcriber {
    pub fn new(
        whisper_path: impl Into<String>,
        ffmpeg_path: impl Into<String>,
        models_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            whisper_path: whisper_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
            models_dir: models_dir.into(),
        }
    }

    /// Transcribe the audio track of a video file.
    ///
    /// `work_dir` receives the intermediate wav and the whisper JSON output;
    /// the caller owns its lifetime (typically a per-task temp dir).
    pub async fn transcribe(
        &self,
        request: &TranscribeRequest,
        work_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<Transcript> {
        let model_path = self.model_path(&request.model_size);
        if !model_path.exists() {
            anyhow::bail!(
                "Whisper model '{}' not found at {} (download ggml-{}.bin into the models directory)",
                request.model_size,
                model_path.display(),
                request.model_size
            );
        }

        progress.report(0.05, "Extracting audio track...");
        let audio_path = self.extract_audio(&request.video_path, work_dir).await?;

        progress.report(0.25, "Transcribing audio...");
        let (json_output, stderr) = self
            .run_whisper(&model_path, &audio_path, request.language.as_deref(), work_dir)
            .await?;

        progress.report(0.95, "Processing transcript...");
        let parsed = processor::parse_whisper_output(&json_output, &stderr)
            .context("Failed to parse whisper output")?;

        let segments: Vec<TranscriptSegment> = parsed
            .segments
            .into_iter()
            .map(|seg| TranscriptSegment {
                start_formatted: format_timestamp(seg.start),
                end_formatted: format_timestamp(seg.end),
                start: seg.start,
                end: seg.end,
                text: seg.text,
            })
            .collect();

        let text = segments
            .iter()
            .map(|seg| seg.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let language = request
            .language
            .clone()
            .or(parsed.language)
            .unwrap_or_else(|| "unknown".to_string());

        progress.report(1.0, "Transcription complete");

        Ok(Transcript {
            formatted: format_transcription(&segments, true),
            formatted_plain: format_transcription(&segments, false),
            text,
            segments,
            language,
            language_probability: parsed.language_probability,
        })
    }

    fn model_path(&self, model_size: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{model_size}.bin"))
    }

    /// Convert the video's audio track to the 16 kHz mono wav whisper expects
    async fn extract_audio(&self, video_path: &Path, work_dir: &Path) -> Result<PathBuf> {
        let audio_path = work_dir.join("audio.wav");

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .args(["-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"])
            .arg(&audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg failed to extract audio: {}", error.trim());
        }

        Ok(audio_path)
    }

    /// Run whisper and return the JSON document plus captured stderr.
    ///
    /// stderr carries the auto-detected language line, which is not part of
    /// the JSON output.
    async fn run_whisper(
        &self,
        model_path: &Path,
        audio_path: &Path,
        language: Option<&str>,
        work_dir: &Path,
    ) -> Result<(String, String)> {
        let output_prefix = work_dir.join("transcript");

        let output = Command::new(&self.whisper_path)
            .arg("--model")
            .arg(model_path)
            .arg("--file")
            .arg(audio_path)
            .arg("--output-json")
            .arg("--output-file")
            .arg(&output_prefix)
            .args(["--language", language.unwrap_or("auto")])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("whisper failed: {}", error.trim());
        }

        let json_path = output_prefix.with_extension("json");
        let json_output = fs_err::read_to_string(&json_path)
            .context("Whisper did not produce a JSON transcript")?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok((json_output, stderr))
    }
}

/// Format transcription segments into readable text
pub fn format_transcription(segments: &[TranscriptSegment], include_timestamps: bool) -> String {
    let mut lines = Vec::with_capacity(segments.len());
    for seg in segments {
        if include_timestamps {
            lines.push(format!(
                "[{} - {}] {}",
                seg.start_formatted, seg.end_formatted, seg.text
            ));
        } else {
            lines.push(seg.text.clone());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
            start_formatted: format_timestamp(start),
            end_formatted: format_timestamp(end),
        }
    }

    #[test]
    fn test_model_size_helpers() {
        assert!(is_known_model_size("tiny"));
        assert!(is_known_model_size("large-v3"));
        assert!(!is_known_model_size("huge"));
        assert_eq!(model_sizes().len(), MODEL_SIZES.len());
    }

    #[test]
    fn test_format_transcription_with_timestamps() {
        let segments = vec![segment(0.0, 2.5, "Hello there."), segment(2.5, 65.0, "Welcome back.")];
        let formatted = format_transcription(&segments, true);
        assert_eq!(formatted, "[00:00 - 00:02] Hello there.\n[00:02 - 01:05] Welcome back.");
    }

    #[test]
    fn test_format_transcription_plain() {
        let segments = vec![segment(0.0, 2.5, "Hello there."), segment(2.5, 5.0, "Welcome back.")];
        assert_eq!(format_transcription(&segments, false), "Hello there.\nWelcome back.");
    }
}
