use anyhow::Result;
use url::Url;

use crate::config::Config;

/// Validate a URL and return a normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed.to_string())
}

/// Format seconds into an `HH:MM:SS` or `MM:SS` timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Format duration in human-readable form
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize a filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Check that the external tools the pipeline shells out to are present.
///
/// Returns a list of human-readable warnings for anything missing; the server
/// still starts, since individual tasks will surface the failure themselves.
pub async fn check_dependencies(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&config.download.yt_dlp_path).await {
        missing.push(format!(
            "{} - required for video downloading",
            config.download.yt_dlp_path
        ));
    }

    if !check_command_available(&config.download.ffmpeg_path).await {
        missing.push(format!(
            "{} - required for audio extraction before transcription",
            config.download.ffmpeg_path
        ));
    }

    if !check_command_available(&config.transcription.whisper_path).await {
        missing.push(format!(
            "{} - required for transcription (whisper.cpp CLI)",
            config.transcription.whisper_path
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--help")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
