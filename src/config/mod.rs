use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transcribe;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Download stage settings
    pub download: DownloadConfig,

    /// Transcription stage settings
    pub transcription: TranscriptionConfig,

    /// Instagram comment-fetch settings
    pub instagram: InstagramConfig,

    /// Comment/transcript analysis settings
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,

    /// Server port
    pub port: u16,

    /// Enable permissive CORS (useful when a frontend is served elsewhere)
    pub enable_cors: bool,

    /// Seconds a finished task stays pollable before eviction
    pub task_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory where retained media files are served from
    pub media_dir: PathBuf,

    /// Keep downloaded videos and expose them under /media after a task
    /// finishes; when false every artifact is removed at finalisation
    pub keep_media: bool,

    /// yt-dlp binary (name in PATH or absolute path)
    pub yt_dlp_path: String,

    /// ffmpeg binary (name in PATH or absolute path)
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// whisper.cpp CLI binary (name in PATH or absolute path)
    pub whisper_path: String,

    /// Directory holding ggml model files (ggml-<size>.bin)
    pub models_dir: PathBuf,

    /// Model size used when a request does not specify one
    pub default_model_size: String,

    /// Default language code; None means auto-detect
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    /// Comment count used when a request does not specify one
    pub default_max_comments: u32,

    /// Lower clamp for requested comment counts
    pub min_comments: u32,

    /// Upper clamp for requested comment counts
    pub max_comments: u32,

    /// Per-request timeout for Instagram API calls
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum ranked phrases / theme words per key-point report
    pub max_key_points: usize,

    /// How many most-positive / most-negative comments to surface
    pub top_comments: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
                enable_cors: true,
                task_ttl_secs: 3600,
            },
            download: DownloadConfig {
                media_dir: PathBuf::from("downloads"),
                keep_media: true,
                yt_dlp_path: "yt-dlp".to_string(),
                ffmpeg_path: "ffmpeg".to_string(),
            },
            transcription: TranscriptionConfig {
                whisper_path: "whisper-cli".to_string(),
                models_dir: PathBuf::from("models"),
                default_model_size: transcribe::DEFAULT_MODEL_SIZE.to_string(),
                default_language: None,
            },
            instagram: InstagramConfig {
                default_max_comments: 200,
                min_comments: 50,
                max_comments: 500,
                request_timeout_secs: 30,
            },
            analysis: AnalysisConfig {
                max_key_points: 10,
                top_comments: 5,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("clipscout").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !transcribe::is_known_model_size(&self.transcription.default_model_size) {
            anyhow::bail!(
                "Unknown default model size '{}' (expected one of: {})",
                self.transcription.default_model_size,
                transcribe::model_sizes().join(", ")
            );
        }

        if self.instagram.min_comments > self.instagram.max_comments {
            anyhow::bail!(
                "instagram.min_comments ({}) must not exceed instagram.max_comments ({})",
                self.instagram.min_comments,
                self.instagram.max_comments
            );
        }

        if self.server.task_ttl_secs == 0 {
            anyhow::bail!("server.task_ttl_secs must be at least 1");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Bind Address: {}:{}", self.server.bind_address, self.server.port);
        println!("  Task TTL: {}s", self.server.task_ttl_secs);
        println!("  Media Dir: {}", self.download.media_dir.display());
        println!("  Keep Media: {}", self.download.keep_media);
        println!("  Whisper Models: {}", self.transcription.models_dir.display());
        println!("  Default Model: {}", self.transcription.default_model_size);
        println!("  Comment Range: {}..={}", self.instagram.min_comments, self.instagram.max_comments);
    }
}

impl InstagramConfig {
    /// Clamp a requested comment count into the configured range
    pub fn clamp_max_comments(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_comments)
            .clamp(self.min_comments, self.max_comments)
    }
}
