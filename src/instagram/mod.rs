//! Instagram comment fetching over the web API.
//!
//! Comments for a reel/post are read from Instagram's private web endpoints
//! with an optional account login or Netscape cookies file; authentication
//! improves access to comments and reduces rate limiting.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::platform;
use crate::{ProgressReporter, Result};

const API_BASE: &str = "https://i.instagram.com/api/v1";
const LOGIN_PAGE: &str = "https://www.instagram.com/accounts/login/";
const LOGIN_ENDPOINT: &str = "https://www.instagram.com/api/v1/web/accounts/login/ajax/";

/// App id the Instagram web client sends with every API request
const IG_APP_ID: &str = "936619743392459";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base64url alphabet Instagram uses for shortcodes
const SHORTCODE_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// A single fetched comment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub owner: String,
    pub likes: u64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Basic information about the post the comments belong to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInfo {
    pub caption: String,
    pub likes: u64,
    pub owner: String,
    pub date: Option<DateTime<Utc>>,
    pub is_video: bool,
    pub video_view_count: Option<u64>,
    pub media_type: String,
}

/// Result of a comment fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentSet {
    pub comments: Vec<Comment>,
    pub post_info: PostInfo,
    pub comment_count: usize,
    pub login_used: bool,
}

/// Comment-fetch request assembled by the orchestrator
#[derive(Debug, Clone)]
pub struct CommentRequest {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_comments: u32,
    pub cookies_file: Option<PathBuf>,
}

/// Comment fetcher for Instagram posts and reels
pub struct CommentFetcher {
    request_timeout: Duration,
}

impl CommentFetcher {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    /// Fetch comments from an Instagram post or reel.
    ///
    /// Fails when the post cannot be resolved at all; once any comments have
    /// been collected, pagination errors return the partial set instead.
    pub async fn fetch_comments(
        &self,
        request: &CommentRequest,
        progress: &ProgressReporter,
    ) -> Result<CommentSet> {
        let shortcode = platform::instagram_shortcode(&request.url).ok_or_else(|| {
            anyhow::anyhow!("Could not extract Instagram shortcode from URL: {}", request.url)
        })?;
        let media_pk = shortcode_to_media_pk(&shortcode)?;

        progress.report(0.1, "Connecting to Instagram...");

        let jar = Arc::new(Jar::default());
        if let Some(cookies_file) = &request.cookies_file {
            load_netscape_cookies(&jar, cookies_file)?;
        }

        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()?;

        let login_used = match (&request.username, &request.password) {
            (Some(username), Some(password)) => {
                self.login(&client, &jar, username, password).await?;
                true
            }
            _ => false,
        };

        progress.report(0.3, "Fetching post data...");
        let post_info = self.fetch_post_info(&client, media_pk).await?;

        progress.report(0.5, "Fetching comments...");
        let comments = self
            .fetch_comment_pages(&client, media_pk, request.max_comments, progress)
            .await?;

        progress.report(1.0, "Comments fetched");

        Ok(CommentSet {
            comment_count: comments.len(),
            comments,
            post_info,
            login_used,
        })
    }

    /// Log in with username/password to obtain a session cookie
    async fn login(
        &self,
        client: &reqwest::Client,
        jar: &Arc<Jar>,
        username: &str,
        password: &str,
    ) -> Result<()> {
        // The login page sets the csrftoken cookie the ajax endpoint requires.
        client
            .get(LOGIN_PAGE)
            .send()
            .await
            .context("Failed to reach Instagram login page")?;

        let csrf_token = csrf_token_from_jar(jar)
            .ok_or_else(|| anyhow::anyhow!("Instagram did not issue a CSRF token"))?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let enc_password = format!("#PWD_INSTAGRAM_BROWSER:0:{timestamp}:{password}");

        let response = client
            .post(LOGIN_ENDPOINT)
            .header("X-CSRFToken", csrf_token)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&[("username", username), ("enc_password", &enc_password)])
            .send()
            .await
            .context("Instagram login request failed")?;

        let login: LoginResponse = response
            .json()
            .await
            .context("Malformed Instagram login response")?;

        if !login.authenticated {
            anyhow::bail!(
                "Invalid Instagram credentials (two-factor accounts need a cookies file instead)"
            );
        }

        Ok(())
    }

    async fn fetch_post_info(&self, client: &reqwest::Client, media_pk: u128) -> Result<PostInfo> {
        let response = client
            .get(format!("{API_BASE}/media/{media_pk}/info/"))
            .header("X-IG-App-ID", IG_APP_ID)
            .send()
            .await
            .context("Failed to fetch Instagram post")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch Instagram post (HTTP {}). It may be private or deleted; \
                 try providing Instagram credentials",
                response.status()
            );
        }

        let info: MediaInfoResponse = response
            .json()
            .await
            .context("Malformed Instagram post response")?;

        let item = info
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Instagram returned no media for this post"))?;

        let is_video = item.media_type == 2;
        Ok(PostInfo {
            caption: item.caption.map(|c| c.text).unwrap_or_default(),
            likes: item.like_count,
            owner: item.user.map(|u| u.username).unwrap_or_default(),
            date: item.taken_at.and_then(|secs| DateTime::from_timestamp(secs, 0)),
            is_video,
            video_view_count: if is_video { item.play_count } else { None },
            media_type: if is_video { "reel" } else { "image" }.to_string(),
        })
    }

    /// Page through the comments endpoint up to `max_comments`
    async fn fetch_comment_pages(
        &self,
        client: &reqwest::Client,
        media_pk: u128,
        max_comments: u32,
        progress: &ProgressReporter,
    ) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = Vec::new();
        let mut min_id: Option<String> = None;

        while comments.len() < max_comments as usize {
            let mut request = client
                .get(format!("{API_BASE}/media/{media_pk}/comments/"))
                .header("X-IG-App-ID", IG_APP_ID)
                .query(&[("can_support_threading", "true")]);
            if let Some(id) = &min_id {
                request = request.query(&[("min_id", id.as_str())]);
            }

            let page: CommentsResponse = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    response.json().await.context("Malformed comments response")?
                }
                Ok(response) if comments.is_empty() => {
                    anyhow::bail!(
                        "Could not fetch comments (HTTP {}). This may require authentication",
                        response.status()
                    );
                }
                Err(error) if comments.is_empty() => {
                    return Err(anyhow::Error::from(error).context("Could not fetch comments"));
                }
                // Keep whatever we managed to get before the failure.
                _ => break,
            };

            if page.comments.is_empty() {
                break;
            }

            for api_comment in page.comments {
                if comments.len() >= max_comments as usize {
                    break;
                }
                comments.push(Comment {
                    text: api_comment.text,
                    owner: api_comment.user.map(|u| u.username).unwrap_or_default(),
                    likes: api_comment.comment_like_count,
                    timestamp: api_comment
                        .created_at
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                });
            }

            let fetched_fraction = (comments.len() as f64 / max_comments as f64).min(1.0);
            progress.report(
                0.5 + 0.4 * fetched_fraction,
                &format!("Fetched {} comments...", comments.len()),
            );

            min_id = page.next_min_id;
            if min_id.is_none() {
                break;
            }
        }

        Ok(comments)
    }
}

/// Convert a shortcode to the numeric media pk the API endpoints expect.
///
/// Shortcodes are the media pk encoded with Instagram's base64url alphabet.
pub fn shortcode_to_media_pk(shortcode: &str) -> Result<u128> {
    let mut pk: u128 = 0;
    for ch in shortcode.chars() {
        let index = SHORTCODE_ALPHABET
            .find(ch)
            .ok_or_else(|| anyhow::anyhow!("Invalid character '{ch}' in shortcode {shortcode}"))?;
        pk = pk
            .checked_mul(64)
            .and_then(|value| value.checked_add(index as u128))
            .ok_or_else(|| anyhow::anyhow!("Shortcode {shortcode} is too long"))?;
    }
    Ok(pk)
}

/// Read csrftoken out of the cookie jar
fn csrf_token_from_jar(jar: &Arc<Jar>) -> Option<String> {
    let url = Url::parse("https://www.instagram.com/").ok()?;
    let header = jar.cookies(&url)?;
    let cookies = header.to_str().ok()?.to_string();

    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "csrftoken").then(|| value.to_string())
    })
}

/// Load a Netscape-format cookies.txt into the jar for instagram.com
fn load_netscape_cookies(jar: &Arc<Jar>, path: &Path) -> Result<()> {
    let content = fs_err::read_to_string(path).context("Failed to read cookies file")?;
    let url = Url::parse("https://www.instagram.com/")?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }

        let (domain, path, name, value) = (fields[0], fields[2], fields[5], fields[6]);
        if !domain.contains("instagram.com") {
            continue;
        }

        jar.add_cookie_str(&format!("{name}={value}; Domain={domain}; Path={path}"), &url);
    }

    Ok(())
}

// API response models (the subset of fields we consume).

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    authenticated: bool,
}

#[derive(Debug, Deserialize)]
struct MediaInfoResponse {
    #[serde(default)]
    items: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    caption: Option<ApiCaption>,
    #[serde(default)]
    like_count: u64,
    user: Option<ApiUser>,
    taken_at: Option<i64>,
    #[serde(default)]
    media_type: u8,
    play_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiCaption {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<ApiComment>,
    next_min_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    #[serde(default)]
    text: String,
    user: Option<ApiUser>,
    #[serde(default)]
    comment_like_count: u64,
    created_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcode_to_media_pk() {
        // Values follow directly from the base64url positional encoding.
        assert_eq!(shortcode_to_media_pk("A").unwrap(), 0);
        assert_eq!(shortcode_to_media_pk("B").unwrap(), 1);
        assert_eq!(shortcode_to_media_pk("Ba").unwrap(), 1 * 64 + 26);
        assert_eq!(shortcode_to_media_pk("_").unwrap(), 63);
    }

    #[test]
    fn test_shortcode_rejects_invalid_characters() {
        assert!(shortcode_to_media_pk("abc!").is_err());
        assert!(shortcode_to_media_pk("with space").is_err());
    }

    #[test]
    fn test_comments_response_parsing() {
        let body = r#"{
            "comments": [
                {"text": "great reel", "user": {"username": "viewer1"},
                 "comment_like_count": 12, "created_at": 1700000000},
                {"text": "nice", "comment_like_count": 0}
            ],
            "next_min_id": "abc123"
        }"#;

        let page: CommentsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.comments.len(), 2);
        assert_eq!(page.comments[0].comment_like_count, 12);
        assert_eq!(page.next_min_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_media_info_parsing() {
        let body = r#"{
            "items": [{
                "caption": {"text": "my reel"},
                "like_count": 42,
                "user": {"username": "creator"},
                "taken_at": 1700000000,
                "media_type": 2,
                "play_count": 999
            }]
        }"#;

        let info: MediaInfoResponse = serde_json::from_str(body).unwrap();
        let item = &info.items[0];
        assert_eq!(item.media_type, 2);
        assert_eq!(item.play_count, Some(999));
    }

    #[test]
    fn test_load_netscape_cookies_skips_foreign_domains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        fs_err::write(
            &path,
            "# Netscape HTTP Cookie File\n\
             .instagram.com\tTRUE\t/\tTRUE\t0\tsessionid\tabc\n\
             .example.com\tTRUE\t/\tTRUE\t0\tother\tdef\n",
        )
        .unwrap();

        let jar = Arc::new(Jar::default());
        load_netscape_cookies(&jar, &path).unwrap();

        let url = Url::parse("https://www.instagram.com/").unwrap();
        let header = jar.cookies(&url).unwrap();
        let cookies = header.to_str().unwrap();
        assert!(cookies.contains("sessionid=abc"));
        assert!(!cookies.contains("other=def"));
    }
}
