use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Platforms the service recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Threads,
    Youtube,
    Tiktok,
    Facebook,
    Reddit,
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Threads => "threads",
            Platform::Youtube => "youtube",
            Platform::Tiktok => "tiktok",
            Platform::Facebook => "facebook",
            Platform::Reddit => "reddit",
            Platform::Other => "other",
        }
    }

    /// All platforms with dedicated detection rules (excludes `Other`)
    pub fn known() -> &'static [Platform] {
        &[
            Platform::Instagram,
            Platform::Twitter,
            Platform::Threads,
            Platform::Youtube,
            Platform::Tiktok,
            Platform::Facebook,
            Platform::Reddit,
        ]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered host-suffix rules; the first matching rule wins.
const HOST_RULES: &[(Platform, &[&str])] = &[
    (Platform::Instagram, &["instagram.com", "instagr.am"]),
    (Platform::Twitter, &["twitter.com", "x.com"]),
    (Platform::Threads, &["threads.net"]),
    (Platform::Youtube, &["youtube.com", "youtu.be"]),
    (Platform::Tiktok, &["tiktok.com", "vm.tiktok.com"]),
    (Platform::Facebook, &["facebook.com", "fb.watch"]),
    (Platform::Reddit, &["reddit.com", "v.redd.it"]),
];

/// Detect which platform a URL belongs to.
///
/// Returns `Platform::Other` for unrecognised hosts and for strings that do
/// not parse as URLs at all; absence of a match is a valid outcome, not an
/// error.
pub fn detect(url: &str) -> Platform {
    let host = match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => return Platform::Other,
        },
        Err(_) => return Platform::Other,
    };

    for (platform, suffixes) in HOST_RULES {
        for suffix in *suffixes {
            if host == *suffix || host.ends_with(&format!(".{suffix}")) {
                return *platform;
            }
        }
    }

    Platform::Other
}

/// Check if the URL is an Instagram URL
pub fn is_instagram_url(url: &str) -> bool {
    detect(url) == Platform::Instagram
}

/// Extract the shortcode from an Instagram URL.
///
/// Supports `/reel/`, `/reels/`, `/p/` and `/tv/` style links.
pub fn instagram_shortcode(url: &str) -> Option<String> {
    static SHORTCODE_RE: OnceLock<Regex> = OnceLock::new();
    let re = SHORTCODE_RE.get_or_init(|| {
        Regex::new(r"instagram\.com/(?:reel|reels|p|tv)/([A-Za-z0-9_-]+)")
            .expect("shortcode regex is valid")
    });

    re.captures(url).map(|caps| caps[1].to_string())
}

/// Clean and normalize a URL, defaulting to https for scheme-less input
pub fn clean_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
