//! Key talking-point extraction using RAKE and frequency analysis.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use rake::{Rake, StopWords};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::instagram::Comment;

/// A ranked key phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPhrase {
    pub phrase: String,
    pub score: f64,
}

/// A recurring theme word with its frequency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeWord {
    pub word: String,
    pub count: usize,
}

/// Key talking points extracted from a text corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPointReport {
    pub key_phrases: Vec<KeyPhrase>,
    pub common_themes: Vec<ThemeWord>,
    pub summary_points: Vec<String>,
}

/// English stop words for RAKE phrase boundaries and theme filtering
const BASE_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such",
    "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "can", "will",
    "just", "don", "should", "now", "im", "ive", "dont", "cant", "wont", "isnt", "arent",
];

/// Additional noise words common in social media comments
const SOCIAL_STOP_WORDS: &[&str] = &[
    "like", "just", "get", "got", "one", "would", "could", "also", "really", "much", "even",
    "still", "thing", "things", "way", "good", "great", "nice", "lol", "omg", "wow", "yes",
    "no", "please", "thanks", "thank", "love", "amazing", "awesome", "http", "https", "www",
    "com",
];

fn rake_stop_words() -> StopWords {
    BASE_STOP_WORDS
        .iter()
        .map(|w| (*w).to_string())
        .collect::<HashSet<String>>()
        .into()
}

fn theme_stop_words() -> &'static HashSet<&'static str> {
    static THEME_STOP_WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    THEME_STOP_WORDS.get_or_init(|| {
        BASE_STOP_WORDS
            .iter()
            .chain(SOCIAL_STOP_WORDS.iter())
            .copied()
            .collect()
    })
}

fn word_regex() -> &'static Regex {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    WORD_RE.get_or_init(|| Regex::new(r"[a-zA-Z]{3,}").expect("word regex is valid"))
}

/// Truncate to a character limit with a trailing ellipsis
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Extract key phrases from text using the RAKE algorithm.
///
/// Near-duplicate phrases (same lowercase form) are collapsed and very short
/// fragments dropped.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<KeyPhrase> {
    let rake = Rake::new(rake_stop_words());
    let ranked = rake.run(text);

    let mut keywords = Vec::new();
    let mut seen_phrases = HashSet::new();

    for scored in ranked {
        let normalized = scored.keyword.to_lowercase().trim().to_string();
        if seen_phrases.contains(&normalized) || normalized.len() < 3 {
            continue;
        }
        seen_phrases.insert(normalized);
        keywords.push(KeyPhrase {
            phrase: scored.keyword.clone(),
            score: (scored.score * 100.0).round() / 100.0,
        });
        if keywords.len() >= max_keywords {
            break;
        }
    }

    keywords
}

/// Count recurring non-stop-word themes in a corpus
fn common_themes(text: &str, max_points: usize) -> Vec<ThemeWord> {
    let stop_words = theme_stop_words();
    let lowered = text.to_lowercase();

    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for word in word_regex().find_iter(&lowered) {
        let word = word.as_str();
        if stop_words.contains(word) {
            continue;
        }
        *frequencies.entry(word.to_string()).or_insert(0) += 1;
    }

    let mut themes: Vec<ThemeWord> = frequencies
        .into_iter()
        .map(|(word, count)| ThemeWord { word, count })
        .collect();
    // Alphabetical tie-break keeps the ordering stable across runs.
    themes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    themes.truncate(max_points);
    themes
}

/// Extract key talking points from a list of comments.
///
/// Mirrors the comment report: ranked phrases, recurring theme words, and
/// human-readable summary bullets including the most-liked comments.
pub fn extract_key_points_from_comments(comments: &[Comment], max_points: usize) -> KeyPointReport {
    let all_text = comments
        .iter()
        .filter(|c| !c.text.is_empty())
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if all_text.trim().is_empty() {
        return KeyPointReport {
            key_phrases: Vec::new(),
            common_themes: Vec::new(),
            summary_points: vec!["No comment text available for analysis.".to_string()],
        };
    }

    let key_phrases = extract_keywords(&all_text, max_points);
    let common_themes = common_themes(&all_text, max_points);

    let mut summary_points = Vec::new();
    if !key_phrases.is_empty() {
        let top_topics: Vec<&str> = key_phrases
            .iter()
            .take(5)
            .map(|kp| kp.phrase.as_str())
            .collect();
        summary_points.push(format!("Top topics discussed: {}", top_topics.join(", ")));
    }

    if !common_themes.is_empty() {
        let top_words: Vec<&str> = common_themes
            .iter()
            .take(5)
            .map(|theme| theme.word.as_str())
            .collect();
        summary_points.push(format!("Most frequently mentioned: {}", top_words.join(", ")));
    }

    let mut top_liked: Vec<&Comment> = comments.iter().filter(|c| c.likes > 0).collect();
    top_liked.sort_by(|a, b| b.likes.cmp(&a.likes));
    for comment in top_liked.iter().take(3) {
        summary_points.push(format!(
            "Popular comment ({} likes): \"{}\"",
            comment.likes,
            truncate_chars(&comment.text, 100)
        ));
    }

    if summary_points.is_empty() {
        summary_points.push("Not enough data to extract meaningful points.".to_string());
    }

    KeyPointReport {
        key_phrases,
        common_themes,
        summary_points,
    }
}

/// Extract key talking points from transcription text
pub fn extract_key_points_from_transcription(
    transcription_text: &str,
    max_points: usize,
) -> KeyPointReport {
    if transcription_text.trim().is_empty() {
        return KeyPointReport {
            key_phrases: Vec::new(),
            common_themes: Vec::new(),
            summary_points: vec!["No transcription text available.".to_string()],
        };
    }

    let key_phrases = extract_keywords(transcription_text, max_points);

    let mut summary_points = Vec::new();
    if !key_phrases.is_empty() {
        let top_topics: Vec<&str> = key_phrases
            .iter()
            .take(5)
            .map(|kp| kp.phrase.as_str())
            .collect();
        summary_points.push(format!("Key topics in the video: {}", top_topics.join(", ")));
    }

    // Surface one sentence of context around the strongest phrase.
    if let Some(top_phrase) = key_phrases.first() {
        let needle = top_phrase.phrase.to_lowercase();
        let context = transcription_text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| sentence.len() > 20)
            .find(|sentence| sentence.to_lowercase().contains(&needle));
        if let Some(sentence) = context {
            summary_points.push(format!("Context: \"{}\"", truncate_chars(sentence, 150)));
        }
    }

    if summary_points.is_empty() {
        summary_points.push("Not enough content to extract key points.".to_string());
    }

    KeyPointReport {
        key_phrases,
        common_themes: Vec::new(),
        summary_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(text: &str, likes: u64) -> Comment {
        Comment {
            text: text.to_string(),
            owner: "someone".to_string(),
            likes,
            timestamp: None,
        }
    }

    #[test]
    fn test_extract_keywords_finds_phrases() {
        let text = "The new camera sensor performs well in low light. \
                    Low light photography has always been difficult. \
                    The camera sensor is the real story here.";
        let keywords = extract_keywords(text, 10);

        assert!(!keywords.is_empty());
        let all = keywords
            .iter()
            .map(|kp| kp.phrase.to_lowercase())
            .collect::<Vec<_>>()
            .join(" | ");
        assert!(all.contains("camera sensor") || all.contains("low light"), "got: {all}");
    }

    #[test]
    fn test_extract_keywords_dedupes() {
        let text = "great recipe. great recipe. great recipe.";
        let keywords = extract_keywords(text, 10);
        let phrases: Vec<String> = keywords.iter().map(|kp| kp.phrase.to_lowercase()).collect();
        let unique: HashSet<&String> = phrases.iter().collect();
        assert_eq!(phrases.len(), unique.len());
    }

    #[test]
    fn test_common_themes_filters_stop_words() {
        let text = "the pasta the pasta the pasta is just so good with garlic and garlic";
        let themes = common_themes(text, 5);

        assert_eq!(themes[0].word, "pasta");
        assert_eq!(themes[0].count, 3);
        assert!(themes.iter().all(|t| t.word != "the" && t.word != "just" && t.word != "good"));
    }

    #[test]
    fn test_comment_key_points_include_popular_comments() {
        let comments = vec![
            comment("The pasta recipe looks incredible, saving this", 40),
            comment("pasta recipe please!", 7),
            comment("what brand of olive oil is that", 0),
        ];

        let report = extract_key_points_from_comments(&comments, 10);
        assert!(!report.key_phrases.is_empty());
        assert!(report
            .summary_points
            .iter()
            .any(|point| point.starts_with("Popular comment (40 likes):")));
    }

    #[test]
    fn test_comment_key_points_empty_corpus() {
        let report = extract_key_points_from_comments(&[comment("", 1)], 10);
        assert!(report.key_phrases.is_empty());
        assert_eq!(
            report.summary_points,
            vec!["No comment text available for analysis.".to_string()]
        );
    }

    #[test]
    fn test_transcription_key_points() {
        let text = "Today we are testing the new espresso machine. \
                    The espresso machine heats up in under a minute. \
                    I was surprised by the build quality.";
        let report = extract_key_points_from_transcription(text, 10);

        assert!(!report.key_phrases.is_empty());
        assert!(report.common_themes.is_empty());
        assert!(report.summary_points[0].starts_with("Key topics in the video:"));
    }

    #[test]
    fn test_transcription_key_points_empty() {
        let report = extract_key_points_from_transcription("   ", 10);
        assert_eq!(
            report.summary_points,
            vec!["No transcription text available.".to_string()]
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 5), "abcde...");
    }
}
