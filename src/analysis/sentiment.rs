//! Sentiment analysis over fetched comments using VADER.
//!
//! VADER is tuned for social media text, which makes it a good fit for
//! short reel comments.

use serde::{Deserialize, Serialize};
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::instagram::Comment;

/// Per-comment sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "Positive"),
            SentimentLabel::Negative => write!(f, "Negative"),
            SentimentLabel::Neutral => write!(f, "Neutral"),
        }
    }
}

/// Scores for a single comment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentSentiment {
    pub text: String,
    pub owner: String,
    pub likes: u64,
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub sentiment: SentimentLabel,
}

/// Count of comments per label
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentDistribution {
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

/// Aggregated sentiment over a comment set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    pub results: Vec<CommentSentiment>,
    pub summary: String,
    pub distribution: SentimentDistribution,
    pub average_compound: f64,
    pub most_positive: Vec<CommentSentiment>,
    pub most_negative: Vec<CommentSentiment>,
}

/// Classify a compound score into a sentiment label.
///
/// VADER compound scores range from -1 (most negative) to +1 (most positive).
pub fn classify_sentiment(compound_score: f64) -> SentimentLabel {
    if compound_score >= 0.05 {
        SentimentLabel::Positive
    } else if compound_score <= -0.05 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Analyze sentiment of a list of comments.
///
/// `top_n` controls how many most-positive / most-negative comments are
/// surfaced alongside the distribution.
pub fn analyze_comments(comments: &[Comment], top_n: usize) -> SentimentReport {
    let analyzer = SentimentIntensityAnalyzer::new();
    let mut results = Vec::new();

    for comment in comments {
        if comment.text.is_empty() {
            continue;
        }

        let scores = analyzer.polarity_scores(&comment.text);
        let compound = scores.get("compound").copied().unwrap_or(0.0);

        results.push(CommentSentiment {
            text: comment.text.clone(),
            owner: comment.owner.clone(),
            likes: comment.likes,
            compound,
            positive: scores.get("pos").copied().unwrap_or(0.0),
            negative: scores.get("neg").copied().unwrap_or(0.0),
            neutral: scores.get("neu").copied().unwrap_or(0.0),
            sentiment: classify_sentiment(compound),
        });
    }

    if results.is_empty() {
        return SentimentReport {
            results: Vec::new(),
            summary: "No comments to analyze".to_string(),
            distribution: SentimentDistribution::default(),
            average_compound: 0.0,
            most_positive: Vec::new(),
            most_negative: Vec::new(),
        };
    }

    let mut distribution = SentimentDistribution::default();
    for result in &results {
        match result.sentiment {
            SentimentLabel::Positive => distribution.positive += 1,
            SentimentLabel::Negative => distribution.negative += 1,
            SentimentLabel::Neutral => distribution.neutral += 1,
        }
    }

    let average_compound =
        results.iter().map(|r| r.compound).sum::<f64>() / results.len() as f64;

    let mut sorted = results.clone();
    sorted.sort_by(|a, b| {
        b.compound
            .partial_cmp(&a.compound)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let most_positive: Vec<CommentSentiment> = sorted.iter().take(top_n).cloned().collect();
    let most_negative: Vec<CommentSentiment> =
        sorted.iter().rev().take(top_n).cloned().collect();

    let total = results.len();
    let pos_pct = distribution.positive as f64 / total as f64 * 100.0;
    let neg_pct = distribution.negative as f64 / total as f64 * 100.0;
    let neu_pct = distribution.neutral as f64 / total as f64 * 100.0;

    let overall = classify_sentiment(average_compound);
    let summary = format!(
        "Overall sentiment: {overall} (avg score: {average_compound:.3}). \
         Distribution: {pos_pct:.1}% positive, {neg_pct:.1}% negative, \
         {neu_pct:.1}% neutral across {total} comments."
    );

    SentimentReport {
        results,
        summary,
        distribution,
        average_compound,
        most_positive,
        most_negative,
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
    fn test_classify_sentiment_thresholds() {
        assert_eq!(classify_sentiment(0.5), SentimentLabel::Positive);
        assert_eq!(classify_sentiment(0.05), SentimentLabel::Positive);
        assert_eq!(classify_sentiment(0.0), SentimentLabel::Neutral);
        assert_eq!(classify_sentiment(-0.049), SentimentLabel::Neutral);
        assert_eq!(classify_sentiment(-0.05), SentimentLabel::Negative);
    }

    #[test]
    fn test_analyze_comments_distribution_sums_to_count() {
        let comments = vec![
            comment("I love this, absolutely amazing!", 3),
            comment("This is terrible and I hate it", 0),
            comment("The video shows a kitchen", 1),
            comment("", 0),
        ];

        let report = analyze_comments(&comments, 5);
        // The empty comment is skipped before scoring.
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.distribution.total(), 3);
    }

    #[test]
    fn test_analyze_comments_polarity() {
        let comments = vec![
            comment("I love this, absolutely amazing and wonderful!", 3),
            comment("This is horrible, terrible, awful garbage", 0),
        ];

        let report = analyze_comments(&comments, 1);
        assert_eq!(report.results[0].sentiment, SentimentLabel::Positive);
        assert_eq!(report.results[1].sentiment, SentimentLabel::Negative);
        assert_eq!(report.most_positive.len(), 1);
        assert_eq!(report.most_negative.len(), 1);
        assert!(report.most_positive[0].compound > report.most_negative[0].compound);
    }

    #[test]
    fn test_analyze_comments_empty() {
        let report = analyze_comments(&[], 5);
        assert_eq!(report.summary, "No comments to analyze");
        assert_eq!(report.distribution.total(), 0);
        assert!(report.most_positive.is_empty());
    }
}
