//! Comment and transcript analysis: sentiment scoring and key-point extraction.

pub mod keypoints;
pub mod sentiment;

pub use keypoints::{KeyPhrase, KeyPointReport, ThemeWord};
pub use sentiment::{CommentSentiment, SentimentDistribution, SentimentLabel, SentimentReport};
