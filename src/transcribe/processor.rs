//! Parsing of the whisper.cpp JSON document and stderr diagnostics.

use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;

use crate::Result;

/// Parsed transcription, before presentation formatting
#[derive(Debug, Clone)]
pub struct ParsedTranscription {
    pub segments: Vec<ParsedSegment>,
    pub language: Option<String>,
    pub language_probability: Option<f64>,
}

/// One segment with times in seconds
#[derive(Debug, Clone)]
pub struct ParsedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// whisper.cpp `--output-json` document
#[derive(Debug, Deserialize)]
struct WhisperDocument {
    result: Option<WhisperResult>,
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperResult {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

/// Segment offsets in milliseconds
#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: i64,
    to: i64,
}

/// Parse whisper's JSON document and stderr into typed segments.
///
/// Empty segments (whisper emits them around silence) are dropped.
pub fn parse_whisper_output(json_output: &str, stderr: &str) -> Result<ParsedTranscription> {
    let document: WhisperDocument =
        serde_json::from_str(json_output).context("Malformed whisper JSON document")?;

    let segments = document
        .transcription
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(ParsedSegment {
                start: seg.offsets.from as f64 / 1000.0,
                end: seg.offsets.to as f64 / 1000.0,
                text,
            })
        })
        .collect();

    let (detected_language, language_probability) = parse_detected_language(stderr);

    let language = document
        .result
        .and_then(|result| result.language)
        .or(detected_language);

    Ok(ParsedTranscription {
        segments,
        language,
        language_probability,
    })
}

/// Pull the auto-detection line out of whisper's stderr, when present.
///
/// The tool logs `auto-detected language: en (p = 0.976406)` only when no
/// language was forced, so both values are optional.
fn parse_detected_language(stderr: &str) -> (Option<String>, Option<f64>) {
    static LANGUAGE_RE: OnceLock<Regex> = OnceLock::new();
    let re = LANGUAGE_RE.get_or_init(|| {
        Regex::new(r"auto-detected language:\s*([A-Za-z-]+)\s*\(p\s*=\s*([0-9.]+)\)")
            .expect("language regex is valid")
    });

    match re.captures(stderr) {
        Some(caps) => {
            let language = caps[1].to_string();
            let probability = caps[2].parse::<f64>().ok();
            (Some(language), probability)
        }
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "systeminfo": "AVX = 1",
        "model": {"type": "base"},
        "result": {"language": "en"},
        "transcription": [
            {
                "timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                "offsets": {"from": 0, "to": 2500},
                "text": " Hello there."
            },
            {
                "timestamps": {"from": "00:00:02,500", "to": "00:00:03,000"},
                "offsets": {"from": 2500, "to": 3000},
                "text": "   "
            },
            {
                "timestamps": {"from": "00:00:03,000", "to": "00:00:05,000"},
                "offsets": {"from": 3000, "to": 5000},
                "text": " Welcome back."
            }
        ]
    }"#;

    #[test]
    fn test_parse_whisper_output() {
        let parsed = parse_whisper_output(SAMPLE_JSON, "").unwrap();

        assert_eq!(parsed.language.as_deref(), Some("en"));
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].text, "Hello there.");
        assert!((parsed.segments[0].start - 0.0).abs() < f64::EPSILON);
        assert!((parsed.segments[0].end - 2.5).abs() < f64::EPSILON);
        assert_eq!(parsed.segments[1].text, "Welcome back.");
    }

    #[test]
    fn test_parse_whisper_output_rejects_garbage() {
        assert!(parse_whisper_output("not json", "").is_err());
    }

    #[test]
    fn test_parse_detected_language() {
        let stderr = "whisper_init_from_file...\nauto-detected language: en (p = 0.976406)\n";
        let (language, probability) = parse_detected_language(stderr);
        assert_eq!(language.as_deref(), Some("en"));
        assert!((probability.unwrap() - 0.976406).abs() < 1e-9);
    }

    #[test]
    fn test_parse_detected_language_absent_when_forced() {
        let (language, probability) = parse_detected_language("processing audio...\n");
        assert!(language.is_none());
        assert!(probability.is_none());
    }

    #[test]
    fn test_stderr_language_used_when_json_omits_it() {
        let json = r#"{"transcription": [{"offsets": {"from": 0, "to": 1000}, "text": " Hi"}]}"#;
        let stderr = "auto-detected language: de (p = 0.81)\n";
        let parsed = parse_whisper_output(json, stderr).unwrap();
        assert_eq!(parsed.language.as_deref(), Some("de"));
    }
}
