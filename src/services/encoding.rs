use std::fs;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;

#[derive(Debug, Serialize)]
pub struct EncodingCandidate {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct EncodingDetectionResult {
    pub best: String,
    pub confidence: f32,
    pub candidates: Vec<EncodingCandidate>,
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn guess(bytes: &[u8]) -> &'static Encoding {
    if bytes.starts_with(UTF8_BOM) {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

pub fn detect(bytes: &[u8]) -> EncodingDetectionResult {
    if bytes.starts_with(UTF8_BOM) {
        return EncodingDetectionResult {
            best: "utf-8-sig".into(),
            confidence: 0.99,
            candidates: vec![
                EncodingCandidate {
                    name: "utf-8-sig".into(),
                    confidence: 0.99,
                },
                EncodingCandidate {
                    name: "utf-8".into(),
                    confidence: 0.90,
                },
            ],
        };
    }

    let decoded = decode_guessed(bytes);
    let best = decoded.encoding.to_lowercase();
    let confidence = decoded.confidence();

    let mut candidates = vec![EncodingCandidate {
        name: best.clone(),
        confidence,
    }];

    // Legacy spreadsheets exported on Vietnamese Windows are often cp1258,
    // which detectors confuse with cp1252.
    if best == "windows-1252" {
        candidates.push(EncodingCandidate {
            name: "windows-1258".into(),
            confidence: (confidence - 0.10).max(0.0),
        });
    } else if best == "shift_jis" {
        candidates.push(EncodingCandidate {
            name: "windows-31j".into(),
            confidence: (confidence - 0.03).max(0.0),
        });
    }

    if best == "utf-8" {
        candidates.push(EncodingCandidate {
            name: "utf-8-sig".into(),
            confidence: (confidence - 0.20).max(0.0),
        });
    }

    EncodingDetectionResult {
        best,
        confidence,
        candidates,
    }
}

/// One decode with the guessed encoding, shared by detection and loading.
struct Decoded {
    text: String,
    encoding: &'static str,
    had_errors: bool,
}

impl Decoded {
    /// Replacement characters mean a bad guess; otherwise more text, more trust.
    fn confidence(&self) -> f32 {
        if self.had_errors {
            return 0.35;
        }
        match self.text.len() {
            0..=63 => 0.55,
            64..=511 => 0.70,
            512..=4095 => 0.82,
            _ => 0.90,
        }
    }
}

fn decode_guessed(bytes: &[u8]) -> Decoded {
    let (text, used, had_errors) = guess(bytes).decode(bytes);
    Decoded {
        text: text.into_owned(),
        encoding: used.name(),
        had_errors,
    }
}

/// Decodes uploaded bytes with the detected encoding (BOM removed).
pub fn decode(bytes: &[u8]) -> (String, &'static str) {
    let decoded = decode_guessed(bytes);
    if decoded.had_errors {
        warn!(encoding = decoded.encoding, "input had undecodable bytes, replaced");
    }
    (decoded.text, decoded.encoding)
}

pub fn read_text(path: &Path) -> Result<(String, &'static str), StoreError> {
    let bytes = fs::read(path)?;
    Ok(decode(&bytes))
}
