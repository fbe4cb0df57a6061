//! Generic cleanup for text no lab-specific parser recognized.
//!
//! Classifies each line as content or noise and keeps the content. The output
//! is unstructured text; no records are produced here.

use crate::normalize::collapse_whitespace;
use regex::Regex;
use std::sync::LazyLock;

/// Lines shorter than this with mostly symbols are recognition debris
const MIN_ALNUM_RATIO: f32 = 0.5;

static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:page\s+\d+(?:\s+of\s+\d+)?|\d+\s+of\s+\d+|-\s*\d+\s*-)$")
        .expect("valid regex")
});

static URL_OR_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://|www\.)\S+|^\S+@\S+\.\S+$").expect("valid regex")
});

static PHONE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:phone|tel|fax|ph)\s*[:#.]?\s*)?\(?\d{3}\)?[\s.-]*\d{3}[\s.-]*\d{4}$")
        .expect("valid regex")
});

const BOILERPLATE: &[&str] = &[
    "confidential",
    "all rights reserved",
    "©",
    "(c) copyright",
    "this document contains private",
    "intended recipient",
];

/// Why a line was dropped, for debug logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    Blank,
    PageMarker,
    Link,
    Phone,
    Boilerplate,
    Debris,
    Duplicate,
}

/// Classify one line; `None` means the line is content.
pub fn classify_line(line: &str, previous: Option<&str>) -> Option<NoiseKind> {
    let line = line.trim();
    if line.is_empty() {
        return Some(NoiseKind::Blank);
    }
    if PAGE_MARKER.is_match(line) {
        return Some(NoiseKind::PageMarker);
    }
    if URL_OR_EMAIL.is_match(line) {
        return Some(NoiseKind::Link);
    }
    if PHONE_LINE.is_match(line) {
        return Some(NoiseKind::Phone);
    }
    let lower = line.to_lowercase();
    if BOILERPLATE.iter().any(|phrase| lower.contains(phrase)) {
        return Some(NoiseKind::Boilerplate);
    }

    let visible = line.chars().filter(|c| !c.is_whitespace()).count();
    let alnum = line.chars().filter(|c| c.is_alphanumeric()).count();
    if alnum == 0 || (alnum as f32 / visible as f32) < MIN_ALNUM_RATIO {
        return Some(NoiseKind::Debris);
    }

    if previous.is_some_and(|prev| prev == line) {
        return Some(NoiseKind::Duplicate);
    }
    None
}

/// Keep content lines, whitespace-collapsed and in original order.
pub fn filter_noise(text: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut dropped = 0usize;

    for raw in text.lines() {
        let line = collapse_whitespace(raw);
        match classify_line(&line, kept.last().map(String::as_str)) {
            Some(kind) => {
                if kind != NoiseKind::Blank {
                    tracing::trace!(?kind, line = %line, "Dropped noise line");
                }
                dropped += 1;
            }
            None => kept.push(line),
        }
    }

    tracing::debug!(kept = kept.len(), dropped, "Generic noise filter applied");
    kept.join("\n")
}
