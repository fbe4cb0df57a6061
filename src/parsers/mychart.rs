//! MyChart patient-portal result exports.
//!
//! There is no table to align on. Every result is a card anchored by a
//! `Normal range:` line; the test name sits a line or three above it and the
//! measured value a few lines below, often after the gauge's two endpoint
//! labels:
//!
//! ```text
//! Creatinine Level
//! Normal range: 0.50 - 0.90 mg/dL
//! 0.50   0.90
//! 0.72
//! ```
//!
//! The portal never prints a flag as text, so flags are always derived.

use super::common::{
    contains_phrase, count_indicators, explicit_flag, find_labeled_date, is_chart_axis_line,
    is_plausible_name, is_unit_token, looks_like_unit, normalize_range, parse_range,
    parse_value, resolve_flag, text_lines, DateStyle, RangeShape, RANGE_PATTERN, VALUE_PATTERN,
};
use super::LabParser;
use crate::error::ExtractError;
use crate::normalize::{clean_ocr_artifacts, normalize_unit};
use crate::record::ResultRecord;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const NAME_LOOKBEHIND: usize = 3;
const VALUE_LOOKAHEAD: usize = 5;

static NORMAL_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^normal\s+range:?\s*(?P<range>{RANGE_PATTERN})?\s*(?P<unit>.*?)\s*$"
    ))
    .expect("valid regex")
});

static SINGLE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?P<value>{VALUE_PATTERN})(?:\s+(?P<unit>\S+))?$")).expect("valid regex")
});

static TWO_NUMBERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?P<a>{VALUE_PATTERN})\s+(?P<b>{VALUE_PATTERN})$")).expect("valid regex")
});

const REJECTED_PHRASES: &[&str] = &[
    "mychart", "normal range", "collected", "collected on", "result date", "resulted",
    "results", "result", "component", "your value", "standard range", "value", "range",
    "view trends", "about this test", "ordered by", "lab", "patient", "page", "provider",
    "comment", "comments", "narrative", "status", "final",
];

const DATE_LABELS: &[&str] = &["collected on", "specimen collected", "collected", "result date"];

const INDICATORS: &[&[&str]] = &[
    &["mychart"],
    &["normal range:"],
    &["collected on"],
    &["result date", "resulted:"],
    &["view trends", "about this test"],
];

pub struct MyChartParser;

impl MyChartParser {
    /// Title-case heuristic: rejects all-caps section headers ("RESULTS",
    /// "COMPREHENSIVE METABOLIC PANEL") but keeps short acronyms like "WBC".
    fn is_valid_name(&self, name: &str) -> bool {
        if !is_plausible_name(name)
            || name.split_whitespace().count() > 6
            || is_unit_token(name)
            || is_chart_axis_line(name)
            || explicit_flag(name).is_some()
            || contains_phrase(name, REJECTED_PHRASES)
        {
            return false;
        }

        let letters: Vec<char> = name.chars().filter(|c| c.is_alphabetic()).collect();
        let all_caps = letters.iter().all(|c| c.is_uppercase());
        if all_caps && (letters.len() > 5 || name.split_whitespace().count() > 1) {
            return false;
        }

        name.split_whitespace()
            .next()
            .is_some_and(|first| first.chars().any(|c| c.is_uppercase()))
    }

    fn find_name(&self, lines: &[&str], anchor: usize) -> Option<String> {
        (1..=NAME_LOOKBEHIND)
            .filter_map(|back| anchor.checked_sub(back))
            .map(|i| lines[i])
            .take_while(|line| !NORMAL_RANGE.is_match(line))
            .map(clean_ocr_artifacts)
            .find(|candidate| self.is_valid_name(candidate))
    }

    /// First single number below the anchor that is not a gauge label
    fn find_value(
        &self,
        lines: &[&str],
        anchor: usize,
        shape: Option<RangeShape>,
    ) -> Option<(f64, String)> {
        let bounds = match shape {
            Some(RangeShape::Bounded { low, high }) => Some((low, high)),
            _ => None,
        };
        let is_bound = |v: f64| bounds.is_some_and(|(low, high)| v == low || v == high);

        for line in lines.iter().skip(anchor + 1).take(VALUE_LOOKAHEAD) {
            if NORMAL_RANGE.is_match(line) {
                break;
            }
            // Gauge endpoint labels; a lone pair of numbers is never the value
            if let Some(caps) = TWO_NUMBERS.captures(line) {
                let endpoints = [&caps["a"], &caps["b"]]
                    .into_iter()
                    .filter_map(parse_value)
                    .any(is_bound);
                tracing::trace!(line, endpoints, "mychart: skipped two-number line");
                continue;
            }
            if let Some(caps) = SINGLE_VALUE.captures(line) {
                let Some(value) = parse_value(&caps["value"]) else {
                    continue;
                };
                if is_bound(value) {
                    continue;
                }
                let unit = caps
                    .name("unit")
                    .map(|m| m.as_str())
                    .filter(|u| looks_like_unit(u))
                    .map(normalize_unit)
                    .unwrap_or_default();
                return Some((value, unit));
            }
            let cleaned = clean_ocr_artifacts(line);
            if explicit_flag(&cleaned).is_none()
                && !is_chart_axis_line(&cleaned)
                && self.is_valid_name(&cleaned)
            {
                // Next card's title: this card printed no value
                break;
            }
        }
        None
    }

    fn parse_card(&self, lines: &[&str], anchor: usize) -> Option<ResultRecord> {
        let caps = NORMAL_RANGE.captures(lines[anchor])?;
        let range = caps
            .name("range")
            .map(|m| normalize_range(m.as_str()))
            .unwrap_or_default();
        // Without a parsable range the trailing text is prose ("Negative"), not a unit
        let mut unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .filter(|u| !range.is_empty() && looks_like_unit(u))
            .map(normalize_unit)
            .unwrap_or_default();

        let name = self.find_name(lines, anchor)?;
        let (value, value_unit) = self.find_value(lines, anchor, parse_range(&range))?;
        if unit.is_empty() {
            unit = value_unit;
        }

        let mut record = ResultRecord::new(name, Some(value));
        record.flag = resolve_flag(None, Some(value), &range, true);
        record.unit = unit;
        record.reference_range = range;
        record.confidence = self.confidence();
        Some(record)
    }
}

impl LabParser for MyChartParser {
    fn name(&self) -> &'static str {
        "MyChart"
    }

    fn method_tag(&self) -> &'static str {
        "mychart_parser"
    }

    fn confidence(&self) -> f32 {
        0.92
    }

    fn detect(&self, text: &str) -> bool {
        count_indicators(text, INDICATORS) >= 2
    }

    fn parse(&self, text: &str) -> Result<Vec<ResultRecord>, ExtractError> {
        let test_date = find_labeled_date(text, DATE_LABELS, DateStyle::NumericOrMonthName);
        let lines = text_lines(text);

        // Cards can be re-emitted across a page break
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for anchor in 0..lines.len() {
            if !NORMAL_RANGE.is_match(lines[anchor]) {
                continue;
            }
            let Some(mut record) = self.parse_card(&lines, anchor) else {
                tracing::debug!(line = lines[anchor], "mychart: card without name or value");
                continue;
            };
            if !seen.insert(record.test_name.to_lowercase()) {
                continue;
            }
            record.test_date = test_date;
            records.push(record);
        }

        tracing::debug!(count = records.len(), ?test_date, "mychart: parsed results");
        Ok(records)
    }
}
