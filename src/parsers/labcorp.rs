//! LabCorp patient reports.
//!
//! One physical line per test:
//!
//! ```text
//! Hemoglobin 01 12.9 Low 13.5 11/23/2022 g/dL 13.0-17.7
//! ^name      ^fn ^value ^flag ^previous+date ^unit ^reference interval
//! ```
//!
//! The footnote marker is optional, the previous result is optional, and the
//! reports are frequently scanned, so names go through OCR cleanup before the
//! strict name check.

use super::common::{
    contains_label, contains_phrase, count_indicators, find_labeled_date, is_plausible_name,
    looks_like_unit, normalize_range, parse_value, resolve_flag, text_lines, DateStyle,
    FLAG_PATTERN, RANGE_PATTERN, VALUE_PATTERN,
};
use super::LabParser;
use crate::error::ExtractError;
use crate::normalize::{clean_ocr_artifacts, normalize_unit};
use crate::record::ResultRecord;
use regex::Regex;
use std::sync::LazyLock;

static LINE_WITH_FOOTNOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<name>[^\d\s].*?)\s+(?P<note>0[1-9])\s+(?P<value>{VALUE_PATTERN})(?:\s+(?P<flag>{FLAG_PATTERN}))?(?:\s+(?P<rest>.*))?$"
    ))
    .expect("valid regex")
});

static LINE_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<name>[^\d\s].*?)\s+(?P<value>{VALUE_PATTERN})(?:\s+(?P<flag>{FLAG_PATTERN}))?(?:\s+(?P<rest>.*))?$"
    ))
    .expect("valid regex")
});

/// Previous result (with optional flag) and its date, at the start of the remainder
static PREVIOUS_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?:{VALUE_PATTERN}\s+(?:{FLAG_PATTERN}\s+)?)?\d{{1,2}}/\d{{1,2}}/\d{{2,4}}\s*"
    ))
    .expect("valid regex")
});

/// `[unit] range [lab code]`
static UNIT_AND_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?:(?P<unit>\S+)\s+)?(?P<range>{RANGE_PATTERN})(?:\s+\d{{2}})?\s*$"
    ))
    .expect("valid regex")
});

/// `unit [lab code]` when no interval is printed
static UNIT_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<unit>\S+)(?:\s+\d{2})?\s*$").expect("valid regex"));

/// Header and footer vocabulary that never appears in a test name
const REJECTED_PHRASES: &[&str] = &[
    "patient", "specimen", "control id", "acct", "account", "phone", "fax", "physician",
    "dob", "page", "ordered", "reference interval", "previous", "comment", "comments",
    "please", "labcorp", "laboratory corporation", "issued", "received", "reported",
    "entered", "collected", "npi", "branch", "inquiries", "confidential", "final report",
    "address",
];

/// Words that are also parts of real analyte names ("Sex Hormone Binding
/// Globulin"), rejected only when used as a field label
const REJECTED_LABELS: &[&str] = &[
    "date", "tests", "result", "units", "flag", "dir", "age", "sex",
];

const DATE_LABELS: &[&str] = &["date collected", "collected"];

/// Indicator groups; each counts once
const INDICATORS: &[&[&str]] = &[
    &["labcorp", "laboratory corporation of america"],
    &["specimen id"],
    &["control id"],
    &["previous result and date"],
    &["reference interval"],
    &["date collected"],
    &["acct #"],
];

pub struct LabCorpParser;

impl LabCorpParser {
    fn parse_line(&self, line: &str) -> Option<ResultRecord> {
        let caps = LINE_WITH_FOOTNOTE
            .captures(line)
            .filter(|caps| self.is_valid_name(&clean_ocr_artifacts(&caps["name"])))
            .or_else(|| LINE_PLAIN.captures(line))?;

        let name = clean_ocr_artifacts(&caps["name"]);
        if !self.is_valid_name(&name) {
            return None;
        }

        let value = parse_value(&caps["value"])?;
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();
        let (unit, range) = scan_remainder(rest)?;
        let flag_token = caps.name("flag").map(|m| m.as_str());

        let mut record = ResultRecord::new(name, Some(value));
        record.flag = resolve_flag(flag_token, Some(value), &range, false);
        record.unit = unit;
        record.reference_range = range;
        record.confidence = self.confidence();
        Some(record)
    }

    fn is_valid_name(&self, name: &str) -> bool {
        is_plausible_name(name)
            && name.split_whitespace().count() <= 6
            && !contains_phrase(name, REJECTED_PHRASES)
            && !contains_label(name, REJECTED_LABELS)
            && !name.contains(';')
    }
}

/// Split what follows the current value into unit and interval.
///
/// Returns `None` when the remainder holds anything the layout does not
/// explain, which is how prose with a number in it gets rejected.
fn scan_remainder(rest: &str) -> Option<(String, String)> {
    let rest = PREVIOUS_RESULT.replace(rest.trim(), "");
    let rest = rest.trim();
    if rest.is_empty() {
        return Some((String::new(), String::new()));
    }

    if let Some(caps) = UNIT_AND_RANGE.captures(rest) {
        let unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .filter(|u| looks_like_unit(u))
            .map(normalize_unit);
        // A token that is neither unit nor range is unexplained
        if caps.name("unit").is_some() && unit.is_none() {
            return None;
        }
        return Some((unit.unwrap_or_default(), normalize_range(&caps["range"])));
    }

    let caps = UNIT_ONLY.captures(rest)?;
    let unit = &caps["unit"];
    looks_like_unit(unit).then(|| (normalize_unit(unit), String::new()))
}

impl LabParser for LabCorpParser {
    fn name(&self) -> &'static str {
        "LabCorp"
    }

    fn method_tag(&self) -> &'static str {
        "labcorp_parser"
    }

    fn confidence(&self) -> f32 {
        0.95
    }

    fn detect(&self, text: &str) -> bool {
        count_indicators(text, INDICATORS) >= 2
    }

    fn parse(&self, text: &str) -> Result<Vec<ResultRecord>, ExtractError> {
        let test_date = find_labeled_date(text, DATE_LABELS, DateStyle::Numeric);

        let records: Vec<ResultRecord> = text_lines(text)
            .into_iter()
            .filter_map(|line| {
                let record = self.parse_line(line);
                if record.is_none() {
                    tracing::trace!(line, "labcorp: line rejected");
                }
                record
            })
            .map(|mut record| {
                record.test_date = test_date;
                record
            })
            .collect();

        tracing::debug!(count = records.len(), ?test_date, "labcorp: parsed results");
        Ok(records)
    }
}
