//! Quest Diagnostics reports.
//!
//! The same result shows up in three layouts depending on which Quest
//! system rendered the PDF:
//!
//! ```text
//! Glucose 105 H Reference Range: 65-99 mg/dL        single line
//!
//! Glucose                                           two line, with a short
//! 105 H                                             lookahead for range
//! Reference Range: 65-99                            and unit
//! mg/dL
//!
//! GLUCOSE 105 H 65-99 mg/dL EN                      tabular
//! ```

use super::common::{
    contains_label, contains_phrase, count_indicators, explicit_flag, find_labeled_date,
    is_chart_axis_line, is_plausible_name, is_unit_token, looks_like_unit, normalize_range,
    parse_value, resolve_flag, text_lines, DateStyle, FLAG_PATTERN, RANGE_PATTERN,
    VALUE_PATTERN,
};
use super::LabParser;
use crate::error::ExtractError;
use crate::normalize::{clean_ocr_artifacts, normalize_unit};
use crate::record::ResultRecord;
use regex::Regex;
use std::sync::LazyLock;

/// Lines inspected after a two-line value for its range and unit
const LOOKAHEAD_LINES: usize = 4;

static SINGLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<name>[A-Za-z].*?)\s+(?P<value>{VALUE_PATTERN})(?:\s+(?P<flag>{FLAG_PATTERN}))?\s+(?i:reference\s+range):?\s*(?P<range>{RANGE_PATTERN})?(?:\s*(?P<unit>\S.*?))?\s*$"
    ))
    .expect("valid regex")
});

static TABULAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<name>[A-Za-z].*?)\s+(?P<value>{VALUE_PATTERN})(?:\s+(?P<flag>{FLAG_PATTERN}))?\s+(?P<range>{RANGE_PATTERN})(?:\s+(?P<unit>.+?))?(?:\s+[A-Z]{{2,3}})?\s*$"
    ))
    .expect("valid regex")
});

static VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<value>{VALUE_PATTERN})(?:\s+(?P<flag>{FLAG_PATTERN}))?(?:\s+(?P<unit>\S+))?$"
    ))
    .expect("valid regex")
});

static RANGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?i:reference\s+range:?)?\s*(?P<range>{RANGE_PATTERN})(?:\s+(?P<unit>\S.*?))?\s*$"
    ))
    .expect("valid regex")
});

const REJECTED_PHRASES: &[&str] = &[
    "patient", "specimen", "collected", "received", "reported", "requisition", "dob",
    "gender", "client", "page", "comments", "comment", "reference range", "in range",
    "out of range", "test name", "performing", "quest diagnostics", "physician", "account",
    "phone", "fax", "report status",
];

/// Only rejected as labels: "Fasting: Yes", not "GLUCOSE, FASTING"
const REJECTED_LABELS: &[&str] = &["fasting", "lab", "note", "result", "final"];

const DATE_LABELS: &[&str] = &[
    "collection date",
    "date collected",
    "specimen collected",
    "collected",
];

const INDICATORS: &[&[&str]] = &[
    &["quest diagnostics", "questdiagnostics"],
    &["reference range"],
    &["out of range"],
    &["performing site", "performing laboratory"],
    &["specimen:", "requisition"],
    &["client #"],
];

pub struct QuestParser;

impl QuestParser {
    fn is_valid_name(&self, name: &str) -> bool {
        is_plausible_name(name)
            && name.split_whitespace().count() <= 6
            && !is_unit_token(name)
            && !is_chart_axis_line(name)
            && explicit_flag(name).is_none()
            && !contains_phrase(name, REJECTED_PHRASES)
            && !contains_label(name, REJECTED_LABELS)
    }

    fn build(
        &self,
        name: String,
        value: &str,
        flag: Option<&str>,
        range: &str,
        unit: &str,
    ) -> Option<ResultRecord> {
        let value = parse_value(value)?;
        let range = normalize_range(range);

        let mut record = ResultRecord::new(name, Some(value));
        record.flag = resolve_flag(flag, Some(value), &range, false);
        record.unit = normalize_unit(unit);
        record.reference_range = range;
        record.confidence = self.confidence();
        Some(record)
    }

    /// Single-line and tabular layouts
    fn parse_line(&self, line: &str) -> Option<ResultRecord> {
        let caps = SINGLE_LINE
            .captures(line)
            .or_else(|| TABULAR.captures(line))?;

        let name = clean_ocr_artifacts(&caps["name"]);
        if !self.is_valid_name(&name) {
            return None;
        }

        let unit = caps.name("unit").map(|m| m.as_str().trim()).unwrap_or_default();
        if !unit.is_empty() && !first_token_is_unit(unit) {
            return None;
        }

        self.build(
            name,
            &caps["value"],
            caps.name("flag").map(|m| m.as_str()),
            caps.name("range").map(|m| m.as_str()).unwrap_or_default(),
            unit,
        )
    }

    /// Name alone on `lines[0]`, value on `lines[1]`, range and unit somewhere
    /// in the next few lines.
    fn parse_two_line(&self, lines: &[&str]) -> Option<ResultRecord> {
        let [name_line, value_line, following @ ..] = lines else {
            return None;
        };

        let name = clean_ocr_artifacts(name_line);
        if !self.is_valid_name(&name) {
            return None;
        }
        let caps = VALUE_LINE.captures(value_line)?;

        let mut unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .filter(|u| looks_like_unit(u))
            .unwrap_or_default()
            .to_string();
        let mut range = String::new();

        for line in following.iter().take(LOOKAHEAD_LINES) {
            if is_chart_axis_line(line) {
                break;
            }
            if range.is_empty() {
                if let Some(range_caps) = RANGE_LINE.captures(line) {
                    range = range_caps["range"].to_string();
                    if let Some(u) = range_caps.name("unit").map(|m| m.as_str()) {
                        if unit.is_empty() && first_token_is_unit(u) {
                            unit = u.trim().to_string();
                        }
                    }
                    continue;
                }
            }
            if unit.is_empty() && first_token_is_unit(line) {
                unit = line.trim().to_string();
                continue;
            }
            if self.is_valid_name(&clean_ocr_artifacts(line)) {
                break;
            }
            if !range.is_empty() && !unit.is_empty() {
                break;
            }
        }

        self.build(
            name,
            &caps["value"],
            caps.name("flag").map(|m| m.as_str()),
            &range,
            &unit,
        )
    }
}

/// Units can carry a qualifier ("% of total Hgb"), so only the leading token
/// has to be a recognizable unit.
fn first_token_is_unit(text: &str) -> bool {
    let mut tokens = text.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    is_unit_token(first) && tokens.count() <= 3
}

impl LabParser for QuestParser {
    fn name(&self) -> &'static str {
        "Quest Diagnostics"
    }

    fn method_tag(&self) -> &'static str {
        "quest_parser"
    }

    fn confidence(&self) -> f32 {
        0.93
    }

    fn detect(&self, text: &str) -> bool {
        count_indicators(text, INDICATORS) >= 2
    }

    fn parse(&self, text: &str) -> Result<Vec<ResultRecord>, ExtractError> {
        let test_date = find_labeled_date(text, DATE_LABELS, DateStyle::Numeric);
        let lines = text_lines(text);
        let mut records = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            if let Some(record) = self.parse_line(lines[i]) {
                records.push(record);
                i += 1;
            } else if let Some(record) = self.parse_two_line(&lines[i..]) {
                records.push(record);
                i += 2;
            } else {
                i += 1;
            }
        }

        for record in &mut records {
            record.test_date = test_date;
        }

        tracing::debug!(count = records.len(), ?test_date, "quest: parsed results");
        Ok(records)
    }
}
