//! Helpers shared by the lab-specific parsers: numbers, reference ranges,
//! flags, collection dates and the generic half of name validation.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// A measured number as printed, optionally prefixed by an inequality
pub const VALUE_PATTERN: &str = r"[<>]?=?\d[\d,]*(?:\.\d+)?";

/// Reference range shapes: `lo - hi`, `<N`, `<=N`, `>N`, `>=N`, `< OR = N`
pub const RANGE_PATTERN: &str =
    r"(?:\d+(?:\.\d+)?\s*-\s*\d+(?:\.\d+)?|[<>]\s*(?:=|OR\s*=)?\s*\d+(?:\.\d+)?)";

/// Printed abnormal-flag tokens, longest first so `HH` wins over `H`
pub const FLAG_PATTERN: &str = r"(?:High|Low|Critical|Alert|Panic|Abnormal|HH|LL|H|L|A)\b";

const MONTHS: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\b\.?";

const KNOWN_UNITS: &[&str] = &[
    "%", "fl", "pg", "g/dl", "mg/dl", "ug/dl", "mcg/dl", "ng/dl", "g/l", "mg/l", "ug/l",
    "mmol/l", "umol/l", "nmol/l", "pmol/l", "meq/l", "u/l", "iu/l", "ku/l", "miu/l", "uiu/ml",
    "miu/ml", "ng/ml", "pg/ml", "mm/hr", "sec", "seconds", "ratio", "index", "titer",
    "cells/ul", "k/ul", "m/ul", "x10e3/ul", "x10e6/ul", "10*3/ul", "10*6/ul", "thousand/ul",
    "million/ul", "ml/min", "ml/min/1.73", "ml/min/1.73m2", "mosm/kg", "mg/g", "copies/ml",
];

static BOUNDED_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*-\s*(\d+(?:\.\d+)?)$").expect("valid regex")
});

static ONE_SIDED_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([<>])(=?)\s*(\d+(?:\.\d+)?)$").expect("valid regex"));

static OR_EQUAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([<>])\s*OR\s*=\s*").expect("valid regex"));

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{4}|\d{1,2}/\d{1,2}/\d{2}|\d{4}-\d{2}-\d{2})\b")
        .expect("valid regex")
});

static MONTH_NAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({MONTHS}\s+\d{{1,2}},?\s+\d{{4}})\b")).expect("valid regex")
});

static CHART_AXIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:{MONTHS}(?:\s+\d{{1,2}})?(?:,?\s+'?\d{{2,4}})?|\d{{1,2}}/\d{{1,2}}(?:/\d{{2,4}})?|(?:19|20)\d{{2}})(?:\s+.*)?$"
    ))
    .expect("valid regex")
});

static UNIT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:%|[xX]10[Ee^]\d+/[A-Za-zµμ]+|10\*\d+/[A-Za-zµμ]+|[A-Za-zµμ][A-Za-z0-9µμ/.^*%()]*)$",
    )
    .expect("valid regex")
});

/// Range-derived or explicit abnormal flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    High,
    Low,
    Critical,
    /// Printed as "A"/"Abnormal": direction must come from the range
    Abnormal,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::High => "High",
            Flag::Low => "Low",
            Flag::Critical => "Critical",
            Flag::Abnormal => "",
        }
    }
}

/// Parsed shape of a reference range string
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeShape {
    Bounded { low: f64, high: f64 },
    /// `<N` (exclusive) or `<=N` (inclusive)
    Below { limit: f64, inclusive: bool },
    /// `>N` (exclusive) or `>=N` (inclusive)
    Above { limit: f64, inclusive: bool },
}

/// Parse a printed value, ignoring thousands separators and inequality prefixes.
pub fn parse_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['<', '>', '='])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Canonical text form of a printed range: Quest's `< OR = N` becomes `<=N`,
/// whitespace collapses, everything else stays as printed.
pub fn normalize_range(raw: &str) -> String {
    let joined = OR_EQUAL.replace_all(raw.trim(), "$1=").into_owned();
    let collapsed = crate::normalize::collapse_whitespace(&joined);
    match ONE_SIDED_RANGE.captures(&collapsed) {
        Some(caps) => format!("{}{}{}", &caps[1], &caps[2], &caps[3]),
        None => collapsed,
    }
}

pub fn parse_range(range: &str) -> Option<RangeShape> {
    let range = normalize_range(range);
    if let Some(caps) = BOUNDED_RANGE.captures(&range) {
        let a: f64 = caps[1].parse().ok()?;
        let b: f64 = caps[2].parse().ok()?;
        return Some(RangeShape::Bounded {
            low: a.min(b),
            high: a.max(b),
        });
    }
    let caps = ONE_SIDED_RANGE.captures(&range)?;
    let limit: f64 = caps[3].parse().ok()?;
    let inclusive = !caps[2].is_empty();
    match &caps[1] {
        "<" => Some(RangeShape::Below { limit, inclusive }),
        _ => Some(RangeShape::Above { limit, inclusive }),
    }
}

/// Derive "High"/"Low"/"" by comparing a value against a printed range.
///
/// Unknown range shapes yield an empty flag.
pub fn derive_flag(value: f64, range: &str) -> &'static str {
    match parse_range(range) {
        Some(RangeShape::Bounded { low, high }) => {
            if value < low {
                "Low"
            } else if value > high {
                "High"
            } else {
                ""
            }
        }
        Some(RangeShape::Below { limit, inclusive }) => {
            let high = if inclusive { value > limit } else { value >= limit };
            if high {
                "High"
            } else {
                ""
            }
        }
        Some(RangeShape::Above { limit, inclusive }) => {
            let low = if inclusive { value < limit } else { value <= limit };
            if low {
                "Low"
            } else {
                ""
            }
        }
        None => "",
    }
}

/// Map a printed flag token onto the flag vocabulary.
pub fn explicit_flag(token: &str) -> Option<Flag> {
    match token.trim().trim_end_matches('!').to_ascii_uppercase().as_str() {
        "H" | "HI" | "HIGH" => Some(Flag::High),
        "L" | "LO" | "LOW" => Some(Flag::Low),
        "HH" | "LL" | "CRIT" | "CRITICAL" | "ALERT" | "PANIC" | "C" => Some(Flag::Critical),
        "A" | "ABN" | "ABNORMAL" => Some(Flag::Abnormal),
        _ => None,
    }
}

/// Resolve the final flag for a record.
///
/// Explicit High/Low/Critical tokens win. An ambiguous "Abnormal" token is
/// resolved from the range; a missing token is derived only when the source
/// format never prints flags.
pub fn resolve_flag(
    token: Option<&str>,
    value: Option<f64>,
    range: &str,
    derive_when_missing: bool,
) -> String {
    let derived = || value.map(|v| derive_flag(v, range)).unwrap_or_default();
    match token.and_then(explicit_flag) {
        Some(Flag::Abnormal) => derived().to_string(),
        Some(flag) => flag.as_str().to_string(),
        None if derive_when_missing => derived().to_string(),
        None => String::new(),
    }
}

/// Parse one date candidate in any of the supported printed formats.
pub fn parse_date(candidate: &str) -> Option<NaiveDate> {
    let candidate = candidate.trim();
    if candidate.contains('/') {
        // `%Y` would happily read "24" as year 24
        let short_year = candidate.rsplit('/').next().is_some_and(|y| y.len() == 2);
        let format = if short_year { "%m/%d/%y" } else { "%m/%d/%Y" };
        return NaiveDate::parse_from_str(candidate, format).ok();
    }
    if let Ok(date) = NaiveDate::parse_from_str(candidate, "%Y-%m-%d") {
        return Some(date);
    }

    // Month-name dates: "Jan. 15, 2024", "Sept 3 2023", "January 15, 2024"
    let words: Vec<String> = candidate
        .replace([',', '.'], " ")
        .split_whitespace()
        .map(|w| if w.eq_ignore_ascii_case("sept") { "Sep".to_string() } else { w.to_string() })
        .collect();
    let normalized = words.join(" ");
    ["%b %d %Y", "%B %d %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
}

/// Which printed date styles a parser accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    Numeric,
    NumericOrMonthName,
}

/// Find the first date printed after one of `labels` (case-insensitive).
pub fn find_labeled_date(text: &str, labels: &[&str], style: DateStyle) -> Option<NaiveDate> {
    let patterns: Vec<Regex> = labels
        .iter()
        .filter_map(|label| Regex::new(&format!("(?i){}", regex::escape(label))).ok())
        .collect();

    for line in text.lines() {
        for pattern in &patterns {
            let Some(label) = pattern.find(line) else {
                continue;
            };
            if let Some(date) = first_date_in(&line[label.end()..], style) {
                return Some(date);
            }
        }
    }
    None
}

fn first_date_in(fragment: &str, style: DateStyle) -> Option<NaiveDate> {
    let numeric = NUMERIC_DATE
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()));
    let named = match style {
        DateStyle::NumericOrMonthName => MONTH_NAME_DATE
            .captures(fragment)
            .and_then(|caps| caps.get(1))
            .map(|m| (m.start(), m.as_str())),
        DateStyle::Numeric => None,
    };

    // Earliest candidate after the label wins
    let mut candidates: Vec<(usize, &str)> = numeric.into_iter().chain(named).collect();
    candidates.sort_by_key(|(start, _)| *start);
    candidates.into_iter().find_map(|(_, c)| parse_date(c))
}

/// Date or month token lines: the axis labels of embedded trend charts
pub fn is_chart_axis_line(line: &str) -> bool {
    CHART_AXIS.is_match(line.trim())
}

pub fn looks_like_unit(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty()
        && token.len() <= 24
        && UNIT_TOKEN.is_match(token)
        && explicit_flag(token).is_none()
}

/// Strict unit check for a line or token standing on its own.
///
/// Unlike [`looks_like_unit`], a bare word only counts when it is a known unit.
pub fn is_unit_token(token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return false;
    }
    let lower = token.to_lowercase();
    KNOWN_UNITS.contains(&lower.as_str())
        || (token.contains('/') && looks_like_unit(token))
        || crate::normalize::normalize_unit(token) != token
}

/// Trimmed, non-empty lines in document order
pub fn text_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Rejections every lab's name validator starts from: empty or numeric
/// strings, prose, labelled fields, URLs and dates.
pub fn is_plausible_name(name: &str) -> bool {
    let name = name.trim();
    let letters = name.chars().filter(|c| c.is_alphabetic()).count();
    if letters < 2 || name.chars().count() > 60 {
        return false;
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    if name.split_whitespace().count() > 7 {
        return false;
    }
    if name.ends_with(':') || name.contains(": ") || name.ends_with('.') {
        return false;
    }
    let lower = name.to_lowercase();
    if lower.contains("http") || lower.contains("www.") || lower.contains('@') {
        return false;
    }
    if NUMERIC_DATE.is_match(name) || MONTH_NAME_DATE.is_match(name) {
        return false;
    }
    true
}

/// Whole-word, case-insensitive check against a vocabulary of phrases
pub fn contains_phrase(haystack: &str, phrases: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    phrases
        .iter()
        .any(|phrase| word_match_ends(&lower, phrase).next().is_some())
}

/// Like [`contains_phrase`], but a word only counts when it is used as a
/// label: followed by `:` or `#`, or standing alone ("Age:", "Lab #",
/// "Fasting"). "Sex Hormone Binding Globulin" and "GLUCOSE, FASTING" pass.
pub fn contains_label(haystack: &str, labels: &[&str]) -> bool {
    let lower = haystack.trim().to_lowercase();
    labels.iter().any(|label| {
        lower == *label
            || word_match_ends(&lower, label)
                .any(|end| lower[end..].trim_start().starts_with([':', '#']))
    })
}

/// End offsets of the whole-word occurrences of `word` in `lower`
fn word_match_ends<'a>(lower: &'a str, word: &'a str) -> impl Iterator<Item = usize> + 'a {
    lower.match_indices(word).filter_map(move |(start, _)| {
        let end = start + word.len();
        let before_ok = lower[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = lower[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        (before_ok && after_ok).then_some(end)
    })
}

/// Count how many of the given indicator groups occur in `text`.
/// Each group counts at most once.
pub fn count_indicators(text: &str, groups: &[&[&str]]) -> usize {
    let lower = text.to_lowercase();
    groups
        .iter()
        .filter(|group| group.iter().any(|needle| lower.contains(needle)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_variants() {
        assert_eq!(parse_value("6.2"), Some(6.2));
        assert_eq!(parse_value("1,234"), Some(1234.0));
        assert_eq!(parse_value(">59"), Some(59.0));
        assert_eq!(parse_value("<=0.5"), Some(0.5));
        assert_eq!(parse_value("Negative"), None);
    }

    #[test]
    fn test_derive_flag_bounded() {
        assert_eq!(derive_flag(0.4, "0.50 - 0.90"), "Low");
        assert_eq!(derive_flag(1.2, "0.50 - 0.90"), "High");
        assert_eq!(derive_flag(0.72, "0.50 - 0.90"), "");
        assert_eq!(derive_flag(0.50, "0.50 - 0.90"), "");
        assert_eq!(derive_flag(0.90, "0.50-0.90"), "");
    }

    #[test]
    fn test_derive_flag_one_sided() {
        assert_eq!(derive_flag(59.0, ">=60"), "Low");
        assert_eq!(derive_flag(60.0, ">=60"), "");
        assert_eq!(derive_flag(200.0, "<200"), "High");
        assert_eq!(derive_flag(199.9, "<200"), "");
        assert_eq!(derive_flag(5.6, "< OR = 5.6"), "");
        assert_eq!(derive_flag(5.7, "< OR = 5.6"), "High");
        assert_eq!(derive_flag(59.0, ">59"), "Low");
    }

    #[test]
    fn test_derive_flag_degenerate_and_unknown() {
        assert_eq!(derive_flag(1.0, "1.0 - 1.0"), "");
        assert_eq!(derive_flag(0.9, "1.0 - 1.0"), "Low");
        assert_eq!(derive_flag(1.1, "1.0 - 1.0"), "High");
        assert_eq!(derive_flag(3.0, "Negative"), "");
        assert_eq!(derive_flag(3.0, ""), "");
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range("< OR = 5.6"), "<=5.6");
        assert_eq!(normalize_range("> OR = 60"), ">=60");
        assert_eq!(normalize_range("> 59"), ">59");
        assert_eq!(normalize_range("0.50 -  0.90"), "0.50 - 0.90");
        assert_eq!(normalize_range("3.4-10.8"), "3.4-10.8");
    }

    #[test]
    fn test_resolve_flag() {
        assert_eq!(resolve_flag(Some("H"), Some(10.0), "1-5", false), "High");
        assert_eq!(resolve_flag(Some("Alert"), Some(10.0), "1-5", false), "Critical");
        assert_eq!(resolve_flag(Some("A"), Some(0.5), "1-5", false), "Low");
        assert_eq!(resolve_flag(None, Some(10.0), "1-5", false), "");
        assert_eq!(resolve_flag(None, Some(10.0), "1-5", true), "High");
        assert_eq!(resolve_flag(None, None, "1-5", true), "");
    }

    #[test]
    fn test_find_labeled_date_formats() {
        let text = "Patient: DOE, JANE\nDate Collected: 11/23/2022 0830 Local\n";
        assert_eq!(
            find_labeled_date(text, &["date collected"], DateStyle::Numeric),
            NaiveDate::from_ymd_opt(2022, 11, 23)
        );

        let text = "Collected on Jan 15, 2024 8:30 AM";
        assert_eq!(
            find_labeled_date(text, &["collected on"], DateStyle::NumericOrMonthName),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            find_labeled_date(text, &["collected on"], DateStyle::Numeric),
            None
        );

        let text = "Collection Date: 2024-03-05";
        assert_eq!(
            find_labeled_date(text, &["collection date"], DateStyle::Numeric),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn test_parse_month_name_dates() {
        assert_eq!(parse_date("Sept 3, 2023"), NaiveDate::from_ymd_opt(2023, 9, 3));
        assert_eq!(parse_date("January 15, 2024"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parse_date("Feb. 2, 2021"), NaiveDate::from_ymd_opt(2021, 2, 2));
    }

    #[test]
    fn test_chart_axis_lines() {
        assert!(is_chart_axis_line("Jan 2023"));
        assert!(is_chart_axis_line("Mar 15"));
        assert!(is_chart_axis_line("01/15/2024"));
        assert!(is_chart_axis_line("2023"));
        assert!(!is_chart_axis_line("Glucose"));
        assert!(!is_chart_axis_line("mg/dL"));
        assert!(!is_chart_axis_line("Marijuana Metabolite"));
        assert!(!is_chart_axis_line("Febrile Agglutinins"));
    }

    #[test]
    fn test_units() {
        for unit in ["mg/dL", "x10E3/uL", "%", "mL/min/1.73", "10*3/uL", "IU/L", "fL"] {
            assert!(looks_like_unit(unit), "{unit} should look like a unit");
        }
        assert!(!looks_like_unit("65-99"));
        assert!(!looks_like_unit("H"));
        assert!(!looks_like_unit(""));
    }

    #[test]
    fn test_strict_units() {
        assert!(is_unit_token("mg/dL"));
        assert!(is_unit_token("fL"));
        assert!(is_unit_token("xlOE3/uL"));
        assert!(!is_unit_token("Glucose"));
        assert!(!is_unit_token("mg / dL extra"));
    }

    #[test]
    fn test_plausible_names() {
        assert!(is_plausible_name("Glucose"));
        assert!(is_plausible_name("BUN/Creatinine Ratio"));
        assert!(!is_plausible_name("12345"));
        assert!(!is_plausible_name("Date Collected: 11/23/2022"));
        assert!(!is_plausible_name(
            "This test was performed using a kit that has not been cleared."
        ));
        assert!(!is_plausible_name("www.labcorp.com"));
    }

    #[test]
    fn test_contains_phrase_is_whole_word() {
        assert!(contains_phrase("Patient Details", &["patient"]));
        assert!(!contains_phrase("Inpatient", &["patient"]));
    }

    #[test]
    fn test_label_words_only_reject_labels() {
        let labels = ["sex", "age", "fasting", "lab"];
        assert!(contains_label("Sex: M", &labels));
        assert!(contains_label("Age : 54", &labels));
        assert!(contains_label("Lab #", &labels));
        assert!(contains_label("Fasting", &labels));
        assert!(!contains_label("Sex Hormone Binding Globulin", &labels));
        assert!(!contains_label("GLUCOSE, FASTING", &labels));
        assert!(!contains_label("Average Glucose", &labels));
    }

    #[test]
    fn test_labeled_date_after_case_changing_characters() {
        // 'İ' lowercases to a longer byte sequence than it occupies
        let text = "İİİ Collected 03/05/2024";
        assert_eq!(
            find_labeled_date(text, &["collected"], DateStyle::Numeric),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }
}
