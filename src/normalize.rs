//! OCR artifact cleanup for candidate test names and units.
//!
//! Every transform here is pure and stateless. Parsers run candidate names
//! through [`clean_ocr_artifacts`] before validating them; the aggressive
//! variant is only used when a caller asks for it explicitly.

use regex::Regex;
use std::sync::LazyLock;

/// Quote-like marks the recognizer leaves behind next to glyph edges
const QUOTE_CHARS: &[char] = &['"', '\'', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

/// "N" read as "IV" / "lV" at the start of a name ("IVeutrophils")
static MISREAD_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:IV|lV)([a-z])").expect("valid regex"));

/// "Im" read as "lm", "Irn" or "lrn" at a word start ("lmmature Granulocytes")
static MISREAD_IM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:lm|Irn|lrn)([a-z])").expect("valid regex"));

static TRAILING_INEQUALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[<>]=?\s*$").expect("valid regex"));

static TRAILING_FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{2}$").expect("valid regex"));

static REPEATED_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static ANY_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\u{00A0}\u{2007}\u{202F}]+").expect("valid regex"));

/// Count-unit tokens such as `x10E3/uL`, tolerating l/I/| for 1 and o/O for 0
static COUNT_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([xX×])([0-9lI|oO]{2})(\^?)([eE])([0-9lI|oO]{1,2})(/\S+)?$")
        .expect("valid regex")
});

/// Standard cleanup applied to every candidate test name.
pub fn clean_ocr_artifacts(input: &str) -> String {
    let mut text = input.trim().to_string();

    if let Some(rest) = text.strip_prefix('^') {
        text = rest.trim_start().to_string();
    }

    text = MISREAD_N.replace(&text, "N$1").into_owned();
    text = MISREAD_IM.replace_all(&text, "Im$1").into_owned();
    text = REPEATED_SPACE.replace_all(&text, " ").into_owned();

    // Trailing artifacts can be stacked (`WBC" 01`), strip until stable
    loop {
        let before = text.len();
        text = text.trim_end_matches(QUOTE_CHARS).trim_end().to_string();
        text = TRAILING_FOOTNOTE.replace(&text, "").into_owned();
        text = TRAILING_INEQUALITY.replace(&text, "").into_owned();
        if text.len() == before {
            break;
        }
    }

    text.trim().to_string()
}

/// Aggressive cleanup: standard cleanup plus removal of every quote mark and
/// collapsing of all whitespace runs (including non-breaking and zero-width).
pub fn clean_ocr_artifacts_aggressive(input: &str) -> String {
    let without_zero_width: String = input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
        .collect();
    let standard = clean_ocr_artifacts(&without_zero_width);
    let unquoted: String = standard.chars().filter(|c| !QUOTE_CHARS.contains(c)).collect();
    ANY_WHITESPACE.replace_all(unquoted.trim(), " ").into_owned()
}

/// Collapse every whitespace run into a single space.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Repair OCR-garbled count units (`xlOE3/uL` -> `x10E3/uL`).
///
/// Anything that does not look like a count unit is returned trimmed and
/// otherwise untouched.
pub fn normalize_unit(unit: &str) -> String {
    let unit = unit.trim().trim_end_matches(QUOTE_CHARS);
    let Some(caps) = COUNT_UNIT.captures(unit) else {
        return unit.to_string();
    };

    let digits = |s: &str| -> String {
        s.chars()
            .map(|c| match c {
                'l' | 'I' | '|' => '1',
                'o' | 'O' => '0',
                other => other,
            })
            .collect()
    };

    format!(
        "x{}{}E{}{}",
        digits(&caps[2]),
        &caps[3],
        digits(&caps[5]),
        caps.get(6).map(|m| m.as_str()).unwrap_or_default()
    )
}
