//! Phone number format parser
//!
//! Recognizes, in order: NANP (`+1-NXX-NXX-XXXX`), UK (`+44-XXXX-XXXXXX`),
//! generic international (`+<cc>-<digits>`), and an unstructured fallback.
//! Parsing never fails; `is_valid == false` marks the generic and
//! unstructured paths, which every technique must handle.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Which recognizer produced a [`PhoneNumberFormat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneKind {
    Nanp,
    Uk,
    International,
    Unstructured,
}

/// Structured form of a phone-like value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumberFormat {
    pub country_code: Option<String>,
    pub area_code: Option<String>,
    pub prefix: Option<String>,
    pub number: Option<String>,
    pub extension: Option<String>,
    pub original: String,
    /// Best-effort canonical display string
    pub formatted: String,
    pub is_valid: bool,
    pub kind: PhoneKind,
}

impl PhoneNumberFormat {
    /// Whether the value has the full NANP structure
    pub fn is_nanp(&self) -> bool {
        self.kind == PhoneKind::Nanp
    }

    /// Number of ASCII digits in the original value
    pub fn digit_count(&self) -> usize {
        self.original.chars().filter(char::is_ascii_digit).count()
    }

    /// Whether any digit was found at all
    pub fn has_digits(&self) -> bool {
        self.original.chars().any(|c| c.is_ascii_digit())
    }
}

/// Parses raw values into [`PhoneNumberFormat`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneParser;

impl PhoneParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw value
    pub fn parse(&self, input: &str) -> PhoneNumberFormat {
        let trimmed = input.trim();
        let (main, extension) = split_extension(trimmed);

        let (international, digits) = significant_digits(main);
        let phone_like = !digits.is_empty()
            && main
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.' | '+' | '/'));

        if phone_like {
            if let Some(format) = parse_nanp(input, &digits, international, extension.as_deref()) {
                return format;
            }
            if let Some(format) = parse_uk(input, &digits, international, extension.as_deref()) {
                return format;
            }
            if international && (8..=15).contains(&digits.len()) {
                let cc_len = country_code_len(&digits);
                let (cc, rest) = digits.split_at(cc_len);
                return PhoneNumberFormat {
                    country_code: Some(cc.to_string()),
                    area_code: None,
                    prefix: None,
                    number: Some(rest.to_string()),
                    extension: extension.clone(),
                    original: input.to_string(),
                    formatted: with_extension(format!("+{cc}-{rest}"), extension.as_deref()),
                    is_valid: false,
                    kind: PhoneKind::International,
                };
            }
        }

        parse_unstructured(input, trimmed, international, &digits, extension)
    }
}

fn extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:ext\.?|extension|x|#)\s*(\d{1,6})\s*$")
            .expect("extension pattern is a valid literal")
    })
}

/// Split a trailing extension (`ext 12`, `x12`, `#12`) off the value
fn split_extension(value: &str) -> (&str, Option<String>) {
    match extension_pattern().captures(value) {
        Some(caps) => {
            let whole = caps.get(0).map_or(value.len(), |m| m.start());
            // Require digits before the marker so "x123" alone is not an extension
            if value[..whole].chars().any(|c| c.is_ascii_digit()) {
                (value[..whole].trim_end(), caps.get(1).map(|m| m.as_str().to_string()))
            } else {
                (value, None)
            }
        }
        None => (value, None),
    }
}

/// Digits of the value with any `+` / `00` international prefix removed
fn significant_digits(main: &str) -> (bool, String) {
    let digits: String = main.chars().filter(char::is_ascii_digit).collect();
    if main.starts_with('+') {
        (true, digits)
    } else if main.starts_with("00") && digits.len() > 2 {
        (true, digits[2..].to_string())
    } else {
        (false, digits)
    }
}

fn parse_nanp(
    original: &str,
    digits: &str,
    international: bool,
    extension: Option<&str>,
) -> Option<PhoneNumberFormat> {
    let national = match digits.len() {
        11 if digits.starts_with('1') => &digits[1..],
        10 if !international => digits,
        _ => return None,
    };

    let bytes = national.as_bytes();
    // NXX-NXX: area code and exchange must not start with 0 or 1
    if !(b'2'..=b'9').contains(&bytes[0]) || !(b'2'..=b'9').contains(&bytes[3]) {
        return None;
    }

    let (area, rest) = national.split_at(3);
    let (prefix, number) = rest.split_at(3);
    Some(PhoneNumberFormat {
        country_code: Some("1".to_string()),
        area_code: Some(area.to_string()),
        prefix: Some(prefix.to_string()),
        number: Some(number.to_string()),
        extension: extension.map(str::to_string),
        original: original.to_string(),
        formatted: with_extension(format!("+1-{area}-{prefix}-{number}"), extension),
        is_valid: true,
        kind: PhoneKind::Nanp,
    })
}

fn parse_uk(
    original: &str,
    digits: &str,
    international: bool,
    extension: Option<&str>,
) -> Option<PhoneNumberFormat> {
    if !international || digits.len() != 12 || !digits.starts_with("44") {
        return None;
    }
    let (area, number) = digits[2..].split_at(4);
    Some(PhoneNumberFormat {
        country_code: Some("44".to_string()),
        area_code: Some(area.to_string()),
        prefix: None,
        number: Some(number.to_string()),
        extension: extension.map(str::to_string),
        original: original.to_string(),
        formatted: with_extension(format!("+44-{area}-{number}"), extension),
        is_valid: true,
        kind: PhoneKind::Uk,
    })
}

fn parse_unstructured(
    original: &str,
    trimmed: &str,
    international: bool,
    digits: &str,
    extension: Option<String>,
) -> PhoneNumberFormat {
    let (country_code, number, formatted) = if digits.is_empty() {
        (None, None, trimmed.to_string())
    } else if international && digits.len() > 3 {
        let (cc, rest) = digits.split_at(country_code_len(digits));
        (
            Some(cc.to_string()),
            Some(rest.to_string()),
            format!("+{cc}-{rest}"),
        )
    } else {
        (None, Some(digits.to_string()), digits.to_string())
    };

    PhoneNumberFormat {
        country_code,
        area_code: None,
        prefix: None,
        number,
        formatted: with_extension(formatted, extension.as_deref()),
        extension,
        original: original.to_string(),
        is_valid: false,
        kind: PhoneKind::Unstructured,
    }
}

fn with_extension(formatted: String, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{formatted} ext. {ext}"),
        None => formatted,
    }
}

/// Length of the ITU country code that prefixes `digits`
fn country_code_len(digits: &str) -> usize {
    let bytes = digits.as_bytes();
    let len = match bytes {
        [] => 0,
        [b'1' | b'7', ..] => 1,
        [_] => 1,
        [first, second, ..] => {
            let three_digit = match first {
                b'2' => !matches!(second, b'0' | b'7'),
                b'3' => matches!(second, b'5' | b'7' | b'8'),
                b'4' => *second == b'2',
                b'5' => matches!(second, b'0' | b'9'),
                b'6' => matches!(second, b'7'..=b'9'),
                b'8' => !matches!(second, b'1' | b'2' | b'4' | b'6'),
                b'9' => matches!(second, b'6' | b'7' | b'9'),
                _ => false,
            };
            if three_digit {
                3
            } else {
                2
            }
        }
    };
    len.min(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("+1-415-555-0100" ; "dashed")]
    #[test_case("+14155550100" ; "compact")]
    #[test_case("(415) 555-0100" ; "domestic parens")]
    #[test_case("1 415 555 0100" ; "spaced with trunk")]
    fn test_nanp_variants(input: &str) {
        let format = PhoneParser::new().parse(input);
        assert!(format.is_valid);
        assert_eq!(format.kind, PhoneKind::Nanp);
        assert_eq!(format.country_code.as_deref(), Some("1"));
        assert_eq!(format.area_code.as_deref(), Some("415"));
        assert_eq!(format.prefix.as_deref(), Some("555"));
        assert_eq!(format.number.as_deref(), Some("0100"));
        assert_eq!(format.formatted, "+1-415-555-0100");
        assert_eq!(format.original, input);
    }

    #[test]
    fn test_nanp_extension() {
        let format = PhoneParser::new().parse("+1 415 555 0100 ext. 42");
        assert!(format.is_nanp());
        assert_eq!(format.extension.as_deref(), Some("42"));
        assert_eq!(format.formatted, "+1-415-555-0100 ext. 42");
    }

    #[test]
    fn test_nanp_rejects_invalid_area_code() {
        let format = PhoneParser::new().parse("+1-015-555-0100");
        assert!(!format.is_nanp());
        assert!(!format.is_valid);
    }

    #[test]
    fn test_uk() {
        let format = PhoneParser::new().parse("+442012345678");
        assert!(format.is_valid);
        assert_eq!(format.kind, PhoneKind::Uk);
        assert_eq!(format.country_code.as_deref(), Some("44"));
        assert_eq!(format.area_code.as_deref(), Some("2012"));
        assert_eq!(format.number.as_deref(), Some("345678"));
        assert_eq!(format.formatted, "+44-2012-345678");
    }

    #[test_case("+33 1 23 45 67 89", "33", "123456789" ; "france")]
    #[test_case("+353 1 234 5678", "353", "12345678" ; "ireland three digit")]
    #[test_case("0049 30 1234567", "49", "301234567" ; "double zero prefix")]
    fn test_international(input: &str, cc: &str, rest: &str) {
        let format = PhoneParser::new().parse(input);
        assert!(!format.is_valid);
        assert_eq!(format.kind, PhoneKind::International);
        assert_eq!(format.country_code.as_deref(), Some(cc));
        assert_eq!(format.number.as_deref(), Some(rest));
    }

    #[test]
    fn test_unstructured_keeps_country_code() {
        let format = PhoneParser::new().parse("+49-12345");
        assert_eq!(format.kind, PhoneKind::Unstructured);
        assert_eq!(format.country_code.as_deref(), Some("49"));
        assert_eq!(format.number.as_deref(), Some("12345"));
    }

    #[test]
    fn test_unparseable_and_empty() {
        let parser = PhoneParser::new();

        let format = parser.parse("call me maybe");
        assert!(!format.is_valid);
        assert!(!format.has_digits());
        assert_eq!(format.formatted, "call me maybe");

        let empty = parser.parse("");
        assert!(!empty.is_valid);
        assert_eq!(empty.formatted, "");
        assert_eq!(empty.digit_count(), 0);
    }

    #[test]
    fn test_country_code_len() {
        assert_eq!(country_code_len("14155550100"), 1);
        assert_eq!(country_code_len("442012345678"), 2);
        assert_eq!(country_code_len("353123"), 3);
        assert_eq!(country_code_len("27123"), 2);
        assert_eq!(country_code_len("9"), 1);
        assert_eq!(country_code_len(""), 0);
    }
}
