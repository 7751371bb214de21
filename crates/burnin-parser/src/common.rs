use chrono::NaiveDateTime;

/// Accepted civil timestamp formats. Field equipment writes the underscore
/// form into results files; older firmware used colons and a space.
static FORMATS: &[&str] = &[
    "%Y-%m-%d_%H-%M-%S",
    "%Y-%m-%d %H-%M-%S",
    "%Y-%m-%d %H:%M:%S",
];

pub fn parse_civil_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Blank or unparsable numeric fields become None. Measurement gaps are
/// common and must not be conflated with zero readings.
pub(crate) fn parse_optional_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

pub(crate) fn parse_optional_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Status bitfields show up both as plain decimal and as 0x-prefixed hex.
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse::<i64>().ok()
}

pub(crate) fn clean_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("n/a"))
        .map(|v| v.to_string())
}
