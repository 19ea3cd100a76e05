use thiserror::Error;

/// Errors from converting a capacity string to bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid capacity number: `{0}`")]
    InvalidNumber(String),
    #[error("unknown capacity unit: `{0}`")]
    UnknownUnit(String),
    #[error("capacity out of range: `{0}`")]
    OutOfRange(String),
}

const BINARY_UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
const DECIMAL_UNITS: &[&str] = &["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Parse a human-readable capacity string into bytes.
///
/// Supported examples:
/// - `500GiB`, `2TiB`, `0.5 PiB`
/// - `100TB` (decimal units)
/// - `1024` (plain bytes)
///
/// Unit matching happens after the wire notation's case normalization, which
/// folds exactly `t`/`b`/`p` to upper case and `I` to lower case. `tib`, `TIB`
/// and `TiB` all parse; `gib` does not.
pub fn parse_to_bytes(input: &str) -> Result<u64, ParseError> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            't' => 'T',
            'b' => 'B',
            'p' => 'P',
            'I' => 'i',
            c => c,
        })
        .collect();

    // Two-step scan: numeric mantissa up to the first letter, unit suffix after.
    let mut split_idx = None;
    for (idx, ch) in normalized.char_indices() {
        if ch.is_ascii_alphabetic() {
            split_idx = Some(idx);
            break;
        }
    }

    let (number_str, unit_str) = match split_idx {
        Some(idx) => (&normalized[..idx], &normalized[idx..]),
        None => (normalized.as_str(), ""),
    };

    let number = number_str
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(number_str.to_string()))?;
    if !number.is_finite() || number < 0.0 {
        return Err(ParseError::InvalidNumber(number_str.to_string()));
    }

    let multiplier = unit_multiplier(unit_str)
        .ok_or_else(|| ParseError::UnknownUnit(unit_str.to_string()))?;

    let bytes = number * multiplier;
    if bytes > u64::MAX as f64 {
        return Err(ParseError::OutOfRange(normalized));
    }

    // Fractional bytes are never produced.
    Ok(bytes.floor() as u64)
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    let multiplier = match unit {
        "" | "B" => 1.0,
        "KiB" => (1u64 << 10) as f64,
        "MiB" => (1u64 << 20) as f64,
        "GiB" => (1u64 << 30) as f64,
        "TiB" => (1u64 << 40) as f64,
        "PiB" => (1u64 << 50) as f64,
        "EiB" => (1u64 << 60) as f64,
        "kB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "PB" => 1e15,
        "EB" => 1e18,
        _ => return None,
    };
    Some(multiplier)
}

/// Format a byte count in the most compact human-readable form.
///
/// Scales to the nearest unit exponent rather than the largest fully-covered
/// unit, so `2^49` renders as `0.5PiB` and `2^50` as `1PiB`. No whitespace
/// between magnitude and suffix.
pub fn format_from_bytes(bytes: u64, binary: bool) -> String {
    let (units, step) = if binary {
        (BINARY_UNITS, 1024.0f64)
    } else {
        (DECIMAL_UNITS, 1000.0f64)
    };

    if bytes == 0 {
        return format!("0{}", units[0]);
    }

    let exponent = ((bytes as f64).ln() / step.ln()).round() as usize;
    let exponent = exponent.min(units.len() - 1);
    let magnitude = bytes as f64 / step.powi(exponent as i32);

    format!("{}{}", magnitude, units[exponent])
}

/// Split a formatted capacity string into `(magnitude, unit)`.
///
/// Expects the `<number><X>iB` shape produced by [`format_from_bytes`] with a
/// binary unit. Anything else falls back to `("0", "B")`; display-only
/// callers treat that as zero rather than failing.
pub fn split_formatted(input: &str) -> (String, String) {
    let fallback = || (String::from("0"), String::from("B"));

    let mut split_idx = None;
    for (idx, ch) in input.char_indices() {
        if ch.is_ascii_alphabetic() {
            split_idx = Some(idx);
            break;
        }
    }
    let Some(idx) = split_idx else {
        return fallback();
    };

    let (mantissa, unit) = input.split_at(idx);
    if !is_plain_decimal(mantissa) {
        return fallback();
    }

    let valid_unit = unit.len() == 3
        && unit.ends_with("iB")
        && unit.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    if !valid_unit {
        return fallback();
    }

    (mantissa.to_string(), unit.to_string())
}

// `\d+(\.\d+)?`: digits with at most one interior decimal point.
fn is_plain_decimal(s: &str) -> bool {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return false;
    }
    if s.matches('.').count() > 1 {
        return false;
    }
    s.starts_with(|c: char| c.is_ascii_digit()) && !s.ends_with('.')
}
