// Utility helpers for cell coercion and console formatting.
//
// This module centralizes all the "dirty" cell handling so the normalizer
// can assume typed values: every helper degrades to `None`, an empty list,
// or `false` instead of failing.
use crate::workbook::Cell;
use num_format::{Locale, ToFormattedString};

/// Parse a cell into `f64`, treating absent and blank cells as missing.
///
/// - Accepts `Option<&Cell>` so callers can pass a column lookup straight through.
/// - Numeric cells pass through unchanged (no rounding).
/// - Text is trimmed and parsed; anything unparseable becomes `None`.
pub fn parse_nullable_number(cell: Option<&Cell>) -> Option<f64> {
    match cell? {
        Cell::Empty => None,
        Cell::Number(n) => Some(*n).filter(|v| !v.is_nan()),
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok().filter(|v| v.is_finite())
        }
    }
}

/// Split a comma-delimited cell into trimmed, non-empty tokens.
pub fn parse_delimited_list(cell: Option<&Cell>) -> Vec<String> {
    let Some(cell) = cell else {
        return Vec::new();
    };
    cell.text()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpret an adverse-event marker column.
///
/// True for a numeric 1 (including text that reads as 1) or the exact
/// text `Y`. Lowercase `y` is not a marker.
pub fn parse_flag(cell: Option<&Cell>) -> bool {
    match cell {
        Some(Cell::Number(n)) => *n == 1.0,
        Some(Cell::Text(s)) => s == "Y" || s.trim().parse::<f64>().is_ok_and(|v| v == 1.0),
        _ => false,
    }
}

/// Round half away from zero to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234.56`).
    let s = format!("{:.*}", decimals, n.abs());
    // Values that round to zero print unsigned.
    let neg = n.is_sign_negative() && s.bytes().any(|b| matches!(b, b'1'..=b'9'));
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Used for counts in console messages (e.g., `1,204 cases loaded`).
    n.to_formatted_string(&Locale::en)
}
