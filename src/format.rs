//! Display formatting shared by every score readout (en-US conventions)

use crate::scoring::js_round;

/// Whole US dollars with thousands separators: `$1,235`, `-$40`
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let dollars = value.abs().round();
    let sign = if value < 0.0 && dollars != 0.0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(&format!("{:.0}", dollars)))
}

/// One decimal place and a percent sign: `87.5%`
pub fn format_percentage(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}%", non_finite(value));
    }
    let tenths = js_round(value * 10.0) / 10.0;
    // Avoid "-0.0%"
    let tenths = if tenths == 0.0 { 0.0 } else { tenths };
    format!("{:.1}%", tenths)
}

/// Thousands separators and at most three fraction digits: `12,345.679`
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let fixed = format!("{:.3}", (value.abs() * 1000.0).round() / 1000.0);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let is_zero = int_part.chars().all(|c| c == '0') && frac_part.is_empty();
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };

    let mut out = format!("{}{}", sign, group_thousands(int_part));
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value > 0.0 {
        "∞".to_string()
    } else {
        "-∞".to_string()
    }
}

/// Insert commas every three digits of an unsigned integer string
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
