use crate::line::{Inequality, Point};

/// Fixed slack for every floating-point answer comparison.
pub const TOLERANCE: f64 = 0.1;

#[inline]
pub fn numeric_equals(a: f64, b: f64) -> bool {
    (a - b).abs() < TOLERANCE
}

#[inline]
pub fn point_equals(p: Point, q: Point) -> bool {
    numeric_equals(p.x, q.x) && numeric_equals(p.y, q.y)
}

/// The inequality direction must match exactly; only the boundary gets tolerance.
pub fn sign_domain_equals(
    submitted_sign: Inequality,
    submitted_value: f64,
    expected_sign: Inequality,
    expected_value: f64,
) -> bool {
    submitted_sign == expected_sign && numeric_equals(submitted_value, expected_value)
}

pub fn string_equals(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

/// Parses a student-typed number. Empty and non-finite input is rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Compares numerically when both sides read as numbers, textually otherwise.
pub fn answer_equals(submitted: &str, expected: &str) -> bool {
    match (parse_number(submitted), parse_number(expected)) {
        (Some(a), Some(b)) => numeric_equals(a, b),
        _ => string_equals(submitted, expected),
    }
}
