//! Reads and writes slope-intercept equations as students type them.
//!
//! The accepted shape is `y = <coefficient>x <constant>` where either side of
//! the `x` may be missing, or `y = <constant>` for horizontal lines. Whitespace
//! and letter case are ignored.

use std::fmt;

use lineq_core::LineEquation;
use thiserror::Error;

const DEPENDENT: &str = "y";
const INDEPENDENT: char = 'x';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("equation must start with 'y='")]
    MissingEquals,
    #[error("invalid coefficient '{0}' before x")]
    InvalidCoefficient(String),
    #[error("invalid constant term '{0}'")]
    InvalidConstant(String),
}

/// Slope and intercept read from an equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearForm {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearForm {
    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub fn matches(&self, line: &LineEquation) -> bool {
        lineq_core::numeric_equals(self.slope, line.slope)
            && lineq_core::numeric_equals(self.intercept, line.intercept)
    }
}

impl fmt::Display for LinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("y = ")?;

        if self.slope != 0.0 {
            if self.slope == 1.0 {
                f.write_str("x")?;
            } else if self.slope == -1.0 {
                f.write_str("-x")?;
            } else {
                write!(f, "{}x", self.slope)?;
            }
        }

        match (self.slope == 0.0, self.intercept) {
            (true, b) => write!(f, "{b}"),
            (false, b) if b > 0.0 => write!(f, " + {b}"),
            (false, b) if b < 0.0 => write!(f, " - {}", b.abs()),
            _ => Ok(()),
        }
    }
}

impl From<&LineEquation> for LinearForm {
    fn from(line: &LineEquation) -> Self {
        Self::new(line.slope, line.intercept)
    }
}

pub fn parse_equation(text: &str) -> Result<LinearForm, ParseError> {
    let normalized: String = text
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    let rhs = normalized
        .strip_prefix(DEPENDENT)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(ParseError::MissingEquals)?;

    match rhs.split_once(INDEPENDENT) {
        Some((coefficient, constant)) => Ok(LinearForm {
            slope: parse_coefficient(coefficient)?,
            intercept: parse_constant(constant)?,
        }),
        None => {
            let intercept =
                parse_real(rhs).ok_or_else(|| ParseError::InvalidConstant(rhs.into()))?;
            Ok(LinearForm {
                slope: 0.0,
                intercept,
            })
        }
    }
}

/// Display form used on equation cards, e.g. `y = -x + 4`.
pub fn format_equation(slope: f64, intercept: f64) -> String {
    LinearForm::new(slope, intercept).to_string()
}

fn parse_coefficient(token: &str) -> Result<f64, ParseError> {
    match token {
        "" | "+" => Ok(1.0),
        "-" => Ok(-1.0),
        _ => parse_real(token).ok_or_else(|| ParseError::InvalidCoefficient(token.into())),
    }
}

fn parse_constant(token: &str) -> Result<f64, ParseError> {
    if token.is_empty() {
        return Ok(0.0);
    }
    parse_real(token).ok_or_else(|| ParseError::InvalidConstant(token.into()))
}

fn parse_real(token: &str) -> Option<f64> {
    // Rust accepts "inf" and "nan" spellings; a student answer never should.
    if !token.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }
    token.parse::<f64>().ok().filter(|value| value.is_finite())
}
