use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cartesian point on the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Display color tag attached to each line of a problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineColor(String);

impl LineColor {
    pub const BLUE: &'static str = "#2563eb";
    pub const RED: &'static str = "#dc2626";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Slope-intercept line `y = slope * x + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEquation {
    pub slope: f64,
    pub intercept: f64,
    pub color: LineColor,
    pub id: u32,
}

impl LineEquation {
    pub fn new(slope: f64, intercept: f64, color: LineColor, id: u32) -> Self {
        Self {
            slope,
            intercept,
            color,
            id,
        }
    }

    /// First line of a two-line problem (blue).
    pub fn primary(slope: f64, intercept: f64) -> Self {
        Self::new(slope, intercept, LineColor::new(LineColor::BLUE), 1)
    }

    /// Second line of a two-line problem (red).
    pub fn secondary(slope: f64, intercept: f64) -> Self {
        Self::new(slope, intercept, LineColor::new(LineColor::RED), 2)
    }

    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        evaluate(self, x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LineError {
    /// No unique answer exists: parallel lines, or a horizontal line off the axis.
    #[error("degenerate input: {0}")]
    Degenerate(DegenerateReason),
    /// Every x satisfies the equation (the zero line).
    #[error("indeterminate: every x is a root of y = 0")]
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    ParallelLines,
    IdenticalLines,
    NoRoot,
}

impl fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegenerateReason::ParallelLines => f.write_str("lines are parallel"),
            DegenerateReason::IdenticalLines => f.write_str("lines are identical"),
            DegenerateReason::NoRoot => f.write_str("horizontal line never crosses y = 0"),
        }
    }
}

/// Inequality direction relative to a boundary on the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inequality {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
}

impl Inequality {
    pub fn symbol(self) -> &'static str {
        match self {
            Inequality::Greater => ">",
            Inequality::Less => "<",
        }
    }

    /// Parses a `>` or `<` token; anything else is rejected.
    pub fn from_symbol(token: &str) -> Option<Self> {
        match token.trim() {
            ">" => Some(Inequality::Greater),
            "<" => Some(Inequality::Less),
            _ => None,
        }
    }
}

impl fmt::Display for Inequality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantSign {
    Positive,
    Negative,
    Zero,
}

/// Where a line is above and below the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignDomain {
    /// y > 0 for `x <positive_side> boundary`, y < 0 for `x <negative_side> boundary`.
    Split {
        positive_side: Inequality,
        negative_side: Inequality,
        boundary: f64,
    },
    /// Horizontal line: the sign never changes.
    Constant(ConstantSign),
}

#[inline]
pub fn evaluate(line: &LineEquation, x: f64) -> f64 {
    line.slope * x + line.intercept
}

pub fn intersect(a: &LineEquation, b: &LineEquation) -> Result<Point, LineError> {
    if a.slope == b.slope {
        let reason = if a.intercept == b.intercept {
            DegenerateReason::IdenticalLines
        } else {
            DegenerateReason::ParallelLines
        };
        return Err(LineError::Degenerate(reason));
    }

    let x = (b.intercept - a.intercept) / (a.slope - b.slope);
    Ok(Point::new(x, evaluate(a, x)))
}

/// x-intercept of the line.
pub fn root(line: &LineEquation) -> Result<f64, LineError> {
    if line.slope == 0.0 {
        return if line.intercept == 0.0 {
            Err(LineError::Indeterminate)
        } else {
            Err(LineError::Degenerate(DegenerateReason::NoRoot))
        };
    }
    Ok(-line.intercept / line.slope)
}

pub fn sign_domain(line: &LineEquation) -> SignDomain {
    if line.slope == 0.0 {
        let sign = if line.intercept > 0.0 {
            ConstantSign::Positive
        } else if line.intercept < 0.0 {
            ConstantSign::Negative
        } else {
            ConstantSign::Zero
        };
        return SignDomain::Constant(sign);
    }

    let boundary = -line.intercept / line.slope;
    if line.slope > 0.0 {
        SignDomain::Split {
            positive_side: Inequality::Greater,
            negative_side: Inequality::Less,
            boundary,
        }
    } else {
        SignDomain::Split {
            positive_side: Inequality::Less,
            negative_side: Inequality::Greater,
            boundary,
        }
    }
}
