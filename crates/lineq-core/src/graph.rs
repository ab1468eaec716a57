use serde::{Deserialize, Serialize};

use crate::line::{LineEquation, Point, evaluate};

/// Smallest half-width of the plotted x window.
pub const MIN_HALF_WIDTH: f64 = 10.0;
/// Extra room kept between the focus point and the window edge.
pub const FOCUS_MARGIN: f64 = 5.0;
/// Vertical padding added around the sampled y values.
pub const Y_PADDING: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: f64,
    pub y1: f64,
    pub y2: f64,
}

/// Both lines sampled at unit steps over a symmetric window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSample {
    half_width: f64,
    points: Vec<SamplePoint>,
}

impl GraphSample {
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    /// Padded `[floor(min - 2), ceil(max + 2)]` over both lines.
    pub fn y_range(&self) -> [f64; 2] {
        let (min, max) = self
            .points
            .iter()
            .flat_map(|point| [point.y1, point.y2])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), y| {
                (min.min(y), max.max(y))
            });
        [(min - Y_PADDING).floor(), (max + Y_PADDING).ceil()]
    }
}

/// Readings of both lines at an arbitrary x, for the draggable scan line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub x: f64,
    pub y1: f64,
    pub y2: f64,
    pub gap: f64,
}

/// `max(10, |focus.x| + 5)`, or 10 when the focus is not finite.
///
/// The window grows with the focus and the sample holds one point per unit,
/// so callers fed by untrusted input must bound `focus.x` themselves.
pub fn half_width_for(focus: Point) -> f64 {
    let wanted = focus.x.abs() + FOCUS_MARGIN;
    if !wanted.is_finite() {
        return MIN_HALF_WIDTH;
    }
    wanted.max(MIN_HALF_WIDTH)
}

pub fn sample(a: &LineEquation, b: &LineEquation, focus: Point) -> GraphSample {
    let half_width = half_width_for(focus);
    let steps = (2.0 * half_width).floor() as usize;
    let points = (0..=steps)
        .map(|step| {
            let x = -half_width + step as f64;
            SamplePoint {
                x,
                y1: evaluate(a, x),
                y2: evaluate(b, x),
            }
        })
        .collect();

    GraphSample { half_width, points }
}

pub fn probe(a: &LineEquation, b: &LineEquation, x: f64) -> ProbeReading {
    let y1 = evaluate(a, x);
    let y2 = evaluate(b, x);
    ProbeReading {
        x,
        y1,
        y2,
        gap: (y1 - y2).abs(),
    }
}
