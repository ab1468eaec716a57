//! Worked examples for the learning room: two fixed lines and a scan line the
//! student drags until both heights agree.

use lineq_core::{LineEquation, Point, ProbeReading, evaluate, numeric_equals, probe};
use serde::{Deserialize, Serialize};

/// How far either side of the crossing the scan line may travel.
pub const SCAN_SPAN: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningExample {
    pub id: u32,
    pub title: String,
    pub line1: LineEquation,
    pub line2: LineEquation,
    pub line1_display: String,
    pub line2_display: String,
    pub intersection_x: f64,
    pub description: String,
}

/// Both heights under the scan line, and whether it sits on the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanReading {
    #[serde(flatten)]
    pub reading: ProbeReading,
    pub at_intersection: bool,
}

/// The fixed examples, in presentation order.
pub fn catalog() -> Vec<LearningExample> {
    vec![
        LearningExample {
            id: 1,
            title: "דוגמה קלאסית: שיפועים הפוכים".into(),
            line1: LineEquation::primary(2.0, -2.0),
            line2: LineEquation::secondary(-1.0, 4.0),
            line1_display: "y = 2x - 2".into(),
            line2_display: "y = -x + 4".into(),
            intersection_x: 2.0,
            description: "כאן רואים שני ישרים עם שיפועים מנוגדים. האחד עולה והשני יורד. \
                          הנקודה היחידה בה הם באותו גובה היא נקודת החיתוך."
                .into(),
        },
        LearningExample {
            id: 2,
            title: "דוגמה 2: שיפועים חיוביים".into(),
            line1: LineEquation::primary(3.0, 1.0),
            line2: LineEquation::secondary(1.0, -3.0),
            line1_display: "y = 3x + 1".into(),
            line2_display: "y = x - 3".into(),
            intersection_x: -2.0,
            description: "גם כשיש שני ישרים עולים, הם ייפגשו אם השיפועים שלהם שונים. \
                          שימו לב שהחיתוך כאן קורה בערך x שלילי."
                .into(),
        },
        LearningExample {
            id: 3,
            title: "דוגמה 3: חיתוך בראשית הצירים".into(),
            line1: LineEquation::primary(2.0, 0.0),
            line2: LineEquation::secondary(-0.5, 0.0),
            line1_display: "y = 2x".into(),
            line2_display: "y = -0.5x".into(),
            intersection_x: 0.0,
            description: "כאשר לשתי הפונקציות אין איבר חופשי (b=0), שתיהן עוברות דרך \
                          ראשית הצירים (0,0). זוהי נקודת החיתוך."
                .into(),
        },
    ]
}

impl LearningExample {
    pub fn find(id: u32) -> Option<Self> {
        catalog().into_iter().find(|example| example.id == id)
    }

    pub fn intersection(&self) -> Point {
        Point::new(
            self.intersection_x,
            evaluate(&self.line1, self.intersection_x),
        )
    }

    /// `[intersection_x - 5, intersection_x + 5]`.
    pub fn scan_range(&self) -> [f64; 2] {
        [
            self.intersection_x - SCAN_SPAN,
            self.intersection_x + SCAN_SPAN,
        ]
    }

    pub fn at_intersection(&self, x: f64) -> bool {
        numeric_equals(x, self.intersection_x)
    }

    pub fn scan(&self, x: f64) -> ScanReading {
        ScanReading {
            reading: probe(&self.line1, &self.line2, x),
            at_intersection: self.at_intersection(x),
        }
    }

    /// The equation to solve, right-hand sides set equal: `2x - 2 = -x + 4`.
    pub fn equated_sides(&self) -> String {
        format!(
            "{} = {}",
            right_hand_side(&self.line1_display),
            right_hand_side(&self.line2_display)
        )
    }
}

fn right_hand_side(display: &str) -> &str {
    display
        .split_once('=')
        .map_or(display, |(_, rhs)| rhs)
        .trim()
}
