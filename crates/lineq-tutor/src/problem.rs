use lineq_core::{LineEquation, LineError, Point, intersect, root};
use lineq_parse::format_equation;
use serde::{Deserialize, Serialize};

use crate::workflow::StepId;

/// Prompt shown for each investigation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questions {
    pub slope: String,
    pub equation: String,
    pub intersection: String,
    pub positivity1: String,
    pub negativity1: String,
    pub positivity2: String,
    pub negativity2: String,
}

impl Questions {
    pub fn prompt(&self, step: StepId) -> &str {
        match step {
            StepId::Slope => &self.slope,
            StepId::Equation => &self.equation,
            StepId::Intersection => &self.intersection,
            StepId::Positivity1 => &self.positivity1,
            StepId::Negativity1 => &self.negativity1,
            StepId::Positivity2 => &self.positivity2,
            StepId::Negativity2 => &self.negativity2,
        }
    }
}

impl Default for Questions {
    fn default() -> Self {
        Self {
            slope: "חשב את השיפוע של הגרף הכחול".into(),
            equation: "מצא את משוואת הגרף הכחול".into(),
            intersection: "מצא את נקודת החיתוך".into(),
            positivity1: "מצא תחום חיוביות (גרף כחול)".into(),
            negativity1: "מצא תחום שליליות (גרף כחול)".into(),
            positivity2: "מצא תחום חיוביות (גרף אדום)".into(),
            negativity2: "מצא תחום שליליות (גרף אדום)".into(),
        }
    }
}

/// A two-line problem for the guided investigation, with every derived answer precomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationProblem {
    pub line1: LineEquation,
    pub line2: LineEquation,
    pub line1_display: String,
    pub line2_display: String,
    pub intersection: Point,
    pub root1: f64,
    pub root2: f64,
    /// Two points on line 1 for the slope task.
    pub points_line1: [Point; 2],
    pub questions: Questions,
}

impl InvestigationProblem {
    /// Derives intersection, roots and displays locally from the two lines.
    ///
    /// Parallel lines and horizontal lines are rejected: the investigation
    /// needs a single crossing point and a root on each line.
    pub fn from_lines(
        line1: LineEquation,
        line2: LineEquation,
        questions: Questions,
    ) -> Result<Self, LineError> {
        let intersection = intersect(&line1, &line2)?;
        let root1 = root(&line1)?;
        let root2 = root(&line2)?;
        let points_line1 = [
            Point::new(0.0, line1.evaluate(0.0)),
            Point::new(2.0, line1.evaluate(2.0)),
        ];

        Ok(Self {
            line1_display: format_equation(line1.slope, line1.intercept),
            line2_display: format_equation(line2.slope, line2.intercept),
            line1,
            line2,
            intersection,
            root1,
            root2,
            points_line1,
            questions,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Explicit,
    Implicit,
    Word,
}

impl ProblemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Explicit => "explicit",
            ProblemType::Implicit => "implicit",
            ProblemType::Word => "word",
        }
    }
}

/// Practice-room problem. Displays may be in implicit form (`3y + 6x = 12`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathProblem {
    pub line1: LineEquation,
    pub line2: LineEquation,
    pub line1_display: String,
    pub line2_display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_context: Option<String>,
    pub solution: Point,
    pub kind: ProblemType,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeKind {
    TrueFalse,
    MultipleChoice,
    OpenAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeDifficulty {
    Easy,
    Hard,
}

/// A correct or submitted game answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Answer {
    /// Text form used for open-answer comparison.
    pub fn to_text(&self) -> String {
        match self {
            Answer::Bool(value) => value.to_string(),
            Answer::Number(value) => value.to_string(),
            Answer::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameChallenge {
    pub kind: ChallengeKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line1: Option<LineEquation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<LineEquation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: Answer,
    pub explanation: String,
    pub difficulty: ChallengeDifficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizQuestionKind {
    MultipleChoice,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: u32,
    pub text: String,
    pub kind: QuizQuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub feedback: String,
    pub strength_area: String,
    pub weakness_area: String,
}

#[cfg(test)]
mod tests {
    use lineq_core::{DegenerateReason, LineEquation, LineError, Point};
    use pretty_assertions::assert_eq;

    use super::{Answer, InvestigationProblem, Questions};
    use crate::workflow::StepId;

    #[test]
    fn from_lines_derives_every_answer() {
        let problem = InvestigationProblem::from_lines(
            LineEquation::primary(1.0, -2.0),
            LineEquation::secondary(-1.0, 6.0),
            Questions::default(),
        )
        .expect("scenario lines are valid");

        assert_eq!(problem.intersection, Point::new(4.0, 2.0));
        assert_eq!(problem.root1, 2.0);
        assert_eq!(problem.root2, 6.0);
        assert_eq!(problem.line1_display, "y = x - 2");
        assert_eq!(problem.line2_display, "y = -x + 6");
        assert_eq!(
            problem.points_line1,
            [Point::new(0.0, -2.0), Point::new(2.0, 0.0)]
        );
    }

    #[test]
    fn from_lines_rejects_unusable_pairs() {
        let parallel = InvestigationProblem::from_lines(
            LineEquation::primary(2.0, 1.0),
            LineEquation::secondary(2.0, 4.0),
            Questions::default(),
        );
        assert_eq!(
            parallel.err(),
            Some(LineError::Degenerate(DegenerateReason::ParallelLines))
        );

        let horizontal = InvestigationProblem::from_lines(
            LineEquation::primary(0.0, 3.0),
            LineEquation::secondary(1.0, 0.0),
            Questions::default(),
        );
        assert_eq!(
            horizontal.err(),
            Some(LineError::Degenerate(DegenerateReason::NoRoot))
        );
    }

    #[test]
    fn questions_are_indexed_by_step() {
        let questions = Questions::default();
        assert_eq!(questions.prompt(StepId::Slope), "חשב את השיפוע של הגרף הכחול");
        assert_eq!(
            questions.prompt(StepId::Negativity2),
            "מצא תחום שליליות (גרף אדום)"
        );
    }

    #[test]
    fn answers_deserialize_untagged() {
        let parsed: Vec<Answer> =
            serde_json::from_str(r#"[false, 2.5, "x > 2"]"#).expect("valid answers");
        assert_eq!(
            parsed,
            vec![
                Answer::Bool(false),
                Answer::Number(2.5),
                Answer::Text("x > 2".into())
            ]
        );
        assert_eq!(Answer::Number(3.0).to_text(), "3");
    }
}
