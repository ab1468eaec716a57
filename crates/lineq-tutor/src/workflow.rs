use std::collections::BTreeMap;

use lineq_core::{
    GraphSample, Inequality, LineEquation, Point, SignDomain, numeric_equals, parse_number,
    point_equals, sample, sign_domain, sign_domain_equals,
};
use lineq_parse::{ParseError, parse_equation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::problem::InvestigationProblem;

/// The seven steps of a guided investigation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Slope,
    Equation,
    Intersection,
    Positivity1,
    Negativity1,
    Positivity2,
    Negativity2,
}

impl StepId {
    pub const ALL: [StepId; 7] = [
        StepId::Slope,
        StepId::Equation,
        StepId::Intersection,
        StepId::Positivity1,
        StepId::Negativity1,
        StepId::Positivity2,
        StepId::Negativity2,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum Stage {
    Active(StepId),
    Complete,
}

impl Stage {
    /// Position in the flow; `Complete` sorts after every step.
    pub fn index(self) -> usize {
        match self {
            Stage::Active(step) => step.index(),
            Stage::Complete => StepId::ALL.len(),
        }
    }
}

/// Raw student input for one step, as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Submission {
    Slope { value: String },
    Equation { text: String },
    Intersection { x: String, y: String },
    Positivity1 { sign: String, value: String },
    Negativity1 { sign: String, value: String },
    Positivity2 { sign: String, value: String },
    Negativity2 { sign: String, value: String },
}

impl Submission {
    pub fn step(&self) -> StepId {
        match self {
            Submission::Slope { .. } => StepId::Slope,
            Submission::Equation { .. } => StepId::Equation,
            Submission::Intersection { .. } => StepId::Intersection,
            Submission::Positivity1 { .. } => StepId::Positivity1,
            Submission::Negativity1 { .. } => StepId::Negativity1,
            Submission::Positivity2 { .. } => StepId::Positivity2,
            Submission::Negativity2 { .. } => StepId::Negativity2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainReason {
    Mismatch,
    MissingEquals,
    MalformedEquation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Correct; the given step is now active.
    Advanced(StepId),
    /// Correct on the final step.
    Completed,
    /// Wrong or unreadable; the step stays active with a corrective message.
    Retained(RetainReason),
    /// The submission targets a step that is not the active one.
    Locked,
    /// The investigation is already complete.
    AlreadyComplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMessage {
    pub success: String,
    pub failure: String,
}

impl StepMessage {
    fn new(success: &str, failure: &str) -> Self {
        Self {
            success: success.into(),
            failure: failure.into(),
        }
    }
}

/// Status messages shown after each submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMessages {
    pub steps: [StepMessage; 7],
    pub missing_equals: String,
    pub malformed_equation: String,
}

impl StepMessages {
    pub fn for_step(&self, step: StepId) -> &StepMessage {
        &self.steps[step.index()]
    }
}

impl Default for StepMessages {
    fn default() -> Self {
        Self {
            steps: [
                StepMessage::new(
                    "מצוין! מצאת את השיפוע. עכשיו מצא את משוואת הישר.",
                    "טעות בשיפוע. זכור: הפרש ה-y חלקי הפרש ה-x.",
                ),
                StepMessage::new(
                    "מעולה! מצאת את הגרף הכחול. הנה הגרף האדום, כעת מצא חיתוך.",
                    "המשוואה לא נכונה. נסה לחשב שוב את ה-b על ידי הצבת נקודה.",
                ),
                StepMessage::new(
                    "נכון! עברת לשלב הבא: תחומי חיוביות.",
                    "טעות בנקודת החיתוך. נסה שוב.",
                ),
                StepMessage::new(
                    "מצוין! מצאת את תחום החיוביות. עכשיו מצא את תחום השליליות של הגרף הכחול.",
                    "לא מדויק. בדוק את הסימן או את נקודת האפס.",
                ),
                StepMessage::new(
                    "מעולה! סיימת עם הגרף הכחול. נעבור לגרף האדום - תחום חיוביות.",
                    "טעות בתחום השליליות. נסה להיעזר בגרף.",
                ),
                StepMessage::new("נכון! לסיום, מצא את תחום השליליות של הגרף האדום.", "לא מדויק."),
                StepMessage::new("כל הכבוד! סיימת את החקירה המלאה בהצלחה!", "לא מדויק."),
            ],
            missing_equals: "המשוואה חייבת להתחיל ב- 'y='".into(),
            malformed_equation: "מבנה המשוואה לא תקין. נסה שוב (למשל y=2x+3)".into(),
        }
    }
}

/// What the graph should show at the current stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub sample: GraphSample,
    pub y_range: [f64; 2],
    pub show_intersection: bool,
    pub equations_revealed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Positive,
    Negative,
}

/// Staged state machine for one investigation session.
#[derive(Debug, Clone)]
pub struct InvestigationWorkflow {
    problem: InvestigationProblem,
    stage: Stage,
    inputs: BTreeMap<StepId, Submission>,
    message: String,
    messages: StepMessages,
}

impl InvestigationWorkflow {
    pub fn new(problem: InvestigationProblem) -> Self {
        Self::with_messages(problem, StepMessages::default())
    }

    pub fn with_messages(problem: InvestigationProblem, messages: StepMessages) -> Self {
        Self {
            problem,
            stage: Stage::Active(StepId::Slope),
            inputs: BTreeMap::new(),
            message: String::new(),
            messages,
        }
    }

    pub fn problem(&self) -> &InvestigationProblem {
        &self.problem
    }

    pub fn current_stage(&self) -> Stage {
        self.stage
    }

    pub fn status_message(&self) -> &str {
        &self.message
    }

    pub fn input(&self, step: StepId) -> Option<&Submission> {
        self.inputs.get(&step)
    }

    pub fn is_step_active(&self, step: StepId) -> bool {
        self.stage == Stage::Active(step)
    }

    /// Earlier steps are frozen once accepted.
    pub fn is_step_complete(&self, step: StepId) -> bool {
        step.index() < self.stage.index()
    }

    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Replaces the problem and starts again from the slope step.
    pub fn reset(&mut self, problem: InvestigationProblem) {
        self.problem = problem;
        self.stage = Stage::Active(StepId::Slope);
        self.inputs.clear();
        self.message.clear();
    }

    pub fn submit(&mut self, submission: Submission) -> SubmitOutcome {
        let step = submission.step();
        match self.stage {
            Stage::Complete => return SubmitOutcome::AlreadyComplete,
            Stage::Active(active) if active != step => {
                debug!(?step, ?active, "submission for locked step ignored");
                return SubmitOutcome::Locked;
            }
            Stage::Active(_) => {}
        }

        let verdict = self.check(&submission);
        self.inputs.insert(step, submission);

        let messages = self.messages.for_step(step);
        match verdict {
            Ok(()) => {
                self.message = messages.success.clone();
                match step.next() {
                    Some(next) => {
                        debug!(from = ?step, to = ?next, "investigation step accepted");
                        self.stage = Stage::Active(next);
                        SubmitOutcome::Advanced(next)
                    }
                    None => {
                        debug!("investigation complete");
                        self.stage = Stage::Complete;
                        SubmitOutcome::Completed
                    }
                }
            }
            Err(reason) => {
                self.message = match reason {
                    RetainReason::Mismatch => messages.failure.clone(),
                    RetainReason::MissingEquals => self.messages.missing_equals.clone(),
                    RetainReason::MalformedEquation => self.messages.malformed_equation.clone(),
                };
                debug!(?step, ?reason, "investigation step retained");
                SubmitOutcome::Retained(reason)
            }
        }
    }

    pub fn graph_view(&self) -> GraphView {
        let sample = sample(
            &self.problem.line1,
            &self.problem.line2,
            self.problem.intersection,
        );
        GraphView {
            y_range: sample.y_range(),
            sample,
            show_intersection: self.stage.index() > StepId::Intersection.index(),
            equations_revealed: self.stage.index() >= StepId::Intersection.index(),
        }
    }

    fn check(&self, submission: &Submission) -> Result<(), RetainReason> {
        let problem = &self.problem;
        let passed = match submission {
            Submission::Slope { value } => parse_number(value)
                .is_some_and(|value| numeric_equals(value, problem.line1.slope)),
            Submission::Equation { text } => {
                let form = parse_equation(text).map_err(|err| match err {
                    ParseError::MissingEquals => RetainReason::MissingEquals,
                    ParseError::InvalidCoefficient(_) | ParseError::InvalidConstant(_) => {
                        RetainReason::MalformedEquation
                    }
                })?;
                form.matches(&problem.line1)
            }
            Submission::Intersection { x, y } => match (parse_number(x), parse_number(y)) {
                (Some(x), Some(y)) => point_equals(Point::new(x, y), problem.intersection),
                _ => false,
            },
            Submission::Positivity1 { sign, value } => {
                side_matches(&problem.line1, problem.root1, Side::Positive, sign, value)
            }
            Submission::Negativity1 { sign, value } => {
                side_matches(&problem.line1, problem.root1, Side::Negative, sign, value)
            }
            Submission::Positivity2 { sign, value } => {
                side_matches(&problem.line2, problem.root2, Side::Positive, sign, value)
            }
            Submission::Negativity2 { sign, value } => {
                side_matches(&problem.line2, problem.root2, Side::Negative, sign, value)
            }
        };

        if passed {
            Ok(())
        } else {
            Err(RetainReason::Mismatch)
        }
    }
}

fn side_matches(line: &LineEquation, root: f64, side: Side, sign: &str, value: &str) -> bool {
    let (Some(sign), Some(value)) = (Inequality::from_symbol(sign), parse_number(value)) else {
        return false;
    };

    let expected = match sign_domain(line) {
        SignDomain::Split {
            positive_side,
            negative_side,
            ..
        } => match side {
            Side::Positive => positive_side,
            Side::Negative => negative_side,
        },
        // A horizontal line has no boundary to name.
        SignDomain::Constant(constant) => {
            debug!(?constant, "sign-domain answer for a horizontal line");
            return false;
        }
    };

    sign_domain_equals(sign, value, expected, root)
}

#[cfg(test)]
mod tests {
    use lineq_core::{LineEquation, Point};
    use pretty_assertions::assert_eq;

    use super::{
        InvestigationWorkflow, RetainReason, Stage, StepId, StepMessages, SubmitOutcome,
        Submission,
    };
    use crate::problem::{InvestigationProblem, Questions};

    fn scenario() -> InvestigationWorkflow {
        let problem = InvestigationProblem::from_lines(
            LineEquation::primary(1.0, -2.0),
            LineEquation::secondary(-1.0, 6.0),
            Questions::default(),
        )
        .expect("scenario lines are valid");
        InvestigationWorkflow::new(problem)
    }

    fn slope(value: &str) -> Submission {
        Submission::Slope {
            value: value.into(),
        }
    }

    fn equation(text: &str) -> Submission {
        Submission::Equation { text: text.into() }
    }

    fn sign(step: StepId, sign: &str, value: &str) -> Submission {
        let (sign, value) = (sign.to_string(), value.to_string());
        match step {
            StepId::Positivity1 => Submission::Positivity1 { sign, value },
            StepId::Negativity1 => Submission::Negativity1 { sign, value },
            StepId::Positivity2 => Submission::Positivity2 { sign, value },
            StepId::Negativity2 => Submission::Negativity2 { sign, value },
            other => panic!("{other:?} is not a sign-domain step"),
        }
    }

    fn full_walkthrough() -> Vec<Submission> {
        vec![
            slope("1"),
            equation("y=x-2"),
            Submission::Intersection {
                x: "4".into(),
                y: "2".into(),
            },
            sign(StepId::Positivity1, ">", "2"),
            sign(StepId::Negativity1, "<", "2"),
            sign(StepId::Positivity2, "<", "6"),
            sign(StepId::Negativity2, ">", "6"),
        ]
    }

    #[test]
    fn new_session_starts_at_slope_with_empty_state() {
        let workflow = scenario();
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Slope));
        assert_eq!(workflow.status_message(), "");
        assert!(workflow.is_step_active(StepId::Slope));
        assert!(!workflow.is_step_complete(StepId::Slope));
        assert!(StepId::ALL.iter().all(|step| workflow.input(*step).is_none()));
    }

    #[test]
    fn correct_slope_advances_exactly_once() {
        let mut workflow = scenario();
        assert_eq!(
            workflow.submit(slope("1.05")),
            SubmitOutcome::Advanced(StepId::Equation)
        );
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Equation));
        assert!(workflow.is_step_complete(StepId::Slope));
        assert_eq!(
            workflow.status_message(),
            StepMessages::default().for_step(StepId::Slope).success
        );

        // The slope step is now frozen.
        assert_eq!(workflow.submit(slope("1")), SubmitOutcome::Locked);
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Equation));
        assert_eq!(workflow.input(StepId::Slope), Some(&slope("1.05")));
    }

    #[test]
    fn wrong_slope_stays_with_corrective_message() {
        let mut workflow = scenario();
        for attempt in ["2", "0.8", "abc", ""] {
            assert_eq!(
                workflow.submit(slope(attempt)),
                SubmitOutcome::Retained(RetainReason::Mismatch)
            );
            assert_eq!(workflow.current_stage(), Stage::Active(StepId::Slope));
            assert!(!workflow.status_message().is_empty());
        }
        assert_eq!(workflow.input(StepId::Slope), Some(&slope("")));
    }

    #[test]
    fn later_steps_are_locked() {
        let mut workflow = scenario();
        assert_eq!(workflow.submit(equation("y=x-2")), SubmitOutcome::Locked);
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Slope));
        assert_eq!(workflow.status_message(), "");
        assert!(workflow.input(StepId::Equation).is_none());
    }

    #[test]
    fn equation_step_distinguishes_parse_failures() {
        let mut workflow = scenario();
        workflow.submit(slope("1"));
        let messages = StepMessages::default();

        assert_eq!(
            workflow.submit(equation("x-2")),
            SubmitOutcome::Retained(RetainReason::MissingEquals)
        );
        assert_eq!(workflow.status_message(), messages.missing_equals);

        assert_eq!(
            workflow.submit(equation("y=2*x")),
            SubmitOutcome::Retained(RetainReason::MalformedEquation)
        );
        assert_eq!(workflow.status_message(), messages.malformed_equation);

        assert_eq!(
            workflow.submit(equation("y=x+2")),
            SubmitOutcome::Retained(RetainReason::Mismatch)
        );
        assert_eq!(
            workflow.status_message(),
            messages.for_step(StepId::Equation).failure
        );

        assert_eq!(
            workflow.submit(equation(" Y = X - 2 ")),
            SubmitOutcome::Advanced(StepId::Intersection)
        );
    }

    #[test]
    fn sign_direction_must_match_exactly() {
        let mut workflow = scenario();
        for submission in full_walkthrough().into_iter().take(3) {
            workflow.submit(submission);
        }
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Positivity1));

        assert_eq!(
            workflow.submit(sign(StepId::Positivity1, "<", "2")),
            SubmitOutcome::Retained(RetainReason::Mismatch)
        );
        assert_eq!(
            workflow.submit(sign(StepId::Positivity1, ">=", "2")),
            SubmitOutcome::Retained(RetainReason::Mismatch)
        );
        assert_eq!(
            workflow.submit(sign(StepId::Positivity1, ">", "2.05")),
            SubmitOutcome::Advanced(StepId::Negativity1)
        );
    }

    #[test]
    fn scenario_walkthrough_reaches_complete() {
        let mut workflow = scenario();
        let submissions = full_walkthrough();
        let last = submissions.len() - 1;

        for (index, submission) in submissions.into_iter().enumerate() {
            let step = submission.step();
            let outcome = workflow.submit(submission);
            if index == last {
                assert_eq!(outcome, SubmitOutcome::Completed);
            } else {
                assert_eq!(outcome, SubmitOutcome::Advanced(StepId::ALL[index + 1]));
            }
            assert!(workflow.is_step_complete(step));
        }

        assert!(workflow.is_complete());
        assert_eq!(
            workflow.status_message(),
            "כל הכבוד! סיימת את החקירה המלאה בהצלחה!"
        );
    }

    #[test]
    fn submitting_after_complete_is_a_no_op() {
        let mut workflow = scenario();
        for submission in full_walkthrough() {
            workflow.submit(submission);
        }
        let message = workflow.status_message().to_string();

        assert_eq!(
            workflow.submit(sign(StepId::Negativity2, "<", "0")),
            SubmitOutcome::AlreadyComplete
        );
        assert_eq!(workflow.current_stage(), Stage::Complete);
        assert_eq!(workflow.status_message(), message);
        assert_eq!(
            workflow.input(StepId::Negativity2),
            Some(&sign(StepId::Negativity2, ">", "6"))
        );
    }

    #[test]
    fn reset_clears_session() {
        let mut workflow = scenario();
        workflow.submit(slope("1"));
        workflow.submit(equation("y=3"));

        let fresh = InvestigationProblem::from_lines(
            LineEquation::primary(2.0, 1.0),
            LineEquation::secondary(-1.0, 4.0),
            Questions::default(),
        )
        .expect("valid lines");
        workflow.reset(fresh);

        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Slope));
        assert_eq!(workflow.status_message(), "");
        assert!(workflow.input(StepId::Slope).is_none());
        assert_eq!(workflow.problem().intersection, Point::new(1.0, 3.0));
    }

    #[test]
    fn horizontal_line_sign_domain_never_matches() {
        let problem = InvestigationProblem {
            line1: LineEquation::primary(0.0, 3.0),
            line2: LineEquation::secondary(1.0, 0.0),
            line1_display: "y = 3".into(),
            line2_display: "y = x".into(),
            intersection: Point::new(3.0, 3.0),
            root1: 0.0,
            root2: 0.0,
            points_line1: [Point::new(0.0, 3.0), Point::new(2.0, 3.0)],
            questions: Questions::default(),
        };
        let mut workflow = InvestigationWorkflow::new(problem);
        workflow.submit(slope("0"));
        workflow.submit(equation("y=3"));
        workflow.submit(Submission::Intersection {
            x: "3".into(),
            y: "3".into(),
        });

        for symbol in [">", "<"] {
            assert_eq!(
                workflow.submit(sign(StepId::Positivity1, symbol, "0")),
                SubmitOutcome::Retained(RetainReason::Mismatch)
            );
        }
    }

    #[test]
    fn graph_view_tracks_stage() {
        let mut workflow = scenario();
        let view = workflow.graph_view();
        assert!(!view.show_intersection);
        assert!(!view.equations_revealed);
        assert_eq!(view.sample.half_width(), 10.0);
        assert_eq!(view.y_range, view.sample.y_range());

        workflow.submit(slope("1"));
        workflow.submit(equation("y=x-2"));
        let view = workflow.graph_view();
        assert!(view.equations_revealed);
        assert!(!view.show_intersection);

        workflow.submit(Submission::Intersection {
            x: "4".into(),
            y: "2".into(),
        });
        assert!(workflow.graph_view().show_intersection);
    }

    #[test]
    fn submissions_deserialize_by_step_tag() {
        let parsed: Submission =
            serde_json::from_str(r#"{"step":"positivity1","sign":">","value":"2"}"#)
                .expect("tagged submission");
        assert_eq!(parsed, sign(StepId::Positivity1, ">", "2"));
        assert_eq!(StepId::from_index(7), None);
        assert_eq!(StepId::Negativity2.next(), None);
    }
}
