use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::learning::LearningExample;
use crate::problem::{InvestigationProblem, MathProblem};
use crate::provider::CollaboratorError;
use crate::workflow::{Stage, StepId};

/// Shown to the student whenever the tutor cannot answer.
pub const APOLOGY: &str = "מצטער, יש לי בעיה בתקשורת כרגע.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Ordered chat history, handed by value to each tutor call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Appends a question and its reply.
    pub fn record_exchange(&mut self, question: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::model(reply));
    }
}

/// What the student is looking at when they ask for help.
#[derive(Debug, Clone, PartialEq)]
pub enum TutorContext {
    Investigation {
        problem: InvestigationProblem,
        stage: Stage,
    },
    Practice(MathProblem),
    Learning(LearningExample),
    General,
}

impl TutorContext {
    pub fn system_instruction(&self) -> String {
        match self {
            TutorContext::Investigation { problem, stage } => {
                investigation_instruction(problem, *stage)
            }
            TutorContext::Practice(problem) => practice_instruction(problem),
            TutorContext::Learning(example) => learning_instruction(example),
            TutorContext::General => GENERAL_INSTRUCTION.to_string(),
        }
    }
}

const GENERAL_INSTRUCTION: &str = "You are a friendly and conceptual math teacher for 8th grade.
Topic: Understanding why the intersection point requires equating the functions (y1 = y2).
Explain the connection between the graph (lines crossing) and the algebra (equations being equal).
Keep answers short, encouraging, and in Hebrew.";

fn investigation_instruction(problem: &InvestigationProblem, stage: Stage) -> String {
    let mut out = String::from(
        "You are a strict but helpful math teacher grading a FULL investigation.\n\
         Topic: Linear Functions Investigation.\n\n",
    );
    out.push_str(&format!(
        "Line 1: y = {}x + {} (Blue) - Root at x={}\n",
        problem.line1.slope, problem.line1.intercept, problem.root1
    ));
    out.push_str(&format!(
        "Line 2: y = {}x + {} (Red) - Root at x={}\n",
        problem.line2.slope, problem.line2.intercept, problem.root2
    ));
    out.push_str(&format!(
        "Intersection: ({}, {})\n\n",
        problem.intersection.x, problem.intersection.y
    ));
    out.push_str(
        "Goals:\n\
         1. Finding Slope (m).\n\
         2. Finding Equation (y=mx+b).\n\
         3. Intersection Point.\n\
         4. Positivity (y > 0).\n\
         5. Negativity (y < 0).\n\n",
    );
    out.push_str(&format!(
        "The student is currently working on: {}.\n",
        stage_label(stage)
    ));
    out.push_str(
        "Refer to line 1 as \"הגרף הכחול\" and line 2 as \"הגרף האדום\".\n\
         Help the student based on the stage they are currently in.\n\
         Speak in Hebrew. Short answers.",
    );
    out
}

fn practice_instruction(problem: &MathProblem) -> String {
    let mut out = String::from(
        "You are a helpful math tutor for 8th-grade advanced students in Israel.\n\
         Topic: Finding the intersection of two lines.\n",
    );
    out.push_str(&format!("Current Problem Type: {}\n\n", problem.kind.as_str()));
    out.push_str(&format!(
        "Equations (Standard Form):\n1. y = {}x + {}\n2. y = {}x + {}\n\n",
        problem.line1.slope, problem.line1.intercept, problem.line2.slope, problem.line2.intercept
    ));
    out.push_str(&format!(
        "Equations (Display Form):\n1. {}\n2. {}\n\n",
        problem.line1_display, problem.line2_display
    ));
    out.push_str(&format!(
        "Context: {}\nSolution: ({}, {})\n\n",
        problem.story_context.as_deref().unwrap_or("None"),
        problem.solution.x,
        problem.solution.y
    ));
    out.push_str(
        "Pedagogical Goal:\n\
         - If the user is stuck on implicit equations, guide them to isolate y first.\n\
         - If it's a word problem, help them extract the variables and equations.\n\
         - Encourage the method of substitution (equating y1 = y2).\n\
         - Use the Socratic method. Do not give the answer immediately.\n\
         - Speak in Hebrew.\n\
         - Keep it encouraging and short.",
    );
    out
}

fn learning_instruction(example: &LearningExample) -> String {
    let mut out = String::from(
        "You are a friendly and conceptual math teacher for 8th grade.\n\
         Current Mode: Learning / Acquisition Phase.\n\
         Topic: Understanding why the intersection point requires equating the functions (y1 = y2).\n\n\
         Current Example displayed on screen:\n",
    );
    out.push_str(&format!(
        "Line 1 (Blue): {} (y = {}x + {})\n",
        example.line1_display, example.line1.slope, example.line1.intercept
    ));
    out.push_str(&format!(
        "Line 2 (Red): {} (y = {}x + {})\n",
        example.line2_display, example.line2.slope, example.line2.intercept
    ));
    out.push_str(&format!("Intersection X: {}\n\n", example.intersection_x));
    out.push_str(
        "Pedagogical Goals:\n\
         1. Explain the connection between the GRAPH (lines crossing) and the ALGEBRA (equations being equal).\n\
         2. Emphasize that only at the intersection point, the 'x' produces the SAME 'y' for both lines.\n\
         3. If the student asks about the slider, explain that the slider represents testing different 'x' values to compare the heights of the lines.\n\
         4. Keep answers short, encouraging, and in Hebrew.\n\
         5. This is NOT a quiz. You are explaining concepts.",
    );
    out
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Active(StepId::Slope) => "finding the slope of the blue line",
        Stage::Active(StepId::Equation) => "finding the equation of the blue line",
        Stage::Active(StepId::Intersection) => "finding the intersection point",
        Stage::Active(StepId::Positivity1) => "the positivity domain of the blue line",
        Stage::Active(StepId::Negativity1) => "the negativity domain of the blue line",
        Stage::Active(StepId::Positivity2) => "the positivity domain of the red line",
        Stage::Active(StepId::Negativity2) => "the negativity domain of the red line",
        Stage::Complete => "nothing, the investigation is complete",
    }
}

/// Source of hint and explanation text.
pub trait ConversationalTutor {
    fn ask(
        &self,
        history: Transcript,
        context: TutorContext,
        text: String,
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send;
}

/// Asks the tutor and replaces any failure with [`APOLOGY`].
pub async fn ask_or_apologize<T>(
    tutor: &T,
    history: Transcript,
    context: TutorContext,
    text: String,
) -> String
where
    T: ConversationalTutor + Sync,
{
    match tutor.ask(history, context, text).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(%err, "tutor request failed");
            APOLOGY.to_string()
        }
    }
}
