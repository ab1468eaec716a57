use std::collections::BTreeMap;
use std::future::Future;

use lineq_core::{LineEquation, LineError, Point, answer_equals};
use thiserror::Error;
use tracing::warn;

use crate::problem::{
    Answer, ChallengeDifficulty, ChallengeKind, Difficulty, GameChallenge, InvestigationProblem,
    MathProblem, ProblemType, QuizQuestion, QuizQuestionKind, QuizResult, Questions,
};
use crate::tutor::{ConversationalTutor, Transcript, TutorContext};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network failure, timeout, missing credentials or a non-success status.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("malformed collaborator response: {0}")]
    Malformed(String),
    /// The content violates a problem invariant (parallel lines, missing root).
    #[error("collaborator broke the content contract: {0}")]
    Contract(#[from] LineError),
}

/// Source of generated room content.
pub trait ContentProvider {
    fn generate_investigation(
        &self,
    ) -> impl Future<Output = Result<InvestigationProblem, CollaboratorError>> + Send;

    fn generate_problem(
        &self,
        difficulty: Difficulty,
    ) -> impl Future<Output = Result<MathProblem, CollaboratorError>> + Send;

    fn generate_game_challenge(
        &self,
    ) -> impl Future<Output = Result<GameChallenge, CollaboratorError>> + Send;

    fn generate_quiz(
        &self,
    ) -> impl Future<Output = Result<Vec<QuizQuestion>, CollaboratorError>> + Send;

    fn evaluate_quiz(
        &self,
        questions: Vec<QuizQuestion>,
        answers: BTreeMap<u32, String>,
    ) -> impl Future<Output = Result<QuizResult, CollaboratorError>> + Send;
}

/// Everything a hosted room needs from the outside world.
pub trait Collaborators: ContentProvider + ConversationalTutor + Send + Sync + 'static {}

impl<T> Collaborators for T where
    T: ContentProvider + ConversationalTutor + Send + Sync + 'static
{
}

/// Fixed content served when no live service is reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContent;

impl StaticContent {
    pub fn investigation(&self) -> InvestigationProblem {
        InvestigationProblem {
            line1: LineEquation::primary(1.0, -2.0),
            line2: LineEquation::secondary(-1.0, 6.0),
            line1_display: "y = x - 2".into(),
            line2_display: "y = -x + 6".into(),
            intersection: Point::new(4.0, 2.0),
            root1: 2.0,
            root2: 6.0,
            points_line1: [Point::new(0.0, -2.0), Point::new(3.0, 1.0)],
            questions: Questions::default(),
        }
    }

    pub fn problem(&self) -> MathProblem {
        MathProblem {
            line1: LineEquation::primary(2.0, 1.0),
            line2: LineEquation::secondary(-1.0, 4.0),
            line1_display: "y = 2x + 1".into(),
            line2_display: "y = -x + 4".into(),
            story_context: None,
            solution: Point::new(1.0, 3.0),
            kind: ProblemType::Explicit,
            difficulty: Difficulty::Easy,
        }
    }

    pub fn game_challenge(&self) -> GameChallenge {
        GameChallenge {
            kind: ChallengeKind::TrueFalse,
            question: "הישרים נחתכים בנקודה אחת בלבד".into(),
            line1: Some(LineEquation::primary(1.0, 0.0)),
            line2: Some(LineEquation::secondary(1.0, 5.0)),
            options: None,
            correct_answer: Answer::Bool(false),
            explanation: "השיפועים זהים (m=1) וה-b שונה, לכן הישרים מקבילים ולעולם לא ייפגשו."
                .into(),
            difficulty: ChallengeDifficulty::Easy,
        }
    }

    pub fn quiz(&self) -> Vec<QuizQuestion> {
        vec![
            QuizQuestion {
                id: 1,
                text: "נתונים שני ישרים בעלי שיפוע זהה ו-b שונה. כמה נקודות חיתוך יש להם?".into(),
                kind: QuizQuestionKind::MultipleChoice,
                options: Some(
                    ["אחת", "אינסוף", "אף אחת (מקבילים)", "תלוי ב-b"]
                        .map(String::from)
                        .to_vec(),
                ),
                correct_answer: "אף אחת (מקבילים)".into(),
            },
            QuizQuestion {
                id: 2,
                text: "עבור הפונקציה y = 2x - 4, מהו תחום החיוביות?".into(),
                kind: QuizQuestionKind::MultipleChoice,
                options: Some(
                    ["x > 2", "x < 2", "x > 4", "x < -4"]
                        .map(String::from)
                        .to_vec(),
                ),
                correct_answer: "x > 2".into(),
            },
        ]
    }

    /// Scores answers locally; the narrative fields stay generic.
    pub fn quiz_result(
        &self,
        questions: &[QuizQuestion],
        answers: &BTreeMap<u32, String>,
    ) -> QuizResult {
        let correct = questions
            .iter()
            .filter(|question| {
                answers
                    .get(&question.id)
                    .is_some_and(|answer| answer_equals(answer, &question.correct_answer))
            })
            .count();
        let score = if questions.is_empty() {
            0
        } else {
            (correct * 100 / questions.len()) as u32
        };

        QuizResult {
            score,
            feedback: format!("ענית נכון על {correct} מתוך {} שאלות.", questions.len()),
            strength_area: "חיתוך ישרים".into(),
            weakness_area: "תחומי חיוביות ושליליות".into(),
        }
    }
}

impl ContentProvider for StaticContent {
    async fn generate_investigation(&self) -> Result<InvestigationProblem, CollaboratorError> {
        Ok(self.investigation())
    }

    async fn generate_problem(
        &self,
        _difficulty: Difficulty,
    ) -> Result<MathProblem, CollaboratorError> {
        Ok(self.problem())
    }

    async fn generate_game_challenge(&self) -> Result<GameChallenge, CollaboratorError> {
        Ok(self.game_challenge())
    }

    async fn generate_quiz(&self) -> Result<Vec<QuizQuestion>, CollaboratorError> {
        Ok(self.quiz())
    }

    async fn evaluate_quiz(
        &self,
        questions: Vec<QuizQuestion>,
        answers: BTreeMap<u32, String>,
    ) -> Result<QuizResult, CollaboratorError> {
        Ok(self.quiz_result(&questions, &answers))
    }
}

/// Wraps an optional live provider and serves static content when it is
/// unreachable or returns garbage. Contract violations pass through so the
/// caller can ask again.
#[derive(Debug, Clone)]
pub struct FallbackProvider<P> {
    live: Option<P>,
    fallback: StaticContent,
}

impl<P> FallbackProvider<P> {
    pub fn new(live: P) -> Self {
        Self {
            live: Some(live),
            fallback: StaticContent,
        }
    }

    pub fn offline() -> Self {
        Self {
            live: None,
            fallback: StaticContent,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }
}

/// Returns `Some(err)` when the error must reach the caller.
fn recoverable(what: &str, err: CollaboratorError) -> Option<CollaboratorError> {
    match err {
        CollaboratorError::Unavailable(_) | CollaboratorError::Malformed(_) => {
            warn!(%err, what, "falling back to static content");
            None
        }
        CollaboratorError::Contract(_) => Some(err),
    }
}

impl<P> ContentProvider for FallbackProvider<P>
where
    P: ContentProvider + Send + Sync,
{
    async fn generate_investigation(&self) -> Result<InvestigationProblem, CollaboratorError> {
        if let Some(live) = &self.live {
            match live.generate_investigation().await {
                Ok(problem) => return Ok(problem),
                Err(err) => {
                    if let Some(err) = recoverable("investigation", err) {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self.fallback.investigation())
    }

    async fn generate_problem(
        &self,
        difficulty: Difficulty,
    ) -> Result<MathProblem, CollaboratorError> {
        if let Some(live) = &self.live {
            match live.generate_problem(difficulty).await {
                Ok(problem) => return Ok(problem),
                Err(err) => {
                    if let Some(err) = recoverable("practice problem", err) {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self.fallback.problem())
    }

    async fn generate_game_challenge(&self) -> Result<GameChallenge, CollaboratorError> {
        if let Some(live) = &self.live {
            match live.generate_game_challenge().await {
                Ok(challenge) => return Ok(challenge),
                Err(err) => {
                    if let Some(err) = recoverable("game challenge", err) {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self.fallback.game_challenge())
    }

    async fn generate_quiz(&self) -> Result<Vec<QuizQuestion>, CollaboratorError> {
        if let Some(live) = &self.live {
            match live.generate_quiz().await {
                Ok(quiz) => return Ok(quiz),
                Err(err) => {
                    if let Some(err) = recoverable("quiz", err) {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self.fallback.quiz())
    }

    async fn evaluate_quiz(
        &self,
        questions: Vec<QuizQuestion>,
        answers: BTreeMap<u32, String>,
    ) -> Result<QuizResult, CollaboratorError> {
        if let Some(live) = &self.live {
            match live.evaluate_quiz(questions.clone(), answers.clone()).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if let Some(err) = recoverable("quiz evaluation", err) {
                        return Err(err);
                    }
                }
            }
        }
        Ok(self.fallback.quiz_result(&questions, &answers))
    }
}

impl<P> ConversationalTutor for FallbackProvider<P>
where
    P: ConversationalTutor + Send + Sync,
{
    async fn ask(
        &self,
        history: Transcript,
        context: TutorContext,
        text: String,
    ) -> Result<String, CollaboratorError> {
        match &self.live {
            Some(live) => live.ask(history, context, text).await,
            None => Err(CollaboratorError::Unavailable(
                "no tutor service configured".into(),
            )),
        }
    }
}
