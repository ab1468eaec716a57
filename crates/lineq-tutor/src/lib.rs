pub mod game;
pub mod gemini;
pub mod learning;
pub mod problem;
pub mod provider;
pub mod room;
pub mod tutor;
pub mod workflow;

pub use game::{GameRound, RoundStatus, RoundTimer, TimerEvent, check_answer, round_length};
pub use gemini::{GeminiClient, GeminiConfig};
pub use learning::{LearningExample, ScanReading};
pub use problem::{
    Answer, ChallengeDifficulty, ChallengeKind, Difficulty, GameChallenge, InvestigationProblem,
    MathProblem, ProblemType, QuizQuestion, QuizQuestionKind, QuizResult, Questions,
};
pub use provider::{
    CollaboratorError, Collaborators, ContentProvider, FallbackProvider, StaticContent,
};
pub use room::{FinishedLoad, InvestigationRoom, LOAD_ERROR_MESSAGE, LoadState, PendingLoad, RoomConfig};
pub use tutor::{
    APOLOGY, ChatMessage, ChatRole, ConversationalTutor, Transcript, TutorContext,
    ask_or_apologize,
};
pub use workflow::{
    GraphView, InvestigationWorkflow, RetainReason, Stage, StepId, StepMessage, StepMessages,
    SubmitOutcome, Submission,
};
