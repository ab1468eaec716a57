use std::sync::Arc;

use serde::Serialize;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::problem::InvestigationProblem;
use crate::provider::{CollaboratorError, ContentProvider};
use crate::tutor::TutorContext;
use crate::workflow::{InvestigationWorkflow, SubmitOutcome, Submission};

/// Shown when a problem could not be loaded.
pub const LOAD_ERROR_MESSAGE: &str = "שגיאה בטעינת הנתונים. נסה לרענן.";

#[derive(Debug, Clone, Copy)]
pub struct RoomConfig {
    /// Provider calls per load before giving up on degenerate content.
    pub max_provider_attempts: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_provider_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Ready,
    /// The last load failed; calling `begin_load` again retries.
    Failed(String),
}

type LoadResult = Result<InvestigationProblem, CollaboratorError>;

/// An in-flight content request.
#[derive(Debug)]
pub struct PendingLoad {
    ticket: u64,
    handle: JoinHandle<LoadResult>,
}

impl PendingLoad {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Waits for the request. An aborted request finishes with no result.
    pub async fn finish(self) -> FinishedLoad {
        let result = match self.handle.await {
            Ok(result) => Some(result),
            Err(err) => {
                debug!(
                    ticket = self.ticket,
                    cancelled = err.is_cancelled(),
                    "load task ended early"
                );
                None
            }
        };
        FinishedLoad {
            ticket: self.ticket,
            result,
        }
    }
}

#[derive(Debug)]
pub struct FinishedLoad {
    ticket: u64,
    result: Option<LoadResult>,
}

/// One investigation room: the workflow plus the request that feeds it.
pub struct InvestigationRoom<P> {
    provider: Arc<P>,
    config: RoomConfig,
    workflow: Option<InvestigationWorkflow>,
    state: LoadState,
    ticket: u64,
    in_flight: Option<AbortHandle>,
}

impl<P> InvestigationRoom<P>
where
    P: ContentProvider + Send + Sync + 'static,
{
    pub fn new(provider: Arc<P>, config: RoomConfig) -> Self {
        Self {
            provider,
            config,
            workflow: None,
            state: LoadState::Loading,
            ticket: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn workflow(&self) -> Option<&InvestigationWorkflow> {
        self.workflow.as_ref()
    }

    /// Discards the current session and requests a fresh problem, cancelling
    /// any request still running.
    pub fn begin_load(&mut self) -> PendingLoad {
        if let Some(previous) = self.in_flight.take() {
            debug!(ticket = self.ticket, "aborting superseded load");
            previous.abort();
        }

        self.ticket += 1;
        self.workflow = None;
        self.state = LoadState::Loading;

        let provider = Arc::clone(&self.provider);
        let attempts = self.config.max_provider_attempts.max(1);
        let handle =
            tokio::spawn(async move { fetch_investigation(provider.as_ref(), attempts).await });
        self.in_flight = Some(handle.abort_handle());

        PendingLoad {
            ticket: self.ticket,
            handle,
        }
    }

    /// Applies a finished request. Returns `false` when it was stale or cancelled.
    pub fn complete_load(&mut self, finished: FinishedLoad) -> bool {
        if finished.ticket != self.ticket {
            debug!(
                stale = finished.ticket,
                current = self.ticket,
                "dropping stale load result"
            );
            return false;
        }
        let Some(result) = finished.result else {
            return false;
        };

        self.in_flight = None;
        match result {
            Ok(problem) => {
                debug!(ticket = self.ticket, "investigation loaded");
                self.workflow = Some(InvestigationWorkflow::new(problem));
                self.state = LoadState::Ready;
            }
            Err(err) => {
                warn!(%err, "failed to load investigation");
                self.state = LoadState::Failed(LOAD_ERROR_MESSAGE.to_string());
            }
        }
        true
    }

    /// Starts a load and waits for it.
    pub async fn load(&mut self) -> bool {
        let pending = self.begin_load();
        let finished = pending.finish().await;
        self.complete_load(finished)
    }

    /// Submits to the current workflow; `None` while nothing is loaded.
    pub fn submit(&mut self, submission: Submission) -> Option<SubmitOutcome> {
        self.workflow
            .as_mut()
            .map(|workflow| workflow.submit(submission))
    }

    pub fn tutor_context(&self) -> TutorContext {
        match &self.workflow {
            Some(workflow) => TutorContext::Investigation {
                problem: workflow.problem().clone(),
                stage: workflow.current_stage(),
            },
            None => TutorContext::General,
        }
    }
}

impl<P> Drop for InvestigationRoom<P> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort();
        }
    }
}

async fn fetch_investigation<P: ContentProvider>(provider: &P, attempts: usize) -> LoadResult {
    let mut attempt = 1;
    loop {
        match provider.generate_investigation().await {
            Err(CollaboratorError::Contract(err)) if attempt < attempts => {
                warn!(%err, attempt, "provider returned degenerate lines, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use lineq_core::{DegenerateReason, LineEquation, LineError};
    use pretty_assertions::assert_eq;

    use super::{InvestigationRoom, LOAD_ERROR_MESSAGE, LoadState, RoomConfig};
    use crate::problem::{
        Difficulty, GameChallenge, InvestigationProblem, MathProblem, QuizQuestion, QuizResult,
        Questions,
    };
    use crate::provider::{CollaboratorError, ContentProvider, StaticContent};
    use crate::workflow::{Stage, StepId, SubmitOutcome, Submission};

    enum Scripted {
        Lines(f64, f64, f64, f64),
        Parallel,
        Down,
    }

    /// Replays investigation results in order, optionally after a delay.
    #[derive(Default)]
    struct ScriptedProvider {
        script: Mutex<VecDeque<(Duration, Scripted)>>,
        calls: AtomicUsize,
        finished: AtomicBool,
    }

    impl ScriptedProvider {
        fn with(mut self, delay: Duration, step: Scripted) -> Self {
            self.script
                .get_mut()
                .expect("script lock")
                .push_back((delay, step));
            self
        }
    }

    impl ContentProvider for ScriptedProvider {
        async fn generate_investigation(&self) -> Result<InvestigationProblem, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().expect("script lock").pop_front();
            let Some((delay, step)) = next else {
                return Err(CollaboratorError::Unavailable("script exhausted".into()));
            };
            tokio::time::sleep(delay).await;
            self.finished.store(true, Ordering::SeqCst);
            match step {
                Scripted::Lines(m1, b1, m2, b2) => Ok(InvestigationProblem::from_lines(
                    LineEquation::primary(m1, b1),
                    LineEquation::secondary(m2, b2),
                    Questions::default(),
                )?),
                Scripted::Parallel => Err(CollaboratorError::Contract(LineError::Degenerate(
                    DegenerateReason::ParallelLines,
                ))),
                Scripted::Down => Err(CollaboratorError::Unavailable("503".into())),
            }
        }

        async fn generate_problem(
            &self,
            difficulty: Difficulty,
        ) -> Result<MathProblem, CollaboratorError> {
            StaticContent.generate_problem(difficulty).await
        }

        async fn generate_game_challenge(&self) -> Result<GameChallenge, CollaboratorError> {
            StaticContent.generate_game_challenge().await
        }

        async fn generate_quiz(&self) -> Result<Vec<QuizQuestion>, CollaboratorError> {
            StaticContent.generate_quiz().await
        }

        async fn evaluate_quiz(
            &self,
            questions: Vec<QuizQuestion>,
            answers: BTreeMap<u32, String>,
        ) -> Result<QuizResult, CollaboratorError> {
            StaticContent.evaluate_quiz(questions, answers).await
        }
    }

    type ScriptedRoom = InvestigationRoom<ScriptedProvider>;

    fn scripted_room(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, ScriptedRoom) {
        let provider = Arc::new(provider);
        let room = InvestigationRoom::new(Arc::clone(&provider), RoomConfig::default());
        (provider, room)
    }

    const NOW: Duration = Duration::ZERO;

    #[tokio::test]
    async fn load_enters_slope_step() {
        let provider = ScriptedProvider::default().with(NOW, Scripted::Lines(1.0, -2.0, -1.0, 6.0));
        let (_, mut room) = scripted_room(provider);
        assert_eq!(room.state(), &LoadState::Loading);
        assert!(room.load().await);

        assert_eq!(room.state(), &LoadState::Ready);
        let workflow = room.workflow().expect("workflow after load");
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Slope));
        assert_eq!(
            room.submit(Submission::Slope { value: "1".into() }),
            Some(SubmitOutcome::Advanced(StepId::Equation))
        );
    }

    #[tokio::test]
    async fn degenerate_content_is_requested_again() {
        let (provider, mut room) = scripted_room(
            ScriptedProvider::default()
                .with(NOW, Scripted::Parallel)
                .with(NOW, Scripted::Parallel)
                .with(NOW, Scripted::Lines(2.0, 1.0, -1.0, 4.0)),
        );
        assert!(room.load().await);
        assert_eq!(room.state(), &LoadState::Ready);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (provider, mut room) = scripted_room(
            ScriptedProvider::default()
                .with(NOW, Scripted::Parallel)
                .with(NOW, Scripted::Parallel)
                .with(NOW, Scripted::Parallel)
                .with(NOW, Scripted::Lines(2.0, 1.0, -1.0, 4.0)),
        );
        assert!(room.load().await);
        assert_eq!(room.state(), &LoadState::Failed(LOAD_ERROR_MESSAGE.to_string()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(room.workflow().is_none());

        // Failed rooms can retry.
        assert!(room.load().await);
        assert_eq!(room.state(), &LoadState::Ready);
    }

    #[tokio::test]
    async fn unavailable_provider_fails_without_retry() {
        let (provider, mut room) =
            scripted_room(ScriptedProvider::default().with(NOW, Scripted::Down));
        assert!(room.load().await);
        assert_eq!(room.state(), &LoadState::Failed(LOAD_ERROR_MESSAGE.to_string()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(room.submit(Submission::Slope { value: "1".into() }), None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_load_cancels_older_one() {
        let (_, mut room) = scripted_room(
            ScriptedProvider::default()
                .with(Duration::from_secs(5), Scripted::Lines(1.0, -2.0, -1.0, 6.0))
                .with(Duration::from_millis(10), Scripted::Lines(2.0, 1.0, -1.0, 4.0)),
        );

        let first = room.begin_load();
        tokio::task::yield_now().await;
        let second = room.begin_load();
        assert!(second.ticket() > first.ticket());

        let first = first.finish().await;
        assert!(!room.complete_load(first), "cancelled load must not apply");
        assert_eq!(room.state(), &LoadState::Loading);

        let second = second.finish().await;
        assert!(room.complete_load(second));
        let workflow = room.workflow().expect("second problem loaded");
        assert_eq!(workflow.problem().line1.slope, 2.0);
    }

    #[tokio::test]
    async fn stale_result_is_rejected_by_ticket() {
        let (_, mut room) = scripted_room(
            ScriptedProvider::default()
                .with(NOW, Scripted::Lines(1.0, -2.0, -1.0, 6.0))
                .with(NOW, Scripted::Lines(2.0, 1.0, -1.0, 4.0)),
        );

        // Let the first request finish before a restart supersedes it.
        let first = room.begin_load().finish().await;
        let second = room.begin_load();

        assert!(!room.complete_load(first));
        assert!(room.complete_load(second.finish().await));
        let workflow = room.workflow().expect("loaded");
        assert_eq!(workflow.problem().line1.slope, 2.0);
    }

    #[tokio::test]
    async fn restart_discards_progress() {
        let (_, mut room) = scripted_room(
            ScriptedProvider::default()
                .with(NOW, Scripted::Lines(1.0, -2.0, -1.0, 6.0))
                .with(NOW, Scripted::Lines(1.0, -2.0, -1.0, 6.0)),
        );
        room.load().await;
        room.submit(Submission::Slope { value: "1".into() });

        room.load().await;
        let workflow = room.workflow().expect("reloaded");
        assert_eq!(workflow.current_stage(), Stage::Active(StepId::Slope));
        assert!(workflow.input(StepId::Slope).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_room_aborts_its_request() {
        let slow = Scripted::Lines(1.0, -2.0, -1.0, 6.0);
        let (provider, mut room) =
            scripted_room(ScriptedProvider::default().with(Duration::from_secs(5), slow));
        let pending = room.begin_load();
        tokio::task::yield_now().await;
        drop(room);

        let _ = pending.finish().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!provider.finished.load(Ordering::SeqCst));
    }
}
