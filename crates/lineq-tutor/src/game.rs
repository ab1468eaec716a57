use std::time::Duration;

use lineq_core::answer_equals;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::problem::{Answer, ChallengeDifficulty, ChallengeKind, GameChallenge};

pub const HARD_ROUND: Duration = Duration::from_secs(45);
pub const STANDARD_ROUND: Duration = Duration::from_secs(60);
const TICK: Duration = Duration::from_secs(1);
const MAX_BUFFERED_TICKS: u64 = 3600;

pub fn round_length(difficulty: ChallengeDifficulty) -> Duration {
    match difficulty {
        ChallengeDifficulty::Hard => HARD_ROUND,
        ChallengeDifficulty::Easy => STANDARD_ROUND,
    }
}

/// True-false and multiple-choice answers must match exactly; open answers
/// compare numerically when they can.
pub fn check_answer(challenge: &GameChallenge, submitted: &Answer) -> bool {
    match challenge.kind {
        ChallengeKind::TrueFalse | ChallengeKind::MultipleChoice => {
            *submitted == challenge.correct_answer
        }
        ChallengeKind::OpenAnswer => {
            answer_equals(&submitted.to_text(), &challenge.correct_answer.to_text())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimerEvent {
    Tick { remaining: u64 },
    Expired,
}

/// Countdown running on its own task. The task is aborted when the timer is
/// cancelled or dropped. The channel holds every tick of the round, so the
/// countdown keeps time even when nobody reads it.
#[derive(Debug)]
pub struct RoundTimer {
    handle: JoinHandle<()>,
    events: mpsc::Receiver<TimerEvent>,
}

impl RoundTimer {
    pub fn start(length: Duration) -> Self {
        let capacity = length.as_secs().clamp(1, MAX_BUFFERED_TICKS) as usize;
        let (tx, events) = mpsc::channel(capacity);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // The first tick completes immediately.
            interval.tick().await;

            let mut remaining = length.as_secs();
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                let event = if remaining == 0 {
                    TimerEvent::Expired
                } else {
                    TimerEvent::Tick { remaining }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Self { handle, events }
    }

    /// Next tick, or `None` once the countdown is over or cancelled.
    pub async fn next_event(&mut self) -> Option<TimerEvent> {
        self.events.recv().await
    }

    /// A tick that has already arrived, without waiting.
    pub fn try_next_event(&mut self) -> Result<TimerEvent, TryRecvError> {
        self.events.try_recv()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Playing,
    Correct,
    Wrong,
    TimedOut,
}

/// One timed game challenge.
#[derive(Debug)]
pub struct GameRound {
    challenge: GameChallenge,
    timer: Option<RoundTimer>,
    remaining: u64,
    status: RoundStatus,
}

impl GameRound {
    pub fn start(challenge: GameChallenge) -> Self {
        let length = round_length(challenge.difficulty);
        Self {
            timer: Some(RoundTimer::start(length)),
            remaining: length.as_secs(),
            status: RoundStatus::Playing,
            challenge,
        }
    }

    pub fn challenge(&self) -> &GameChallenge {
        &self.challenge
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn timer_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Grades the answer and stops the clock. Answers after the round is
    /// over, including after a timeout, are ignored.
    pub fn answer(&mut self, submitted: &Answer) -> RoundStatus {
        self.catch_up();
        if self.status != RoundStatus::Playing {
            return self.status;
        }
        self.timer = None;
        self.status = if check_answer(&self.challenge, submitted) {
            RoundStatus::Correct
        } else {
            RoundStatus::Wrong
        };
        debug!(status = ?self.status, remaining = self.remaining, "game round answered");
        self.status
    }

    /// Waits for the next tick and applies it. `None` once the clock is stopped.
    pub async fn next_event(&mut self) -> Option<TimerEvent> {
        let event = self.timer.as_mut()?.next_event().await;
        self.apply(event);
        event
    }

    /// Applies every tick that has already arrived and returns the status.
    pub fn catch_up(&mut self) -> RoundStatus {
        while let Some(timer) = self.timer.as_mut() {
            match timer.try_next_event() {
                Ok(event) => self.apply(Some(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.apply(None),
            }
        }
        self.status
    }

    fn apply(&mut self, event: Option<TimerEvent>) {
        match event {
            Some(TimerEvent::Tick { remaining }) => self.remaining = remaining,
            Some(TimerEvent::Expired) => {
                self.remaining = 0;
                self.status = RoundStatus::TimedOut;
                self.timer = None;
                debug!("game round timed out");
            }
            None => self.timer = None,
        }
    }
}
