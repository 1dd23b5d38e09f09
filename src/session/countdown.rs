use time::OffsetDateTime;

use crate::core::time::seconds_between;
use crate::schemas::{Exam, ExamAttempt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Inactive,
    Running { remaining: u64 },
    Expired,
    Stopped,
}

/// Result of driving the countdown by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Running { remaining: u64 },
    Expired,
}

/// Exam countdown in whole seconds, advanced by an external one-second tick.
#[derive(Debug, Clone)]
pub struct Countdown {
    state: CountdownState,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        Self { state: CountdownState::Inactive }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn remaining(&self) -> Option<u64> {
        match self.state {
            CountdownState::Running { remaining } => Some(remaining),
            CountdownState::Expired => Some(0),
            CountdownState::Inactive | CountdownState::Stopped => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.state == CountdownState::Expired
    }

    /// Starts from `remaining` seconds. Only an inactive countdown can start; a zero
    /// duration expires at once.
    pub fn start(&mut self, remaining: u64) -> Tick {
        if self.state != CountdownState::Inactive {
            return Tick::Idle;
        }

        if remaining == 0 {
            self.state = CountdownState::Expired;
            return Tick::Expired;
        }

        self.state = CountdownState::Running { remaining };
        Tick::Running { remaining }
    }

    /// Reports `Expired` exactly once, on the tick that reaches zero.
    pub fn tick(&mut self) -> Tick {
        let CountdownState::Running { remaining } = self.state else {
            return Tick::Idle;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.state = CountdownState::Expired;
            return Tick::Expired;
        }

        self.state = CountdownState::Running { remaining };
        Tick::Running { remaining }
    }

    pub fn stop(&mut self) {
        if self.state != CountdownState::Expired {
            self.state = CountdownState::Stopped;
        }
    }
}

/// Seconds left for an attempt at `now`.
///
/// An attempt with a recorded start and duration snapshot counts down from wall time,
/// however it was found, so reopening the client never adds time. Without both the exam
/// duration is used. Either way the exam close time, when set, caps the result.
pub fn derive_remaining(exam: &Exam, attempt: &ExamAttempt, now: OffsetDateTime) -> u64 {
    let base = match (attempt.started_at, attempt.duration_seconds()) {
        (Some(started_at), Some(duration)) => {
            duration.saturating_sub(seconds_between(started_at, now))
        }
        _ => exam.duration_seconds(),
    };

    match exam.close_at {
        Some(close_at) => base.min(seconds_between(now, close_at)),
        None => base,
    }
}
