use crate::clock::{Clock, SystemClock};
use crate::settings::PracticeMode;
use crate::stats::{compute, TypingStats};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Below this many typed characters a low accuracy does not end an
/// accuracy challenge.
pub const MIN_ACCURACY_GUARD_LEN: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompletionReason {
    Completed,
    TimeUp,
    MaxErrors,
    MinAccuracy,
}

impl CompletionReason {
    /// The tag recorded as a session's fail reason; a regular completion has none
    pub fn fail_reason(self) -> Option<CompletionReason> {
        match self {
            CompletionReason::Completed => None,
            other => Some(other),
        }
    }
}

/// Emitted exactly once when an item finishes
#[derive(Clone, Debug, PartialEq)]
pub struct ItemCompletion {
    pub stats: TypingStats,
    pub reason: CompletionReason,
    pub input: String,
}

/// Live evaluation of one text item being typed
#[derive(Debug)]
pub struct TypingEvaluator<C: Clock = SystemClock> {
    target: String,
    input: String,
    mode: PracticeMode,
    phase: Phase,
    started_at: Option<Instant>,
    stats: TypingStats,
    remaining_time: Option<f64>,
    reason: Option<CompletionReason>,
    clock: C,
}

impl TypingEvaluator<SystemClock> {
    pub fn new(target: impl Into<String>, mode: PracticeMode) -> Self {
        Self::with_clock(target, mode, SystemClock)
    }
}

impl<C: Clock> TypingEvaluator<C> {
    pub fn with_clock(target: impl Into<String>, mode: PracticeMode, clock: C) -> Self {
        let remaining_time = initial_remaining_time(&mode);
        Self {
            target: target.into(),
            input: String::new(),
            mode,
            phase: Phase::Idle,
            started_at: None,
            stats: TypingStats::default(),
            remaining_time,
            reason: None,
            clock,
        }
    }

    /// Replaces the input buffer with `value` and re-evaluates.
    ///
    /// Returns the completion the first time a terminating condition holds;
    /// after that every call is a no-op.
    pub fn handle_input(&mut self, value: &str) -> Option<ItemCompletion> {
        if self.phase == Phase::Finished {
            return None;
        }

        if self.phase == Phase::Idle && !value.is_empty() {
            self.phase = Phase::Active;
            self.started_at = Some(self.clock.now());
            debug!(target_len = self.target.chars().count(), "item started");
        }

        self.input.clear();
        self.input.push_str(value);
        self.stats = compute(&self.input, &self.target, self.elapsed_secs());

        // an item that was never started cannot complete
        if self.phase == Phase::Idle {
            return None;
        }
        let reason = self.completion_reason_for_input()?;
        Some(self.finish(reason))
    }

    /// Periodic re-evaluation while the item is active. A tick in any other
    /// phase does nothing.
    pub fn on_tick(&mut self) -> Option<ItemCompletion> {
        if self.phase != Phase::Active {
            return None;
        }

        let elapsed = self.elapsed_secs();
        if let PracticeMode::TimeAttack { time_limit_sec } = self.mode {
            let remaining = time_limit_sec as f64 - elapsed;
            self.remaining_time = Some(remaining.max(0.0));
            if remaining <= 0.0 {
                return Some(self.finish(CompletionReason::TimeUp));
            }
        }

        self.stats = compute(&self.input, &self.target, elapsed);
        None
    }

    /// Back to idle on the same target
    pub fn reset(&mut self) {
        self.input.clear();
        self.phase = Phase::Idle;
        self.started_at = None;
        self.stats = TypingStats::default();
        self.remaining_time = initial_remaining_time(&self.mode);
        self.reason = None;
    }

    /// Resets onto a new target text
    pub fn load(&mut self, target: impl Into<String>) {
        self.target = target.into();
        self.reset();
    }

    fn completion_reason_for_input(&self) -> Option<CompletionReason> {
        if let PracticeMode::AccuracyChallenge {
            max_errors,
            min_accuracy,
        } = self.mode
        {
            if max_errors > 0 && self.stats.errors >= max_errors {
                return Some(CompletionReason::MaxErrors);
            }
            if self.stats.accuracy < min_accuracy
                && self.input.chars().count() > MIN_ACCURACY_GUARD_LEN
            {
                return Some(CompletionReason::MinAccuracy);
            }
        }

        let done = match self.mode {
            // a word is done once typing runs past its end
            PracticeMode::Word { .. } => self.input.chars().count() > self.target.chars().count(),
            _ => self.input == self.target,
        };
        done.then_some(CompletionReason::Completed)
    }

    fn finish(&mut self, reason: CompletionReason) -> ItemCompletion {
        self.stats = compute(&self.input, &self.target, self.elapsed_secs());
        self.phase = Phase::Finished;
        self.reason = Some(reason);
        if reason == CompletionReason::TimeUp {
            self.remaining_time = Some(0.0);
        }
        debug!(%reason, wpm = self.stats.wpm, accuracy = self.stats.accuracy, "item finished");

        ItemCompletion {
            stats: self.stats,
            reason,
            input: self.input.clone(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started_at
            .map_or(0.0, |start| self.clock.elapsed_secs(start))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn stats(&self) -> &TypingStats {
        &self.stats
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn has_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Whether the periodic tick should currently be scheduled
    pub fn is_ticking(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn remaining_time(&self) -> Option<f64> {
        self.remaining_time
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.reason
    }

    /// Share of the target covered by the input, capped at 1.0
    pub fn progress(&self) -> f64 {
        let target_len = self.target.chars().count();
        if target_len == 0 {
            return 0.0;
        }
        (self.input.chars().count() as f64 / target_len as f64).min(1.0)
    }
}

fn initial_remaining_time(mode: &PracticeMode) -> Option<f64> {
    match mode {
        PracticeMode::TimeAttack { time_limit_sec } => Some(*time_limit_sec as f64),
        _ => None,
    }
}
