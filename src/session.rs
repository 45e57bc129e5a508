use crate::clock::{Clock, SystemClock};
use crate::evaluator::{CompletionReason, ItemCompletion, TypingEvaluator};
use crate::queue::build_queue;
use crate::settings::{Language, ModeKind, PracticeSettings, SettingsSnapshot};
use crate::stats::{analyze_attempts, ErrorAnalysisItem, TypingStats};
use crate::transport::TextItem;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultExtra {
    pub fail_reason: Option<CompletionReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub submode: ModeKind,
    pub settings: SettingsSnapshot,
    pub result_extra: ResultExtra,
}

/// Final outcome of a practice session, handed to result reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub stats: TypingStats,
    pub text: String,
    pub user_input: String,
    pub language: Language,
    pub mode: ModeKind,
    pub settings: PracticeSettings,
    pub metadata: SessionMetadata,
    #[serde(default)]
    pub error_analysis: Vec<ErrorAnalysisItem>,
}

impl SessionResult {
    pub fn fail_reason(&self) -> Option<CompletionReason> {
        self.metadata.result_extra.fail_reason
    }

    /// The characters missed most often, for a follow-up weakness drill
    pub fn weak_chars(&self, limit: usize) -> Vec<char> {
        let mut chars: Vec<char> = Vec::new();
        for item in &self.error_analysis {
            if !item.expected.is_whitespace() && !chars.contains(&item.expected) {
                chars.push(item.expected);
            }
        }
        chars.truncate(limit);
        chars
    }
}

/// Progress through one session's item queue.
///
/// Every transition consumes the state and returns the next one, so the
/// aggregation can be exercised without an evaluator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    item_queue: Vec<String>,
    current_index: usize,
    cumulative: TypingStats,
    items_folded: usize,
    all_typed: String,
    // (target, typed) for every folded item
    attempts: Vec<(String, String)>,
}

impl SessionState {
    pub fn new(item_queue: Vec<String>) -> Self {
        Self {
            item_queue,
            ..Self::default()
        }
    }

    /// Adds the current item's result to the session totals
    pub fn fold(mut self, stats: &TypingStats, typed: &str) -> Self {
        self.cumulative = self.cumulative.merge_item(self.items_folded, stats);
        self.items_folded += 1;
        if !self.all_typed.is_empty() {
            self.all_typed.push(' ');
        }
        self.all_typed.push_str(typed);
        let target = self.current_text().unwrap_or_default().to_string();
        self.attempts.push((target, typed.to_string()));
        self
    }

    /// Moves to the next item; stays put past the end of the queue
    pub fn advance(mut self) -> Self {
        if self.current_index < self.item_queue.len() {
            self.current_index += 1;
        }
        self
    }

    pub fn has_next(&self) -> bool {
        self.current_index + 1 < self.item_queue.len()
    }

    pub fn current_text(&self) -> Option<&str> {
        self.item_queue.get(self.current_index).map(String::as_str)
    }

    pub fn item_queue(&self) -> &[String] {
        &self.item_queue
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn cumulative(&self) -> &TypingStats {
        &self.cumulative
    }

    pub fn items_folded(&self) -> usize {
        self.items_folded
    }

    pub fn all_typed(&self) -> &str {
        &self.all_typed
    }

    pub fn error_analysis(&self) -> Vec<ErrorAnalysisItem> {
        analyze_attempts(
            self.attempts
                .iter()
                .map(|(target, typed)| (typed.as_str(), target.as_str())),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pathway {
    /// Items are completed one after another and averaged
    ItemSequenced,
    /// The first item completion, for any reason, ends the session
    TimeBounded,
}

impl From<ModeKind> for Pathway {
    fn from(kind: ModeKind) -> Self {
        if kind.is_time_bounded() {
            Pathway::TimeBounded
        } else {
            Pathway::ItemSequenced
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Nothing changed at the session level
    Continue,
    /// The next item, at this index, is now current
    Advanced(usize),
    Finished(Box<SessionResult>),
}

/// Sequences the items of one session and aggregates their results
#[derive(Debug)]
pub struct SessionOrchestrator<C: Clock = SystemClock> {
    settings: PracticeSettings,
    pathway: Pathway,
    state: SessionState,
    evaluator: TypingEvaluator<C>,
    finished: bool,
}

impl SessionOrchestrator<SystemClock> {
    pub fn start(settings: PracticeSettings, supplied: &[TextItem]) -> Self {
        Self::start_with(settings, supplied, &mut rand::thread_rng(), SystemClock)
    }
}

impl<C: Clock> SessionOrchestrator<C> {
    pub fn start_with<R: Rng + ?Sized>(
        settings: PracticeSettings,
        supplied: &[TextItem],
        rng: &mut R,
        clock: C,
    ) -> Self {
        let queue = build_queue(&settings, supplied, rng);
        Self::with_queue(settings, queue, clock)
    }

    /// Starts a session over an explicit queue
    pub fn with_queue(settings: PracticeSettings, mut queue: Vec<String>, clock: C) -> Self {
        let pathway = Pathway::from(settings.kind());
        if pathway == Pathway::TimeBounded {
            queue.truncate(1);
        }
        if queue.is_empty() {
            warn!(mode = %settings.kind(), "starting a session without any items");
        }

        let state = SessionState::new(queue);
        let first = state.current_text().unwrap_or_default().to_string();
        let evaluator = TypingEvaluator::with_clock(first, settings.mode().clone(), clock);
        debug!(mode = %settings.kind(), items = state.item_queue().len(), "session started");

        Self {
            settings,
            pathway,
            state,
            evaluator,
            finished: false,
        }
    }

    pub fn handle_input(&mut self, value: &str) -> SessionEvent {
        if self.is_inert() {
            return SessionEvent::Continue;
        }
        match self.evaluator.handle_input(value) {
            Some(completion) => self.on_item_complete(completion),
            None => SessionEvent::Continue,
        }
    }

    pub fn on_tick(&mut self) -> SessionEvent {
        if self.is_inert() {
            return SessionEvent::Continue;
        }
        match self.evaluator.on_tick() {
            Some(completion) => self.on_item_complete(completion),
            None => SessionEvent::Continue,
        }
    }

    /// Moves past the current item without counting it. Skipping the last
    /// item finishes the session with whatever was typed so far.
    pub fn skip(&mut self) -> SessionEvent {
        if self.is_inert() || self.pathway != Pathway::ItemSequenced {
            return SessionEvent::Continue;
        }

        if self.state.has_next() {
            return self.advance();
        }

        let stats = *self.evaluator.stats();
        let typed = self.evaluator.input().to_string();
        self.state = std::mem::take(&mut self.state).fold(&stats, &typed);
        self.finalize(None)
    }

    /// Starts the current item over
    pub fn restart_item(&mut self) {
        if !self.finished {
            self.evaluator.reset();
        }
    }

    // A session without items has nothing to finish
    fn is_inert(&self) -> bool {
        self.finished || self.state.item_queue().is_empty()
    }

    fn on_item_complete(&mut self, completion: ItemCompletion) -> SessionEvent {
        self.state =
            std::mem::take(&mut self.state).fold(&completion.stats, &completion.input);

        match self.pathway {
            Pathway::TimeBounded => self.finalize(completion.reason.fail_reason()),
            Pathway::ItemSequenced if self.state.has_next() => self.advance(),
            Pathway::ItemSequenced => self.finalize(None),
        }
    }

    fn advance(&mut self) -> SessionEvent {
        self.state = std::mem::take(&mut self.state).advance();
        let next = self.state.current_text().unwrap_or_default().to_string();
        self.evaluator.load(next);
        debug!(index = self.state.current_index(), "advanced to next item");
        SessionEvent::Advanced(self.state.current_index())
    }

    fn finalize(&mut self, fail_reason: Option<CompletionReason>) -> SessionEvent {
        self.finished = true;

        let separator = match self.settings.kind() {
            ModeKind::Word => " ",
            _ => "\n",
        };
        let kind = self.settings.kind();
        let result = SessionResult {
            stats: *self.state.cumulative(),
            text: self.state.item_queue().join(separator),
            user_input: self.state.all_typed().to_string(),
            language: self.settings.language(),
            mode: kind,
            settings: self.settings.clone(),
            metadata: SessionMetadata {
                submode: kind,
                settings: self.settings.snapshot(),
                result_extra: ResultExtra { fail_reason },
            },
            error_analysis: self.state.error_analysis(),
        };

        info!(
            mode = %kind,
            wpm = result.stats.wpm,
            accuracy = result.stats.accuracy,
            items = self.state.items_folded(),
            fail_reason = ?fail_reason,
            "session finished"
        );
        SessionEvent::Finished(Box::new(result))
    }

    pub fn settings(&self) -> &PracticeSettings {
        &self.settings
    }

    pub fn pathway(&self) -> Pathway {
        self.pathway
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn evaluator(&self) -> &TypingEvaluator<C> {
        &self.evaluator
    }

    pub fn current_text(&self) -> &str {
        self.evaluator.target()
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index()
    }

    pub fn total_items(&self) -> usize {
        self.state.item_queue().len()
    }

    /// Live statistics of the item being typed
    pub fn live_stats(&self) -> &TypingStats {
        self.evaluator.stats()
    }

    pub fn remaining_time(&self) -> Option<f64> {
        self.evaluator.remaining_time()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the periodic tick should be delivered right now
    pub fn is_ticking(&self) -> bool {
        !self.is_inert() && self.evaluator.is_ticking()
    }
}
