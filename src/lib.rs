// Typing practice engine: live per-keystroke statistics, mode-aware practice
// sessions, and session persistence with a local fallback queue.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod corpus;
pub mod evaluator;
pub mod persistence;
pub mod queue;
pub mod report;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod stats;
pub mod transport;
pub mod util;

/// Cadence of evaluator ticks
pub const TICK_RATE_MS: u64 = 100;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigStore, FileConfigStore};
pub use evaluator::{CompletionReason, ItemCompletion, Phase, TypingEvaluator};
pub use persistence::{PendingStore, PersistenceGateway, StoreError, SyncReport};
pub use session::{SessionEvent, SessionOrchestrator, SessionResult, SessionState};
pub use settings::{Language, ModeKind, PracticeMode, PracticeSettings};
pub use stats::TypingStats;
pub use transport::{ApiClient, SessionStore, TextSource, TransportError};
