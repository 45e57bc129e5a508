use serde::{Deserialize, Serialize};

pub const DEFAULT_ITEMS_PER_SESSION: usize = 5;
pub const DEFAULT_TIME_LIMIT_SEC: u32 = 60;
pub const DEFAULT_MAX_ERRORS: usize = 5;
pub const DEFAULT_MIN_ACCURACY: u32 = 95;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Language {
    #[default]
    Korean,
    English,
}

impl Language {
    /// Two letter code used by the remote API
    pub fn api_code(&self) -> &'static str {
        match self {
            Language::Korean => "ko",
            Language::English => "en",
        }
    }
}

/// Mode tag without any per-mode settings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModeKind {
    Sentence,
    Word,
    TimeAttack,
    AccuracyChallenge,
    KorDrill,
    WeaknessDrill,
}

impl ModeKind {
    /// Timed modes end the session with their single item
    pub fn is_time_bounded(&self) -> bool {
        matches!(self, ModeKind::TimeAttack | ModeKind::AccuracyChallenge)
    }
}

/// A practice mode together with the settings only that mode understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PracticeMode {
    #[serde(rename_all = "camelCase")]
    Sentence { items_per_session: usize },
    #[serde(rename_all = "camelCase")]
    Word { items_per_session: usize },
    #[serde(rename_all = "camelCase")]
    TimeAttack { time_limit_sec: u32 },
    #[serde(rename_all = "camelCase")]
    AccuracyChallenge { max_errors: usize, min_accuracy: u32 },
    #[serde(rename_all = "camelCase")]
    KorDrill { items_per_session: usize },
    #[serde(rename_all = "camelCase")]
    WeaknessDrill {
        items_per_session: usize,
        #[serde(default)]
        weak_chars: Vec<char>,
    },
}

impl Default for PracticeMode {
    fn default() -> Self {
        PracticeMode::defaults_for(ModeKind::Sentence)
    }
}

impl PracticeMode {
    pub fn defaults_for(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Sentence => PracticeMode::Sentence {
                items_per_session: DEFAULT_ITEMS_PER_SESSION,
            },
            ModeKind::Word => PracticeMode::Word {
                items_per_session: DEFAULT_ITEMS_PER_SESSION,
            },
            ModeKind::TimeAttack => PracticeMode::TimeAttack {
                time_limit_sec: DEFAULT_TIME_LIMIT_SEC,
            },
            ModeKind::AccuracyChallenge => PracticeMode::AccuracyChallenge {
                max_errors: DEFAULT_MAX_ERRORS,
                min_accuracy: DEFAULT_MIN_ACCURACY,
            },
            ModeKind::KorDrill => PracticeMode::KorDrill {
                items_per_session: DEFAULT_ITEMS_PER_SESSION,
            },
            ModeKind::WeaknessDrill => PracticeMode::WeaknessDrill {
                items_per_session: DEFAULT_ITEMS_PER_SESSION,
                weak_chars: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            PracticeMode::Sentence { .. } => ModeKind::Sentence,
            PracticeMode::Word { .. } => ModeKind::Word,
            PracticeMode::TimeAttack { .. } => ModeKind::TimeAttack,
            PracticeMode::AccuracyChallenge { .. } => ModeKind::AccuracyChallenge,
            PracticeMode::KorDrill { .. } => ModeKind::KorDrill,
            PracticeMode::WeaknessDrill { .. } => ModeKind::WeaknessDrill,
        }
    }

    pub fn items_per_session(&self) -> Option<usize> {
        match self {
            PracticeMode::Sentence { items_per_session }
            | PracticeMode::Word { items_per_session }
            | PracticeMode::KorDrill { items_per_session }
            | PracticeMode::WeaknessDrill {
                items_per_session, ..
            } => Some(*items_per_session),
            PracticeMode::TimeAttack { .. } | PracticeMode::AccuracyChallenge { .. } => None,
        }
    }

    fn with_items_per_session(self, count: usize) -> Self {
        match self {
            PracticeMode::Sentence { .. } => PracticeMode::Sentence {
                items_per_session: count,
            },
            PracticeMode::Word { .. } => PracticeMode::Word {
                items_per_session: count,
            },
            PracticeMode::KorDrill { .. } => PracticeMode::KorDrill {
                items_per_session: count,
            },
            PracticeMode::WeaknessDrill { weak_chars, .. } => PracticeMode::WeaknessDrill {
                items_per_session: count,
                weak_chars,
            },
            timed => timed,
        }
    }
}

/// Everything that stays fixed for the duration of one session.
///
/// Only built through [`PracticeSettings::new`], so stored or deserialized
/// settings obey the same rules as ones chosen interactively.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct PracticeSettings {
    #[serde(flatten)]
    mode: PracticeMode,
    language: Language,
}

#[derive(Deserialize)]
struct RawSettings {
    #[serde(flatten)]
    mode: PracticeMode,
    language: Language,
}

impl From<RawSettings> for PracticeSettings {
    fn from(raw: RawSettings) -> Self {
        PracticeSettings::new(raw.mode, raw.language)
    }
}

impl PracticeSettings {
    pub fn new(mode: PracticeMode, language: Language) -> Self {
        let mode = match mode.items_per_session() {
            Some(count) => mode.with_items_per_session(count.max(1)),
            None => mode,
        };
        let mut settings = Self { mode, language };
        settings.enforce_language();
        settings
    }

    pub fn mode(&self) -> &PracticeMode {
        &self.mode
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn kind(&self) -> ModeKind {
        self.mode.kind()
    }

    /// Switches to `kind` with that mode's defaults, keeping the item count
    /// when both the old and the new mode are item based.
    pub fn select_mode(&mut self, kind: ModeKind) {
        let mut mode = PracticeMode::defaults_for(kind);
        if let Some(count) = self.mode.items_per_session() {
            mode = mode.with_items_per_session(count);
        }
        self.mode = mode;
        self.enforce_language();
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        self.enforce_language();
    }

    pub fn set_items_per_session(&mut self, count: usize) {
        self.mode = self.mode.clone().with_items_per_session(count.max(1));
    }

    // Korean drills only exist in Korean
    fn enforce_language(&mut self) {
        if self.kind() == ModeKind::KorDrill {
            self.language = Language::Korean;
        }
    }

    /// The subset of settings recorded alongside a session result
    pub fn snapshot(&self) -> SettingsSnapshot {
        let mut snapshot = SettingsSnapshot {
            items_per_session: self.mode.items_per_session(),
            ..SettingsSnapshot::default()
        };
        match &self.mode {
            PracticeMode::TimeAttack { time_limit_sec } => {
                snapshot.time_limit_sec = Some(*time_limit_sec);
            }
            PracticeMode::AccuracyChallenge {
                max_errors,
                min_accuracy,
            } => {
                snapshot.max_errors = Some(*max_errors);
                snapshot.min_accuracy = Some(*min_accuracy);
            }
            PracticeMode::Sentence { .. }
            | PracticeMode::Word { .. }
            | PracticeMode::KorDrill { .. }
            | PracticeMode::WeaknessDrill { .. } => {}
        }
        snapshot
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_sec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_accuracy: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_session: Option<usize>,
}
