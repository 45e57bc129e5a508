use crate::session::SessionResult;
use crate::stats::TypingStats;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Weighted score of speed and accuracy
    pub fn score(stats: &TypingStats) -> f64 {
        stats.wpm as f64 * 0.6 + stats.accuracy as f64 * 0.4
    }

    pub fn for_stats(stats: &TypingStats) -> Self {
        match Self::score(stats) {
            s if s >= 90.0 => Grade::S,
            s if s >= 80.0 => Grade::A,
            s if s >= 70.0 => Grade::B,
            s if s >= 60.0 => Grade::C,
            s if s >= 50.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::S => "Master",
            Grade::A => "Expert",
            Grade::B => "Skilled",
            Grade::C => "Intermediate",
            Grade::D => "Beginner",
            Grade::F => "Needs practice",
        }
    }
}

pub fn feedback(stats: &TypingStats) -> &'static str {
    match (stats.wpm, stats.accuracy) {
        (wpm, acc) if wpm >= 80 && acc >= 95 => "Outstanding! You type like a master.",
        (wpm, acc) if wpm >= 60 && acc >= 90 => {
            "Great work! Keep practicing and you will get even better."
        }
        (_, acc) if acc >= 95 => "Excellent accuracy! Try picking up the pace a little.",
        (wpm, _) if wpm >= 50 => "Nice speed! Focus on accuracy to make it perfect.",
        _ => "A good start! Steady practice builds skill.",
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("no session result to display")]
    MissingResult,
}

/// What a result screen shows for a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub grade: Grade,
    pub score: f64,
    pub feedback: &'static str,
    pub stats: TypingStats,
    pub text: String,
}

impl ResultSummary {
    /// A result view reached without a result cannot be repaired; the caller
    /// should navigate away instead.
    pub fn from_result(result: Option<&SessionResult>) -> Result<Self, ReportError> {
        let result = result.ok_or(ReportError::MissingResult)?;
        Ok(Self {
            grade: Grade::for_stats(&result.stats),
            score: Grade::score(&result.stats),
            feedback: feedback(&result.stats),
            stats: result.stats,
            text: result.text.clone(),
        })
    }
}
