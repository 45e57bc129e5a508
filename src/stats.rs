use crate::util::{percentage, running_mean};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Snapshot of typing performance for one item or a whole session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStats {
    pub wpm: u32,
    pub accuracy: u32,
    /// elapsed seconds
    pub time: f64,
    pub correct_chars: usize,
    pub total_chars: usize,
    pub errors: usize,
}

impl Default for TypingStats {
    fn default() -> Self {
        Self {
            wpm: 0,
            accuracy: 100,
            time: 0.0,
            correct_chars: 0,
            total_chars: 0,
            errors: 0,
        }
    }
}

impl TypingStats {
    /// Folds one finished item into session totals that already cover
    /// `items_folded` items. `wpm` and `accuracy` are a plain per-item mean,
    /// the counters and time are summed.
    pub fn merge_item(&self, items_folded: usize, item: &TypingStats) -> TypingStats {
        TypingStats {
            wpm: running_mean(self.wpm, items_folded, item.wpm),
            accuracy: running_mean(self.accuracy, items_folded, item.accuracy),
            time: self.time + item.time,
            correct_chars: self.correct_chars + item.correct_chars,
            total_chars: self.total_chars + item.total_chars,
            errors: self.errors + item.errors,
        }
    }

    /// Correct characters per minute, zero before any time has elapsed
    pub fn cpm(&self) -> u32 {
        if self.time > 0.0 {
            (self.correct_chars as f64 / (self.time / 60.0)).round() as u32
        } else {
            0
        }
    }

    pub fn duration_ms(&self) -> u64 {
        (self.time * 1000.0).round() as u64
    }
}

/// Number of whitespace separated words in `text`
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Compares `typed` against `target` position by position.
///
/// Every typed position is either correct or an error; positions past the end
/// of `target` are errors. Empty input counts as 100% accurate.
pub fn compute(typed: &str, target: &str, elapsed_secs: f64) -> TypingStats {
    let mut expected = target.chars();
    let (correct, total) = typed.chars().fold((0, 0), |(correct, total), c| {
        match expected.next() {
            Some(e) if e == c => (correct + 1, total + 1),
            _ => (correct, total + 1),
        }
    });

    let minutes = elapsed_secs / 60.0;
    let wpm = if minutes > 0.0 {
        (word_count(typed) as f64 / minutes).round() as u32
    } else {
        0
    };

    TypingStats {
        wpm,
        accuracy: percentage(correct, total).unwrap_or(100),
        time: elapsed_secs.max(0.0),
        correct_chars: correct,
        total_chars: total,
        errors: total - correct,
    }
}

/// One kind of mistake: `typed` was entered where `expected` belonged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAnalysisItem {
    #[serde(rename = "char")]
    pub typed: char,
    pub expected: char,
    pub count: usize,
}

/// Groups positional mismatches between `typed` and `target`, most frequent
/// first. Extra characters past the end of `target` have nothing expected and
/// are left out.
pub fn analyze_errors(typed: &str, target: &str) -> Vec<ErrorAnalysisItem> {
    analyze_attempts([(typed, target)])
}

/// Same as [`analyze_errors`] over several `(typed, target)` attempts
pub fn analyze_attempts<'a, I>(attempts: I) -> Vec<ErrorAnalysisItem>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    attempts
        .into_iter()
        .flat_map(|(typed, target)| typed.chars().zip(target.chars()))
        .filter(|(t, e)| t != e)
        .counts()
        .into_iter()
        .map(|((typed, expected), count)| ErrorAnalysisItem {
            typed,
            expected,
            count,
        })
        .sorted_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.expected.cmp(&b.expected))
                .then(a.typed.cmp(&b.typed))
        })
        .collect()
}
