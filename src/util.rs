use chrono::Utc;

/// Folds `value` into a mean that currently covers `count` samples, rounded
/// to the nearest integer the way session scores are displayed.
pub fn running_mean(current: u32, count: usize, value: u32) -> u32 {
    let n = count as f64;
    ((current as f64 * n + value as f64) / (n + 1.0)).round() as u32
}

/// Integer percentage of `part` over `whole`; `None` when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> Option<u32> {
    match whole {
        0 => None,
        w => Some(((part as f64 / w as f64) * 100.0).round() as u32),
    }
}

pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}
