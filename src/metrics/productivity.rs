use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::LogRecord;

/// App keywords counted as productive use.
pub const PRODUCTIVE_APPS: &[&str] = &["vscode", "slack", "figma", "notion", "github"];

/// App keywords counted as distracting use.
pub const DISTRACTING_APPS: &[&str] = &["youtube", "netflix", "spotify", "instagram", "facebook"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivitySummary {
    pub score: u8,
    pub trend: Trend,
    pub productive_count: usize,
    pub distracting_count: usize,
}

fn matches_any(app: &str, keywords: &[&str]) -> bool {
    let lower = app.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw))
}

fn counts(records: &[LogRecord]) -> (usize, usize) {
    let productive = records
        .iter()
        .filter(|r| matches_any(&r.active_app, PRODUCTIVE_APPS))
        .count();
    let distracting = records
        .iter()
        .filter(|r| matches_any(&r.active_app, DISTRACTING_APPS))
        .count();
    (productive, distracting)
}

fn score_of(productive: usize, distracting: usize) -> u8 {
    let total = productive + distracting;
    if total == 0 {
        return 0;
    }
    ((100.0 * productive as f64 / total as f64).round()) as u8
}

/// Share of productive app activity in the record set, 0..=100.
///
/// Records matching neither keyword list do not participate; 0 when nothing
/// matched at all.
pub fn productivity_score(records: &[LogRecord]) -> u8 {
    let (p, d) = counts(records);
    score_of(p, d)
}

/// Score over the whole window plus a trend against the trailing sub-window
/// of records newer than `trailing_cutoff`.
pub fn productivity_summary(
    records: &[LogRecord],
    trailing_cutoff: DateTime<Utc>,
) -> ProductivitySummary {
    let (productive_count, distracting_count) = counts(records);
    let score = score_of(productive_count, distracting_count);

    let trailing: Vec<&LogRecord> = records
        .iter()
        .filter(|r| r.timestamp.map(|ts| ts > trailing_cutoff).unwrap_or(false))
        .collect();
    let trailing_p = trailing
        .iter()
        .filter(|r| matches_any(&r.active_app, PRODUCTIVE_APPS))
        .count();
    let trailing_d = trailing
        .iter()
        .filter(|r| matches_any(&r.active_app, DISTRACTING_APPS))
        .count();
    let trailing_score = score_of(trailing_p, trailing_d);

    let trend = if score > trailing_score {
        Trend::Up
    } else if score < trailing_score {
        Trend::Down
    } else {
        Trend::Neutral
    };

    ProductivitySummary {
        score,
        trend,
        productive_count,
        distracting_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn record(app: &str, ts: &str) -> LogRecord {
        LogRecord {
            active_app: app.to_string(),
            timestamp: parse_timestamp(ts),
            ..Default::default()
        }
    }

    #[test]
    fn test_score_zero_when_nothing_matches() {
        let records = vec![record("Terminal", "2024-08-24T10:00:00Z")];
        assert_eq!(productivity_score(&records), 0);
    }

    #[test]
    fn test_score_rounding_and_bounds() {
        let records = vec![
            record("VSCode", "2024-08-24T09:00:00Z"),
            record("vscode - editor", "2024-08-24T10:00:00Z"),
            record("YouTube", "2024-08-24T11:00:00Z"),
        ];
        // 2 productive, 1 distracting → round(200/3) = 67
        assert_eq!(productivity_score(&records), 67);
    }

    #[test]
    fn test_score_idempotent() {
        let records = vec![
            record("Slack", "2024-08-24T09:00:00Z"),
            record("Netflix", "2024-08-24T10:00:00Z"),
        ];
        let a = productivity_score(&records);
        let b = productivity_score(&records);
        assert_eq!(a, b);
        assert!(a <= 100);
    }

    #[test]
    fn test_trend_up_when_trailing_worse() {
        let cutoff = parse_timestamp("2024-08-24T00:00:00Z").unwrap();
        let records = vec![
            // older productive work
            record("vscode", "2024-08-23T09:00:00Z"),
            record("github desktop", "2024-08-23T10:00:00Z"),
            record("notion", "2024-08-23T11:00:00Z"),
            // trailing window: all distracting
            record("youtube", "2024-08-24T09:00:00Z"),
        ];
        let summary = productivity_summary(&records, cutoff);
        // whole window 3/4 = 75, trailing 0 → up
        assert_eq!(summary.score, 75);
        assert_eq!(summary.trend, Trend::Up);
    }

    #[test]
    fn test_trend_neutral_on_equal_scores() {
        let cutoff = parse_timestamp("2024-08-24T00:00:00Z").unwrap();
        let records = vec![
            record("vscode", "2024-08-23T09:00:00Z"),
            record("youtube", "2024-08-23T10:00:00Z"),
            record("figma", "2024-08-24T09:00:00Z"),
            record("netflix", "2024-08-24T10:00:00Z"),
        ];
        let summary = productivity_summary(&records, cutoff);
        assert_eq!(summary.trend, Trend::Neutral);
    }

    #[test]
    fn test_unparseable_timestamps_skip_trailing_window() {
        let cutoff = parse_timestamp("2024-08-24T00:00:00Z").unwrap();
        let mut r = record("youtube", "2024-08-24T09:00:00Z");
        r.timestamp = None;
        let summary = productivity_summary(&[r], cutoff);
        // record counts toward the full window but not the trailing one
        assert_eq!(summary.score, 0);
        assert_eq!(summary.distracting_count, 1);
    }
}
