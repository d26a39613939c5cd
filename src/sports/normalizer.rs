//! Turns upstream event records into uniform per-period scores.
//!
//! Every sport the feed covers reports scores as two maps keyed by period
//! label (`period_1`, `period_2`, ...) plus a `lasted_period` marker naming the
//! last period that has started. The normalizer reads exactly
//! `period_1..period_N` from both sides, where N comes from that marker.
//!
//! A record that cannot be normalized is dropped on its own; the rest of
//! the batch is kept.

use std::fmt;
use thiserror::Error;
use tracing::warn;

use super::models::{Match, RawMatch, Score, ScoreValue, Sport, Team};

const PERIOD_PREFIX: &str = "period_";
const TOTAL_KEY: &str = "current";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => f.write_str("home"),
            Side::Away => f.write_str("away"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("unable to determine last period from {value:?}")]
    InvalidPeriodCount { value: Option<String> },

    #[error("no {side} score for {period}")]
    MissingPeriodScore { side: Side, period: String },
}

/// Sport-specific reading of the period layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRule {
    /// What one period is called for this sport, used in log lines.
    pub period_name: &'static str,
}

impl PeriodRule {
    pub const fn new(period_name: &'static str) -> Self {
        PeriodRule { period_name }
    }

    /// Number of periods to extract, parsed from `lasted_period`.
    ///
    /// Accepts `"period_3"` or a bare `"3"`. Anything that is not a
    /// non-negative integer after the prefix is rejected rather than
    /// read as zero.
    pub fn period_count(&self, raw: &RawMatch) -> Result<usize, NormalizeError> {
        let invalid = || NormalizeError::InvalidPeriodCount {
            value: raw.lasted_period.clone(),
        };
        let marker = raw.lasted_period.as_deref().ok_or_else(invalid)?.trim();
        let digits = marker.strip_prefix(PERIOD_PREFIX).unwrap_or(marker);
        digits
            .parse::<u32>()
            .map(|n| n as usize)
            .map_err(|_| invalid())
    }

    /// `period_1 ..= period_n`, in order. Lazy, since `n` comes straight
    /// from the feed and may be absurdly large.
    pub fn period_keys(&self, n: usize) -> impl Iterator<Item = String> {
        (1..=n).map(|i| format!("{}{}", PERIOD_PREFIX, i))
    }
}

/// Normalize the score of a single record.
pub fn normalize(raw: &RawMatch, rule: &PeriodRule) -> Result<Score, NormalizeError> {
    let n = rule.period_count(raw)?;
    // Capacity is bounded by what the record actually holds, not by `n`.
    let cap = n.min(raw.home_score.len()).min(raw.away_score.len());
    let mut score = Score {
        home: Vec::with_capacity(cap),
        away: Vec::with_capacity(cap),
        home_total: raw.home_score.get(TOTAL_KEY).map(ScoreValue::to_score_string),
        away_total: raw.away_score.get(TOTAL_KEY).map(ScoreValue::to_score_string),
    };

    for period in rule.period_keys(n) {
        let home = lookup(raw, Side::Home, &period)?;
        let away = lookup(raw, Side::Away, &period)?;
        score.home.push(home);
        score.away.push(away);
    }

    Ok(score)
}

fn lookup(raw: &RawMatch, side: Side, period: &str) -> Result<String, NormalizeError> {
    let scores = match side {
        Side::Home => &raw.home_score,
        Side::Away => &raw.away_score,
    };
    scores
        .get(period)
        .map(ScoreValue::to_score_string)
        .ok_or_else(|| NormalizeError::MissingPeriodScore {
            side,
            period: period.to_string(),
        })
}

/// A record left out of a batch and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    pub match_id: Option<i64>,
    pub reason: NormalizeError,
}

/// Result of normalizing one upstream response.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub matches: Vec<Match>,
    pub dropped: Vec<DroppedRecord>,
}

/// Normalize every record, keeping upstream order for the ones that succeed.
pub fn normalize_batch(sport: Sport, raws: Vec<RawMatch>) -> NormalizedBatch {
    let rule = sport.period_rule();
    let mut batch = NormalizedBatch {
        matches: Vec::with_capacity(raws.len()),
        dropped: Vec::new(),
    };

    for raw in raws {
        match normalize(&raw, &rule) {
            Ok(score) => batch.matches.push(Match {
                sport,
                home: Team {
                    name: raw.home_team.name,
                },
                away: Team {
                    name: raw.away_team.name,
                },
                score,
            }),
            Err(reason) => {
                warn!(
                    "Dropping {} match {:?} ({}, status {}), {} scores unreadable: {}",
                    sport,
                    raw.id,
                    raw.name.as_deref().unwrap_or("unnamed"),
                    raw.status.as_deref().unwrap_or("unknown"),
                    rule.period_name,
                    reason
                );
                batch.dropped.push(DroppedRecord {
                    match_id: raw.id,
                    reason,
                });
            }
        }
    }

    batch
}
