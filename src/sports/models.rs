use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::normalizer::PeriodRule;

/// Sports tracked by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Tennis,
    Basketball,
}

impl Sport {
    pub const ALL: [Sport; 2] = [Sport::Tennis, Sport::Basketball];

    /// Numeric sport id used by the SportScore feed.
    pub fn upstream_id(self) -> u32 {
        match self {
            Sport::Tennis => 2,
            Sport::Basketball => 3,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Sport::Tennis => "tennis",
            Sport::Basketball => "basketball",
        }
    }

    /// How this sport's periods are laid out in the upstream score maps.
    pub fn period_rule(self) -> PeriodRule {
        match self {
            Sport::Tennis => PeriodRule::new("set"),
            Sport::Basketball => PeriodRule::new("quarter"),
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Sport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tennis" => Ok(Sport::Tennis),
            "basketball" => Ok(Sport::Basketball),
            other => Err(format!("unknown sport '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    pub name: String,
}

/// Per-period scores for both sides, index-aligned by period.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Score {
    pub home: Vec<String>,
    pub away: Vec<String>,
    /// Running totals from the feed's `current` entry, when it sends one.
    pub home_total: Option<String>,
    pub away_total: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub sport: Sport,
    pub home: Team,
    pub away: Team,
    pub score: Score,
}

// ── Upstream wire types ──────────────────────────────────────────────────────

/// Envelope returned by the SportScore event endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchListResponse {
    #[serde(default)]
    pub data: Vec<RawMatch>,
}

/// One upstream event. Only the fields the normalizer reads are kept;
/// everything else in the payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMatch {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub home_team: RawTeam,
    #[serde(default, deserialize_with = "null_as_default")]
    pub away_team: RawTeam,
    #[serde(default, deserialize_with = "score_map")]
    pub home_score: HashMap<String, ScoreValue>,
    #[serde(default, deserialize_with = "score_map")]
    pub away_score: HashMap<String, ScoreValue>,
    /// e.g. "period_2"
    #[serde(default)]
    pub lasted_period: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTeam {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A score cell as sent upstream. The feed is inconsistent about
/// encoding the same value as a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScoreValue {
    pub fn to_score_string(&self) -> String {
        match self {
            ScoreValue::Integer(v) => v.to_string(),
            ScoreValue::Float(v) => v.to_string(),
            ScoreValue::Text(s) => s.clone(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Null maps read as empty and null cells are left out, so the normalizer
/// reports them as missing periods instead of failing the whole response.
fn score_map<'de, D>(deserializer: D) -> Result<HashMap<String, ScoreValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<HashMap<String, Option<ScoreValue>>> = Option::deserialize(deserializer)?;
    Ok(opt
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(period, value)| value.map(|v| (period, v)))
        .collect())
}
