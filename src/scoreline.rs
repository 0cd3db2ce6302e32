use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    #[serde(rename = "H")]
    Home,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "A")]
    Away,
}

impl MatchResult {
    pub fn from_goals(home_goals: u8, away_goals: u8) -> Self {
        if home_goals > away_goals {
            MatchResult::Home
        } else if home_goals < away_goals {
            MatchResult::Away
        } else {
            MatchResult::Draw
        }
    }

    pub fn code(self) -> char {
        match self {
            MatchResult::Home => 'H',
            MatchResult::Draw => 'D',
            MatchResult::Away => 'A',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'H' => Some(MatchResult::Home),
            'D' => Some(MatchResult::Draw),
            'A' => Some(MatchResult::Away),
            _ => None,
        }
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Full-time goals for one match, formatted as `"{home}-{away}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scoreline {
    pub home: u8,
    pub away: u8,
}

impl Scoreline {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    pub fn result(self) -> MatchResult {
        MatchResult::from_goals(self.home, self.away)
    }

    /// Signed goal difference from the home side's point of view.
    pub fn margin(self) -> i32 {
        i32::from(self.home) - i32::from(self.away)
    }

    /// League points (3/1/0) earned by the home and away side.
    pub fn league_points(self) -> (u8, u8) {
        match self.result() {
            MatchResult::Home => (3, 0),
            MatchResult::Draw => (1, 1),
            MatchResult::Away => (0, 3),
        }
    }

    /// Predicted goals truncated toward zero; negatives clamp to zero.
    pub fn from_prediction(home_goals: f64, away_goals: f64) -> Self {
        Self {
            home: goals_from_f64(home_goals),
            away: goals_from_f64(away_goals),
        }
    }
}

fn goals_from_f64(value: f64) -> u8 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.trunc().min(f64::from(u8::MAX)) as u8
}

impl fmt::Display for Scoreline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

impl FromStr for Scoreline {
    type Err = anyhow::Error;

    // Fixture exports use an en dash ("2–1"); both separators are accepted.
    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (home, away) = trimmed
            .split_once(['-', '–'])
            .ok_or_else(|| anyhow!("scoreline '{trimmed}' is missing a separator"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u8>()
                .map_err(|_| anyhow!("scoreline '{trimmed}' has a non-numeric side"))
        };
        Ok(Self {
            home: parse(home)?,
            away: parse(away)?,
        })
    }
}
