//! League points for predicted scorelines.
//!
//! Each scored match lands in exactly one tier, checked in order: exact
//! scoreline, close, correct result, miss. Matches without a final score are
//! left out of the batch instead of counting as a miss.

use serde::{Deserialize, Serialize};

use crate::scoreline::Scoreline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreTier {
    Exact,
    Close,
    ResultOnly,
    Miss,
}

impl ScoreTier {
    pub fn points(self) -> f64 {
        match self {
            ScoreTier::Exact => 3.0,
            ScoreTier::Close => 1.5,
            ScoreTier::ResultOnly => 1.0,
            ScoreTier::Miss => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreTier::Exact => "exact",
            ScoreTier::Close => "close",
            ScoreTier::ResultOnly => "result",
            ScoreTier::Miss => "miss",
        }
    }
}

pub fn tier(actual: Scoreline, predicted: Scoreline) -> ScoreTier {
    if actual == predicted {
        return ScoreTier::Exact;
    }
    if actual.result() != predicted.result() {
        return ScoreTier::Miss;
    }
    if is_close(actual, predicted) {
        ScoreTier::Close
    } else {
        ScoreTier::ResultOnly
    }
}

pub fn points(actual: Scoreline, predicted: Scoreline) -> f64 {
    tier(actual, predicted).points()
}

fn is_close(actual: Scoreline, predicted: Scoreline) -> bool {
    let home_off = (i32::from(predicted.home) - i32::from(actual.home)).abs();
    let away_off = (i32::from(predicted.away) - i32::from(actual.away)).abs();

    let one_out = (home_off <= 1 && away_off == 0) || (away_off <= 1 && home_off == 0);
    let two_out_same_margin = ((home_off <= 2 && away_off == 0)
        || (away_off <= 2 && home_off == 0))
        && predicted.margin() == actual.margin();
    let both_within_one = home_off <= 1 && away_off <= 1;

    one_out || two_out_same_margin || both_within_one
}

/// Actual vs predicted for one match; `actual` is `None` until it is played.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub match_id: i64,
    pub actual: Option<Scoreline>,
    pub predicted: Scoreline,
}

impl ScoreRecord {
    pub fn tier(&self) -> Option<ScoreTier> {
        self.actual.map(|actual| tier(actual, self.predicted))
    }

    pub fn points(&self) -> Option<f64> {
        self.tier().map(ScoreTier::points)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsSummary {
    pub scored: usize,
    /// Matches without a final score.
    pub excluded: usize,
    pub exact: usize,
    pub close: usize,
    pub result_only: usize,
    pub miss: usize,
    pub total_points: f64,
}

impl PointsSummary {
    pub fn add(&mut self, tier: Option<ScoreTier>) {
        let Some(tier) = tier else {
            self.excluded += 1;
            return;
        };
        self.scored += 1;
        match tier {
            ScoreTier::Exact => self.exact += 1,
            ScoreTier::Close => self.close += 1,
            ScoreTier::ResultOnly => self.result_only += 1,
            ScoreTier::Miss => self.miss += 1,
        }
        self.total_points += tier.points();
    }
}

pub fn batch_points(records: &[ScoreRecord]) -> PointsSummary {
    records.iter().fold(PointsSummary::default(), |mut acc, r| {
        acc.add(r.tier());
        acc
    })
}
