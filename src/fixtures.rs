use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::scoreline::{MatchResult, Scoreline};
use crate::season::Season;

pub const SHOOTING_STAT_NAMES: [&str; 6] = ["gf", "ga", "sh", "sot", "pk", "pkatt"];
pub const SHOOTING_STAT_COUNT: usize = SHOOTING_STAT_NAMES.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

/// One league fixture. `score` is `None` until the match has been played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: i64,
    pub season: Season,
    pub week: u32,
    pub date: NaiveDate,
    pub kickoff: Option<NaiveTime>,
    pub home_team: String,
    pub away_team: String,
    pub venue: String,
    pub referee: Option<String>,
    pub attendance: Option<u32>,
    pub score: Option<Scoreline>,
}

impl Match {
    pub fn is_played(&self) -> bool {
        self.score.is_some()
    }

    pub fn result(&self) -> Option<MatchResult> {
        self.score.map(Scoreline::result)
    }

    pub fn key(&self) -> MatchKey {
        MatchKey {
            date: self.date,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
        }
    }

    pub fn side_of(&self, team: &str) -> Option<Side> {
        if self.home_team == team {
            Some(Side::Home)
        } else if self.away_team == team {
            Some(Side::Away)
        } else {
            None
        }
    }

    /// League points earned by `team`, when the match has a result.
    pub fn points_for(&self, team: &str) -> Option<u8> {
        let (home, away) = self.score?.league_points();
        match self.side_of(team)? {
            Side::Home => Some(home),
            Side::Away => Some(away),
        }
    }
}

/// Identity used to join per-team views back onto a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShootingStats {
    pub gf: f64,
    pub ga: f64,
    pub sh: f64,
    pub sot: f64,
    pub pk: f64,
    pub pkatt: f64,
}

impl ShootingStats {
    pub fn to_array(self) -> [f64; SHOOTING_STAT_COUNT] {
        [self.gf, self.ga, self.sh, self.sot, self.pk, self.pkatt]
    }

    pub fn from_array(values: [f64; SHOOTING_STAT_COUNT]) -> Self {
        let [gf, ga, sh, sot, pk, pkatt] = values;
        Self {
            gf,
            ga,
            sh,
            sot,
            pk,
            pkatt,
        }
    }
}

/// Shooting stats recorded by one team in one played match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShootingRecord {
    pub match_id: i64,
    pub team: String,
    pub stats: ShootingStats,
}

/// Sort into the processing order every stateful engine relies on.
pub fn sort_chronologically(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.kickoff.cmp(&b.kickoff))
            .then(a.match_id.cmp(&b.match_id))
    });
}

pub fn is_chronological(matches: &[Match]) -> bool {
    matches.windows(2).all(|w| w[0].date <= w[1].date)
}
