use std::collections::{BTreeMap, HashMap};

use crate::fixtures::Match;
use crate::season::Season;

/// Position given to teams absent from the previous season (promoted sides).
pub const DEFAULT_PREVIOUS_POSITION: u32 = 18;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub team: String,
    pub played: u32,
    pub points: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl TableRow {
    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

/// Final league tables built from played matches, keyed by season.
#[derive(Debug, Clone, Default)]
pub struct SeasonTables {
    positions: HashMap<Season, HashMap<String, u32>>,
}

impl SeasonTables {
    pub fn from_matches(matches: &[Match]) -> Self {
        let mut rows: BTreeMap<Season, HashMap<String, TableRow>> = BTreeMap::new();
        for m in matches {
            let Some(score) = m.score else {
                continue;
            };
            let (home_pts, away_pts) = score.league_points();
            let table = rows.entry(m.season).or_default();
            for (team, pts, gf, ga) in [
                (&m.home_team, home_pts, score.home, score.away),
                (&m.away_team, away_pts, score.away, score.home),
            ] {
                let row = table.entry(team.clone()).or_insert_with(|| TableRow {
                    team: team.clone(),
                    ..TableRow::default()
                });
                row.played += 1;
                row.points += u32::from(pts);
                row.goals_for += u32::from(gf);
                row.goals_against += u32::from(ga);
            }
        }

        let positions = rows
            .into_iter()
            .map(|(season, table)| {
                let ranked = rank(table.into_values().collect());
                let by_team = ranked
                    .into_iter()
                    .enumerate()
                    .map(|(idx, row)| (row.team, idx as u32 + 1))
                    .collect();
                (season, by_team)
            })
            .collect();
        Self { positions }
    }

    pub fn position(&self, season: Season, team: &str) -> Option<u32> {
        self.positions.get(&season)?.get(team).copied()
    }

    /// Where `team` finished the season before `season`.
    pub fn previous_position(&self, season: Season, team: &str) -> u32 {
        self.position(season.previous(), team)
            .unwrap_or(DEFAULT_PREVIOUS_POSITION)
    }
}

pub fn rank(mut rows: Vec<TableRow>) -> Vec<TableRow> {
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference().cmp(&a.goal_difference()))
            .then(b.goals_for.cmp(&a.goals_for))
            .then_with(|| a.team.cmp(&b.team))
    });
    rows
}
