//! Trailing-window team form: shooting stat means and points per game.
//!
//! Every window is closed on the left: a match only ever sees the matches
//! that came before it, never itself.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::fixtures::{
    Match, MatchKey, SHOOTING_STAT_COUNT, ShootingRecord, ShootingStats, Side,
};

pub const ROLLING_WINDOW: usize = 3;
/// Weeks at the start of a season whose shooting form is zero-filled.
pub const ZERO_FILL_THROUGH_WEEK: u32 = 2;

/// The last `capacity` matches of one team. A slot is `None` when the match
/// has no stats (pending, or no shooting record); it still occupies a slot.
#[derive(Debug, Clone)]
pub struct RollingWindow<const N: usize> {
    capacity: usize,
    items: VecDeque<Option<[f64; N]>>,
}

impl<const N: usize> RollingWindow<N> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, values: Option<[f64; N]>) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(values);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element-wise mean of the slots that hold stats, zeros when none do.
    pub fn mean(&self) -> [f64; N] {
        let mut out = [0.0; N];
        let mut n = 0usize;
        for item in self.items.iter().flatten() {
            for (acc, v) in out.iter_mut().zip(item) {
                *acc += v;
            }
            n += 1;
        }
        if n == 0 {
            return out;
        }
        for v in &mut out {
            *v /= n as f64;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamLogEntry {
    pub key: MatchKey,
    pub match_id: i64,
    pub week: u32,
    pub side: Side,
    pub stats: Option<ShootingStats>,
}

/// Splits the (chronological) match list into one log per team. Pending
/// matches are kept with `stats: None` so they still receive form features.
pub fn build_team_logs(
    matches: &[Match],
    records: &[ShootingRecord],
) -> BTreeMap<String, Vec<TeamLogEntry>> {
    let by_match: HashMap<(i64, &str), ShootingStats> = records
        .iter()
        .map(|r| ((r.match_id, r.team.as_str()), r.stats))
        .collect();

    let mut logs: BTreeMap<String, Vec<TeamLogEntry>> = BTreeMap::new();
    for m in matches {
        for (team, side) in [(&m.home_team, Side::Home), (&m.away_team, Side::Away)] {
            let stats = if m.is_played() {
                by_match.get(&(m.match_id, team.as_str())).copied()
            } else {
                None
            };
            logs.entry(team.clone()).or_default().push(TeamLogEntry {
                key: m.key(),
                match_id: m.match_id,
                week: m.week,
                side,
                stats,
            });
        }
    }
    logs
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamRolling {
    pub key: MatchKey,
    pub side: Side,
    pub means: [f64; SHOOTING_STAT_COUNT],
}

pub fn team_rolling_stats(log: &[TeamLogEntry]) -> Vec<TeamRolling> {
    let mut window = RollingWindow::<SHOOTING_STAT_COUNT>::new(ROLLING_WINDOW);
    let mut out = Vec::with_capacity(log.len());
    for entry in log {
        let means = if entry.week <= ZERO_FILL_THROUGH_WEEK {
            [0.0; SHOOTING_STAT_COUNT]
        } else {
            window.mean()
        };
        out.push(TeamRolling {
            key: entry.key.clone(),
            side: entry.side,
            means,
        });
        window.push(entry.stats.map(ShootingStats::to_array));
    }
    out
}

/// Rolling shooting form of both sides of a match.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchRolling {
    pub home: [f64; SHOOTING_STAT_COUNT],
    pub away: [f64; SHOOTING_STAT_COUNT],
}

/// Joins per-team rows back into match rows on (date, home team, away team).
/// A side with no row stays zero-filled.
pub fn merge_team_rolling<'a, I>(rows: I) -> HashMap<MatchKey, MatchRolling>
where
    I: IntoIterator<Item = &'a TeamRolling>,
{
    let mut out: HashMap<MatchKey, MatchRolling> = HashMap::new();
    for row in rows {
        let slot = out.entry(row.key.clone()).or_default();
        match row.side {
            Side::Home => slot.home = row.means,
            Side::Away => slot.away = row.means,
        }
    }
    out
}

pub fn rolling_shooting_by_match(
    matches: &[Match],
    records: &[ShootingRecord],
) -> HashMap<MatchKey, MatchRolling> {
    let logs = build_team_logs(matches, records);
    let rows: Vec<TeamRolling> = logs
        .values()
        .flat_map(|log| team_rolling_stats(log))
        .collect();
    merge_team_rolling(&rows)
}

/// Points-per-game over the last few results of one team.
#[derive(Debug, Clone)]
pub struct FormWindow {
    capacity: usize,
    points: VecDeque<Option<u8>>,
}

impl Default for FormWindow {
    fn default() -> Self {
        Self::new(ROLLING_WINDOW)
    }
}

impl FormWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// `None` records a match without a result yet.
    pub fn push(&mut self, points: Option<u8>) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(points);
    }

    /// Zero until the window is full of played matches.
    pub fn ppg(&self) -> f64 {
        if self.points.len() < self.capacity {
            return 0.0;
        }
        let mut sum = 0.0;
        for p in &self.points {
            let Some(p) = p else {
                return 0.0;
            };
            sum += f64::from(*p);
        }
        sum / self.capacity as f64
    }
}
