//! Point-in-time feature assembly.
//!
//! Matches are replayed oldest first and every stateful engine (Elo,
//! head-to-head, PPG form) is read before it is updated with the match
//! itself, so a row never sees its own result or anything after it.

use std::collections::HashMap;

use chrono::{Datelike, Timelike};

use crate::elo::{EloConfig, EloState};
use crate::encoding::EncoderArtifact;
use crate::error::{DataQualityError, FeatureError};
use crate::fixtures::{Match, MatchKey, SHOOTING_STAT_COUNT, ShootingRecord, sort_chronologically};
use crate::h2h::{H2hConfig, HeadToHead};
use crate::rolling::{FormWindow, MatchRolling, rolling_shooting_by_match};
use crate::standings::SeasonTables;

/// Bumped whenever `FEATURE_NAMES` changes; persisted estimators record it.
pub const FEATURE_SET_VERSION: u32 = 2;

pub const FEATURE_NAMES: [&str; 27] = [
    "home_team_encoded",
    "away_team_encoded",
    "week",
    "hour",
    "day_code",
    "venue_code",
    "season_encoded",
    "ppg_rolling_h",
    "ppg_rolling_a",
    "gf_rolling_h",
    "ga_rolling_h",
    "sh_rolling_h",
    "sot_rolling_h",
    "pk_rolling_h",
    "pkatt_rolling_h",
    "gf_rolling_a",
    "ga_rolling_a",
    "sh_rolling_a",
    "sot_rolling_a",
    "pk_rolling_a",
    "pkatt_rolling_a",
    "pos_last_season_h",
    "pos_last_season_a",
    "elo_h",
    "elo_a",
    "h2h_avg_goals_h",
    "h2h_avg_goals_a",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

const ROLLING_HOME_OFFSET: usize = 9;
const ROLLING_AWAY_OFFSET: usize = ROLLING_HOME_OFFSET + SHOOTING_STAT_COUNT;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub match_id: i64,
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name)?;
        Some(self.values[idx])
    }
}

/// One row per match, in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, match_id: i64) -> Option<&FeatureRow> {
        self.rows.iter().find(|r| r.match_id == match_id)
    }

    /// Fails on any non-finite value, naming the columns and match ids.
    pub fn validate(&self) -> Result<(), DataQualityError> {
        let mut bad_cols = [false; FEATURE_COUNT];
        let mut bad_rows = Vec::new();
        for row in &self.rows {
            let mut row_bad = false;
            for (idx, v) in row.values.iter().enumerate() {
                if !v.is_finite() {
                    bad_cols[idx] = true;
                    row_bad = true;
                }
            }
            if row_bad {
                bad_rows.push(row.match_id);
            }
        }
        if bad_rows.is_empty() {
            return Ok(());
        }
        let columns = FEATURE_NAMES
            .iter()
            .zip(bad_cols)
            .filter(|(_, bad)| *bad)
            .map(|(name, _)| name.to_string())
            .collect();
        Err(DataQualityError::new("feature matrix contains NaN or infinite values")
            .with_columns(columns)
            .with_rows(bad_rows))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureAssembler<'a> {
    pub encoders: &'a EncoderArtifact,
    pub elo: EloConfig,
    pub h2h: H2hConfig,
}

struct Replay {
    elo: EloState,
    h2h: HeadToHead,
    form: HashMap<String, FormWindow>,
    rows: Vec<FeatureRow>,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(encoders: &'a EncoderArtifact, elo: EloConfig, h2h: H2hConfig) -> Self {
        Self { encoders, elo, h2h }
    }

    /// Builds the feature matrix for every match in `matches` (played and
    /// pending). Input order does not matter; the replay itself is always
    /// chronological.
    pub fn assemble(
        &self,
        matches: &[Match],
        shooting: &[ShootingRecord],
    ) -> Result<FeatureMatrix, FeatureError> {
        let mut ordered = matches.to_vec();
        sort_chronologically(&mut ordered);

        let rolling = rolling_shooting_by_match(&ordered, shooting);
        let tables = SeasonTables::from_matches(&ordered);

        let init = Replay {
            elo: EloState::new(self.elo),
            h2h: HeadToHead::new(self.h2h),
            form: HashMap::new(),
            rows: Vec::with_capacity(ordered.len()),
        };
        let replay = ordered.iter().try_fold(init, |mut acc, m| {
            let row = self.row_for(m, &mut acc, &rolling, &tables)?;
            acc.rows.push(row);
            acc.elo.observe(m);
            acc.h2h.observe(m);
            acc.form
                .entry(m.home_team.clone())
                .or_default()
                .push(m.points_for(&m.home_team));
            acc.form
                .entry(m.away_team.clone())
                .or_default()
                .push(m.points_for(&m.away_team));
            Ok::<_, FeatureError>(acc)
        })?;

        let matrix = FeatureMatrix { rows: replay.rows };
        matrix.validate()?;
        Ok(matrix)
    }

    fn row_for(
        &self,
        m: &Match,
        acc: &mut Replay,
        rolling: &HashMap<MatchKey, MatchRolling>,
        tables: &SeasonTables,
    ) -> Result<FeatureRow, FeatureError> {
        let home_code = self.encoders.teams.transform(&m.home_team)?;
        let away_code = self.encoders.teams.transform(&m.away_team)?;
        let venue_code = self.encoders.venues.transform(&m.venue)?;

        let elo = acc.elo.pre_match(m);
        let h2h = acc.h2h.averages(m);
        let ppg = |team: &str| acc.form.get(team).map(FormWindow::ppg).unwrap_or(0.0);
        let form = rolling.get(&m.key()).copied().unwrap_or_default();

        let mut values = [0.0; FEATURE_COUNT];
        values[0] = f64::from(home_code);
        values[1] = f64::from(away_code);
        values[2] = f64::from(m.week);
        values[3] = m.kickoff.map(|t| f64::from(t.hour())).unwrap_or(0.0);
        values[4] = f64::from(m.date.weekday().num_days_from_monday());
        values[5] = f64::from(venue_code);
        values[6] = self.encoders.season_code(m.season) as f64;
        values[7] = ppg(&m.home_team);
        values[8] = ppg(&m.away_team);
        values[ROLLING_HOME_OFFSET..ROLLING_AWAY_OFFSET].copy_from_slice(&form.home);
        values[ROLLING_AWAY_OFFSET..ROLLING_AWAY_OFFSET + SHOOTING_STAT_COUNT]
            .copy_from_slice(&form.away);
        values[21] = f64::from(tables.previous_position(m.season, &m.home_team));
        values[22] = f64::from(tables.previous_position(m.season, &m.away_team));
        values[23] = elo.home;
        values[24] = elo.away;
        values[25] = h2h.home_goals;
        values[26] = h2h.away_goals;

        Ok(FeatureRow {
            match_id: m.match_id,
            values,
        })
    }
}
