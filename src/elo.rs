use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fixtures::Match;
use crate::scoreline::MatchResult;
use crate::season::Season;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    pub k: f64,
    pub home_adv_pts: f64,
    pub base_rating: f64,
    // Fraction pulled back toward the base rating at each new season.
    pub season_regression: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k: 30.0,
            home_adv_pts: 100.0,
            base_rating: 1500.0,
            season_regression: 0.2,
        }
    }
}

/// Ratings of both sides as they stood before kickoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloSnapshot {
    pub home: f64,
    pub away: f64,
}

/// Running ratings for one replay of the match history.
///
/// Must be fed matches in chronological order; it is rebuilt for every run
/// and never shared between callers.
#[derive(Debug, Clone)]
pub struct EloState {
    cfg: EloConfig,
    ratings: HashMap<String, f64>,
    current_season: Option<Season>,
}

impl EloState {
    pub fn new(cfg: EloConfig) -> Self {
        Self {
            cfg,
            ratings: HashMap::new(),
            current_season: None,
        }
    }

    pub fn rating(&self, team: &str) -> f64 {
        self.ratings
            .get(team)
            .copied()
            .unwrap_or(self.cfg.base_rating)
    }

    pub fn ratings(&self) -> &HashMap<String, f64> {
        &self.ratings
    }

    /// Applies the season boundary if `season` is new, then returns the
    /// pre-match ratings. Call before [`EloState::observe`] for the same match.
    pub fn pre_match(&mut self, m: &Match) -> EloSnapshot {
        self.enter_season(m.season);
        EloSnapshot {
            home: self.rating(&m.home_team),
            away: self.rating(&m.away_team),
        }
    }

    /// Updates both ratings from the final score. Pending matches leave the
    /// ratings untouched.
    pub fn observe(&mut self, m: &Match) {
        self.enter_season(m.season);
        let Some(score) = m.score else {
            return;
        };

        let eh = self.rating(&m.home_team);
        let ea = self.rating(&m.away_team);
        let expected_home = expected_score(eh + self.cfg.home_adv_pts, ea);
        let expected_away = 1.0 - expected_home;
        let (s_home, s_away) = match score.result() {
            MatchResult::Home => (1.0, 0.0),
            MatchResult::Away => (0.0, 1.0),
            MatchResult::Draw => (0.5, 0.5),
        };

        self.ratings
            .insert(m.home_team.clone(), eh + self.cfg.k * (s_home - expected_home));
        self.ratings
            .insert(m.away_team.clone(), ea + self.cfg.k * (s_away - expected_away));
    }

    fn enter_season(&mut self, season: Season) {
        match self.current_season {
            Some(current) if current == season => {}
            Some(_) => {
                let f = self.cfg.season_regression;
                let base = self.cfg.base_rating;
                for rating in self.ratings.values_mut() {
                    *rating = base * f + *rating * (1.0 - f);
                }
                self.current_season = Some(season);
            }
            None => self.current_season = Some(season),
        }
    }
}

/// Replays `matches` (already chronological) and returns each match's
/// pre-match ratings alongside the final state.
pub fn replay(matches: &[Match], cfg: EloConfig) -> (Vec<EloSnapshot>, EloState) {
    debug_assert!(crate::fixtures::is_chronological(matches));
    matches
        .iter()
        .fold((Vec::with_capacity(matches.len()), EloState::new(cfg)), |(mut out, mut state), m| {
            out.push(state.pre_match(m));
            state.observe(m);
            (out, state)
        })
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r_b - r_a) / 400.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoreline::Scoreline;
    use chrono::NaiveDate;

    fn game(id: i64, season: i32, month: u32, day: u32, home: &str, away: &str, score: Option<(u8, u8)>) -> Match {
        Match {
            match_id: id,
            season: Season::new(season),
            week: 1,
            date: NaiveDate::from_ymd_opt(season + i32::from(month < 7), month, day).unwrap(),
            kickoff: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            venue: "Ground".to_string(),
            referee: None,
            attendance: None,
            score: score.map(|(h, a)| Scoreline::new(h, a)),
        }
    }

    #[test]
    fn expectations_sum_to_one() {
        for (a, b) in [(1500.0, 1500.0), (1720.5, 1380.0), (1200.0, 1900.0)] {
            let e = expected_score(a, b);
            assert!((e + expected_score(b, a) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn pending_match_leaves_ratings_unchanged() {
        let mut state = EloState::new(EloConfig::default());
        let m = game(1, 2024, 8, 17, "A", "B", None);
        let before = state.pre_match(&m);
        state.observe(&m);
        assert_eq!(before, EloSnapshot { home: 1500.0, away: 1500.0 });
        assert!(state.ratings().is_empty());
    }

    #[test]
    fn season_regression_applies_once_per_boundary() {
        let cfg = EloConfig::default();
        let matches = vec![
            game(1, 2023, 8, 12, "A", "B", Some((3, 0))),
            game(2, 2024, 8, 17, "B", "C", None),
            game(3, 2024, 8, 24, "A", "C", None),
        ];
        let (snaps, state) = replay(&matches, cfg);

        let e = expected_score(1600.0, 1500.0);
        let a_end = 1500.0 + 30.0 * (1.0 - e);
        let a_regressed = 1500.0 * 0.2 + a_end * 0.8;
        assert!((snaps[2].home - a_regressed).abs() < 1e-9);
        assert!((state.rating("A") - a_regressed).abs() < 1e-9);
        // C was never rated, so it stays at base through the boundary.
        assert_eq!(snaps[1].away, 1500.0);
    }
}
