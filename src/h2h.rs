use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fixtures::Match;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct H2hConfig {
    pub window: usize,
    // League-average goals used when two teams have never met.
    pub default_goals: f64,
}

impl Default for H2hConfig {
    fn default() -> Self {
        Self {
            window: 5,
            default_goals: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct H2hAverages {
    pub home_goals: f64,
    pub away_goals: f64,
}

#[derive(Debug, Clone)]
struct Meeting {
    date: NaiveDate,
    home_team: String,
    home_goals: u8,
    away_goals: u8,
}

/// Past meetings per unordered team pair, in the order they were observed.
#[derive(Debug, Clone)]
pub struct HeadToHead {
    cfg: H2hConfig,
    meetings: HashMap<(String, String), Vec<Meeting>>,
}

impl HeadToHead {
    pub fn new(cfg: H2hConfig) -> Self {
        Self {
            cfg,
            meetings: HashMap::new(),
        }
    }

    /// Average goals each side of `m` scored in their last `window` meetings
    /// strictly before `m.date`, whichever team was at home back then.
    pub fn averages(&self, m: &Match) -> H2hAverages {
        let fallback = H2hAverages {
            home_goals: self.cfg.default_goals,
            away_goals: self.cfg.default_goals,
        };
        let Some(history) = self.meetings.get(&pair_key(&m.home_team, &m.away_team)) else {
            return fallback;
        };

        let prior: Vec<&Meeting> = history.iter().filter(|x| x.date < m.date).collect();
        let recent = &prior[prior.len().saturating_sub(self.cfg.window.max(1))..];
        if recent.is_empty() {
            return fallback;
        }

        let mut home_sum = 0.0;
        let mut away_sum = 0.0;
        for meeting in recent {
            let (for_home, for_away) = if meeting.home_team == m.home_team {
                (meeting.home_goals, meeting.away_goals)
            } else {
                (meeting.away_goals, meeting.home_goals)
            };
            home_sum += f64::from(for_home);
            away_sum += f64::from(for_away);
        }
        let n = recent.len() as f64;
        H2hAverages {
            home_goals: home_sum / n,
            away_goals: away_sum / n,
        }
    }

    /// Records a played match; pending fixtures are ignored.
    pub fn observe(&mut self, m: &Match) {
        let Some(score) = m.score else {
            return;
        };
        self.meetings
            .entry(pair_key(&m.home_team, &m.away_team))
            .or_default()
            .push(Meeting {
                date: m.date,
                home_team: m.home_team.clone(),
                home_goals: score.home,
                away_goals: score.away,
            });
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
