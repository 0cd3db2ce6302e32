use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::persist::{read_json, write_json_atomic};

pub const LEADERBOARD_FILE: &str = "leaderboard.json";

/// Reference points totals from the public league leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPoints {
    pub global_top: f64,
    pub global_top_250: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub timestamp: DateTime<Utc>,
    pub global_top: f64,
    pub global_top_250: f64,
}

impl LeaderboardSnapshot {
    pub fn points(&self) -> LeaderboardPoints {
        LeaderboardPoints {
            global_top: self.global_top,
            global_top_250: self.global_top_250,
        }
    }

    pub fn is_fresh(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) < ttl
    }
}

/// Returns the cached snapshot while it is younger than `ttl`; otherwise
/// calls `fetch`, rewrites the snapshot file and returns the new points.
///
/// An unreadable snapshot file counts as missing.
pub fn get_or_refresh<F>(
    path: &Path,
    ttl: TimeDelta,
    now: DateTime<Utc>,
    fetch: F,
) -> Result<LeaderboardPoints>
where
    F: FnOnce() -> Result<LeaderboardPoints>,
{
    let cached = match read_json::<LeaderboardSnapshot>(path) {
        Ok(cached) => cached,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable leaderboard snapshot");
            None
        }
    };
    if let Some(snapshot) = cached {
        if snapshot.is_fresh(ttl, now) {
            return Ok(snapshot.points());
        }
    }

    let points = fetch().context("fetch leaderboard points")?;
    let snapshot = LeaderboardSnapshot {
        timestamp: now,
        global_top: points.global_top,
        global_top_250: points.global_top_250,
    };
    write_json_atomic(path, &snapshot)?;
    info!(
        global_top = points.global_top,
        global_top_250 = points.global_top_250,
        "leaderboard snapshot refreshed"
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;

    #[test]
    fn refreshes_only_after_ttl() {
        let dir = std::env::temp_dir().join(format!("epl_leaderboard_{}", std::process::id()));
        let path = dir.join(LEADERBOARD_FILE);
        let _ = std::fs::remove_file(&path);
        let ttl = TimeDelta::days(90);
        let t0 = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let calls = Cell::new(0);
        let fetch = |top: f64| {
            let calls = &calls;
            move || {
                calls.set(calls.get() + 1);
                Ok::<_, anyhow::Error>(LeaderboardPoints {
                    global_top: top,
                    global_top_250: top - 10.0,
                })
            }
        };

        let first = get_or_refresh(&path, ttl, t0, fetch(60.0)).unwrap();
        let cached = get_or_refresh(&path, ttl, t0 + TimeDelta::days(89), fetch(99.0)).unwrap();
        assert_eq!(first, cached);
        assert_eq!(calls.get(), 1);

        let refreshed = get_or_refresh(&path, ttl, t0 + TimeDelta::days(90), fetch(99.0)).unwrap();
        assert_eq!(refreshed.global_top, 99.0);
        assert_eq!(calls.get(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
