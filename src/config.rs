use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::TimeDelta;

use crate::elo::EloConfig;
use crate::h2h::H2hConfig;
use crate::persist::app_cache_dir;

/// Runtime settings, read from the environment after `.env.local` and
/// `.env` are loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
    pub prediction_ttl: TimeDelta,
    pub leaderboard_ttl: TimeDelta,
    pub elo: EloConfig,
    pub h2h: H2hConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let cache_dir = app_cache_dir();
        let db_path = env_path("EPL_DB_PATH")
            .or_else(|| cache_dir.as_ref().map(|d| d.join("matches.sqlite")))
            .ok_or_else(|| anyhow!("unable to resolve sqlite path (set EPL_DB_PATH or HOME)"))?;
        let model_dir = env_path("EPL_MODEL_DIR")
            .or_else(|| cache_dir.as_ref().map(|d| d.join("model")))
            .ok_or_else(|| anyhow!("unable to resolve model dir (set EPL_MODEL_DIR or HOME)"))?;

        let prediction_hours = env_parse::<i64>("EPL_PREDICTION_TTL_HOURS")
            .unwrap_or(24)
            .clamp(0, 24 * 365);
        let leaderboard_days = env_parse::<i64>("EPL_LEADERBOARD_TTL_DAYS")
            .unwrap_or(90)
            .clamp(0, 3650);

        let elo_default = EloConfig::default();
        let elo = EloConfig {
            k: env_f64("EPL_ELO_K")
                .unwrap_or(elo_default.k)
                .clamp(0.0, 200.0),
            home_adv_pts: env_f64("EPL_ELO_HOME_ADVANTAGE")
                .unwrap_or(elo_default.home_adv_pts)
                .clamp(-400.0, 400.0),
            base_rating: env_f64("EPL_ELO_BASE")
                .unwrap_or(elo_default.base_rating)
                .clamp(0.0, 4000.0),
            season_regression: env_f64("EPL_ELO_SEASON_REGRESSION")
                .unwrap_or(elo_default.season_regression)
                .clamp(0.0, 1.0),
        };

        let h2h_default = H2hConfig::default();
        let h2h = H2hConfig {
            window: env_parse::<usize>("EPL_H2H_WINDOW")
                .unwrap_or(h2h_default.window)
                .clamp(1, 50),
            default_goals: env_f64("EPL_H2H_DEFAULT_GOALS")
                .unwrap_or(h2h_default.default_goals)
                .clamp(0.0, 10.0),
        };

        Ok(Self {
            db_path,
            model_dir,
            prediction_ttl: TimeDelta::hours(prediction_hours),
            leaderboard_ttl: TimeDelta::days(leaderboard_days),
            elo,
            h2h,
        })
    }
}

/// Loads `.env.local` then `.env`; missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse::<T>().ok()
}

fn env_f64(key: &str) -> Option<f64> {
    env_parse::<f64>(key).filter(|v| v.is_finite())
}
