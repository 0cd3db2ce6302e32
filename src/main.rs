use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::warn;

use epl_forecast::config::{Settings, load_dotenv};
use epl_forecast::leaderboard::{self, LEADERBOARD_FILE, LeaderboardPoints};
use epl_forecast::model_context::ModelContext;
use epl_forecast::pipeline::{MatchweekReport, predict_matchweek};
use epl_forecast::season::Season;
use epl_forecast::{dataset, export, logging};

fn main() -> Result<()> {
    load_dotenv();
    logging::init("info,epl_forecast=info");
    let settings = Settings::from_env()?;

    let db_path = parse_path_arg("--db").unwrap_or_else(|| settings.db_path.clone());
    let model_dir = parse_path_arg("--model-dir").unwrap_or_else(|| settings.model_dir.clone());

    let mut conn = dataset::open_db(&db_path)?;
    let history = dataset::load_history(&conn, None)?;
    let ctx = ModelContext::load(&model_dir)
        .with_context(|| format!("load model from {} (run `train` first)", model_dir.display()))?;

    let season = match parse_arg("--season") {
        Some(raw) => raw.parse::<Season>()?,
        None => history
            .latest_season()
            .ok_or_else(|| anyhow!("no matches stored in {}", db_path.display()))?,
    };
    let week = match parse_arg("--week") {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("invalid --week '{raw}'"))?,
        None => history
            .next_open_week(season)
            .or_else(|| {
                history
                    .matches
                    .iter()
                    .filter(|m| m.season == season)
                    .map(|m| m.week)
                    .max()
            })
            .ok_or_else(|| anyhow!("no fixtures stored for {season}"))?,
    };

    let now = Utc::now();
    let report = predict_matchweek(
        &mut conn,
        &ctx,
        &history,
        season,
        week,
        settings.prediction_ttl,
        now,
    )?;

    if has_flag("--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(reference) = leaderboard_reference(&settings, now) {
        println!(
            "Leaderboard: global top {:.1}, top 250 {:.1}",
            reference.global_top, reference.global_top_250
        );
    }

    if let Some(path) = parse_path_arg("--export") {
        let summary = export::export_report(&path, &report)?;
        println!(
            "Exported {} matches to {}",
            summary.matches,
            path.display()
        );
    }
    Ok(())
}

fn print_report(report: &MatchweekReport) {
    println!("Matchweek {} ({})", report.week, report.season);
    for row in &report.rows {
        let actual = row
            .actual
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let tier = row.tier.map(|t| t.label()).unwrap_or("pending");
        println!(
            "  {} {:>24} vs {:<24} pred {} ({})  actual {:>5}  {}",
            row.date.format("%Y-%m-%d"),
            row.home_team,
            row.away_team,
            row.predicted,
            row.pred_result,
            actual,
            tier
        );
    }
    let p = &report.points;
    println!(
        "Points: {:.1} from {} scored ({} exact, {} close, {} result, {} miss), {} pending",
        p.total_points, p.scored, p.exact, p.close, p.result_only, p.miss, p.excluded
    );
    let m = &report.metrics;
    if m.samples > 0 {
        println!(
            "Metrics: mae {:.3}/{:.3} rmse {:.3} exact {:.1}% result {:.1}%",
            m.home_mae,
            m.away_mae,
            m.rmse,
            m.exact_rate * 100.0,
            m.result_rate * 100.0
        );
    }
}

/// Cached leaderboard totals; `--leaderboard-top` and `--leaderboard-top250`
/// supply fresh values when the snapshot has expired.
fn leaderboard_reference(settings: &Settings, now: chrono::DateTime<Utc>) -> Option<LeaderboardPoints> {
    let dir = settings.db_path.parent()?.to_path_buf();
    let path = dir.join(LEADERBOARD_FILE);
    let fetch = || {
        let top = parse_arg("--leaderboard-top").and_then(|v| v.parse::<f64>().ok());
        let top_250 = parse_arg("--leaderboard-top250").and_then(|v| v.parse::<f64>().ok());
        match (top, top_250) {
            (Some(global_top), Some(global_top_250)) => Ok(LeaderboardPoints {
                global_top,
                global_top_250,
            }),
            _ => Err(anyhow!("no leaderboard values supplied")),
        }
    };
    match leaderboard::get_or_refresh(&path, settings.leaderboard_ttl, now, fetch) {
        Ok(points) => Some(points),
        Err(err) => {
            if path.exists() {
                warn!(error = %err, "leaderboard snapshot expired");
            }
            None
        }
    }
}

fn parse_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_arg(name).map(PathBuf::from)
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
