use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::Utc;

use epl_forecast::config::{Settings, load_dotenv};
use epl_forecast::estimator::EstimatorKind;
use epl_forecast::pipeline::{TrainOptions, train_model};
use epl_forecast::season::Season;
use epl_forecast::{dataset, logging};

fn main() -> Result<()> {
    load_dotenv();
    logging::init("info");
    let settings = Settings::from_env()?;

    let db_path = parse_path_arg("--db").unwrap_or_else(|| settings.db_path.clone());
    let model_dir = parse_path_arg("--model-dir").unwrap_or_else(|| settings.model_dir.clone());
    let through = parse_arg("--season")
        .map(|raw| raw.parse::<Season>())
        .transpose()?;
    let kind = if has_flag("--single") {
        EstimatorKind::Single
    } else {
        EstimatorKind::PerTarget
    };

    let conn = dataset::open_db(&db_path)?;
    let history = dataset::load_history(&conn, through)?;
    if history.matches.is_empty() {
        return Err(anyhow!("no matches in {}; run `ingest` first", db_path.display()));
    }

    let opts = TrainOptions {
        kind,
        extra_teams: parse_list_arg("--extra-teams"),
        extra_venues: parse_list_arg("--extra-venues"),
        elo: settings.elo,
        h2h: settings.h2h,
    };
    let ctx = train_model(&history, &opts, Utc::now())?;
    ctx.save(&model_dir)?;

    println!("Model saved to {}", model_dir.display());
    if let Some(report) = &ctx.report {
        println!(
            "{:?}: train={} val={} l2={}/{} train_mse={:.4} val_mse={:.4}",
            report.kind,
            report.train_samples,
            report.val_samples,
            report.l2_home,
            report.l2_away,
            report.train_mse,
            report.val_mse
        );
    }
    println!(
        "Encoded {} teams, {} venues",
        ctx.encoders.teams.len(),
        ctx.encoders.venues.len()
    );
    Ok(())
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

fn parse_list_arg(name: &str) -> Vec<String> {
    parse_arg(name)
        .map(|raw| {
            raw.split([',', ';'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
