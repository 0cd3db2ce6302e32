use std::path::PathBuf;

use anyhow::{Result, anyhow};

use epl_forecast::config::{Settings, load_dotenv};
use epl_forecast::{dataset, logging};

fn main() -> Result<()> {
    load_dotenv();
    logging::init("info");
    let settings = Settings::from_env()?;

    let inputs = parse_input_args();
    if inputs.is_empty() {
        return Err(anyhow!(
            "usage: ingest [--db <path>] <fixtures.json> [more.json ...]"
        ));
    }
    let db_path = parse_db_path_arg().unwrap_or(settings.db_path);
    let mut conn = dataset::open_db(&db_path)?;

    println!("DB: {}", db_path.display());
    for input in &inputs {
        let summary = dataset::import_json(&mut conn, input)?;
        println!(
            "{}: rows={} matches={} shooting={} skipped={}",
            input.display(),
            summary.rows_seen,
            summary.matches_upserted,
            summary.shooting_upserted,
            summary.errors.len()
        );
        for err in summary.errors.iter().take(6) {
            println!("   - {err}");
        }
    }

    let history = dataset::load_history(&conn, None)?;
    println!(
        "Stored: {} matches ({} played), {} shooting rows",
        history.matches.len(),
        history.played().count(),
        history.shooting.len()
    );
    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

/// Positional arguments, skipping `--db` and its value.
fn parse_input_args() -> Vec<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--db" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        out.push(PathBuf::from(arg));
    }
    out
}
