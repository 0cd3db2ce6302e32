use chrono::{NaiveDate, NaiveTime, TimeDelta};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use epl_forecast::dataset::MatchHistory;
use epl_forecast::elo::EloConfig;
use epl_forecast::features::FeatureAssembler;
use epl_forecast::fixtures::{Match, ShootingRecord, ShootingStats};
use epl_forecast::h2h::H2hConfig;
use epl_forecast::pipeline::fit_encoders;
use epl_forecast::scoreline::Scoreline;
use epl_forecast::scoring::{ScoreRecord, batch_points};
use epl_forecast::season::Season;

const TEAMS: usize = 20;

fn team(idx: usize) -> String {
    format!("Team {:02}", idx % TEAMS)
}

/// Three seasons of a 20-team league, circle-method schedule, deterministic
/// scores.
fn league_history() -> MatchHistory {
    let mut matches = Vec::new();
    let mut shooting = Vec::new();
    let mut id = 0i64;
    for season in 2021..2024 {
        let start = NaiveDate::from_ymd_opt(season, 8, 7).unwrap_or_default();
        for round in 0..(TEAMS - 1) * 2 {
            let date = start + TimeDelta::days(7 * round as i64);
            for slot in 0..TEAMS / 2 {
                let (a, b) = if slot == 0 {
                    (TEAMS - 1, round % (TEAMS - 1))
                } else {
                    (
                        (round + slot) % (TEAMS - 1),
                        (round + TEAMS - 1 - slot) % (TEAMS - 1),
                    )
                };
                let (home, away) = if round < TEAMS - 1 { (a, b) } else { (b, a) };
                id += 1;
                let hg = ((id * 7 + home as i64) % 4) as u8;
                let ag = ((id * 3 + away as i64) % 3) as u8;
                matches.push(Match {
                    match_id: id,
                    season: Season::new(season),
                    week: round as u32 + 1,
                    date,
                    kickoff: NaiveTime::from_hms_opt(15, 0, 0),
                    home_team: team(home),
                    away_team: team(away),
                    venue: format!("Ground {:02}", home),
                    referee: None,
                    attendance: None,
                    score: Some(Scoreline::new(hg, ag)),
                });
                for (name, gf, ga) in [(team(home), hg, ag), (team(away), ag, hg)] {
                    shooting.push(ShootingRecord {
                        match_id: id,
                        team: name,
                        stats: ShootingStats {
                            gf: f64::from(gf),
                            ga: f64::from(ga),
                            sh: f64::from(gf) * 4.0 + 6.0,
                            sot: f64::from(gf) + 2.0,
                            pk: 0.0,
                            pkatt: 0.0,
                        },
                    });
                }
            }
        }
    }
    MatchHistory::new(matches, shooting)
}

fn bench_feature_assembly(c: &mut Criterion) {
    let history = league_history();
    let encoders = fit_encoders(&history, &[], &[]).unwrap();
    let assembler = FeatureAssembler::new(&encoders, EloConfig::default(), H2hConfig::default());

    c.bench_function("feature_assembly_3_seasons", |b| {
        b.iter(|| {
            let matrix = assembler
                .assemble(black_box(&history.matches), black_box(&history.shooting))
                .unwrap();
            black_box(matrix.len());
        })
    });
}

fn bench_batch_points(c: &mut Criterion) {
    let records: Vec<ScoreRecord> = (0..5_000u32)
        .map(|i| ScoreRecord {
            match_id: i64::from(i),
            actual: (i % 11 != 0).then(|| Scoreline::new((i % 5) as u8, (i % 3) as u8)),
            predicted: Scoreline::new((i % 4) as u8, (i % 2) as u8),
        })
        .collect();

    c.bench_function("batch_points_5000", |b| {
        b.iter(|| {
            let summary = batch_points(black_box(&records));
            black_box(summary.total_points);
        })
    });
}

criterion_group!(benches, bench_feature_assembly, bench_batch_points);
criterion_main!(benches);
