use std::path::{Path, PathBuf};

use chrono::{TimeDelta, TimeZone, Utc};
use rusqlite::Connection;

use epl_forecast::dataset::{self, MatchHistory};
use epl_forecast::estimator::EstimatorKind;
use epl_forecast::model_context::{CONTEXT_FILE, ModelContext};
use epl_forecast::pipeline::{TrainOptions, predict_matches, predict_matchweek, train_model};
use epl_forecast::prediction_cache;
use epl_forecast::season::Season;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/matches.json")
}

fn imported() -> (Connection, MatchHistory) {
    let mut conn = Connection::open_in_memory().expect("in-memory db");
    dataset::init_schema(&conn).expect("schema");
    dataset::import_json(&mut conn, &fixture_path()).expect("import");
    let history = dataset::load_history(&conn, None).expect("history");
    (conn, history)
}

fn trained(history: &MatchHistory, kind: EstimatorKind) -> ModelContext {
    let opts = TrainOptions {
        kind,
        ..TrainOptions::default()
    };
    let now = Utc.with_ymd_and_hms(2023, 9, 15, 9, 0, 0).unwrap();
    train_model(history, &opts, now).expect("train")
}

#[test]
fn import_skips_bad_rows_and_reimport_is_idempotent() {
    let mut conn = Connection::open_in_memory().expect("in-memory db");
    dataset::init_schema(&conn).expect("schema");

    let first = dataset::import_json(&mut conn, &fixture_path()).expect("import");
    assert_eq!(first.rows_seen, 13);
    assert_eq!(first.matches_upserted, 12);
    assert_eq!(first.shooting_upserted, 20);
    assert_eq!(first.errors.len(), 1);

    let second = dataset::import_json(&mut conn, &fixture_path()).expect("reimport");
    assert_eq!(second.matches_upserted, 12);
    assert!(second.run_id > first.run_id);

    let history = dataset::load_history(&conn, None).expect("history");
    assert_eq!(history.matches.len(), 12);
    assert_eq!(history.played().count(), 10);
    assert_eq!(history.shooting.len(), 20);

    let season = Season::new(2023);
    assert_eq!(history.latest_season(), Some(season));
    assert_eq!(history.next_open_week(season), Some(6));

    let opener = &history.matches[0];
    assert_eq!(opener.home_team, "Arsenal");
    assert_eq!(opener.attendance, Some(40123));
    assert_eq!(opener.score.map(|s| (s.home, s.away)), Some((2, 1)));
}

#[test]
fn matchweek_predictions_are_cached_until_expiry() {
    let (mut conn, history) = imported();
    let ctx = trained(&history, EstimatorKind::PerTarget);
    let season = Season::new(2023);
    let ttl = TimeDelta::hours(24);
    let t0 = Utc.with_ymd_and_hms(2023, 9, 16, 10, 0, 0).unwrap();

    let first = predict_matchweek(&mut conn, &ctx, &history, season, 6, ttl, t0).expect("predict");
    assert_eq!(first.rows.len(), 2);
    assert_eq!(first.points.scored, 0);
    assert_eq!(first.points.excluded, 2);
    assert_eq!(first.metrics.samples, 0);
    assert!(first.rows.iter().all(|r| r.tier.is_none()));

    let ids: Vec<i64> = first.rows.iter().map(|r| r.match_id).collect();
    assert!(prediction_cache::is_fresh(&conn, &ids, ttl, t0 + TimeDelta::hours(1)).expect("fresh"));

    // Within the TTL the cached rows come back untouched.
    let t1 = t0 + TimeDelta::hours(2);
    let cached = predict_matches(&mut conn, &ctx, &history, &ids, ttl, t1).expect("cached");
    assert!(cached.iter().all(|p| p.timestamp == t0));
    let again = predict_matchweek(&mut conn, &ctx, &history, season, 6, ttl, t1).expect("again");
    assert_eq!(
        again.rows.iter().map(|r| r.predicted).collect::<Vec<_>>(),
        first.rows.iter().map(|r| r.predicted).collect::<Vec<_>>()
    );

    let t2 = t0 + ttl;
    assert!(!prediction_cache::is_fresh(&conn, &ids, ttl, t2).expect("expired"));
    let refreshed = predict_matches(&mut conn, &ctx, &history, &ids, ttl, t2).expect("refresh");
    assert!(refreshed.iter().all(|p| p.timestamp == t2));
    assert_eq!(
        refreshed.iter().map(|p| p.scoreline()).collect::<Vec<_>>(),
        cached.iter().map(|p| p.scoreline()).collect::<Vec<_>>()
    );
}

#[test]
fn played_week_is_scored() {
    let (mut conn, history) = imported();
    let ctx = trained(&history, EstimatorKind::Single);
    let now = Utc.with_ymd_and_hms(2023, 9, 16, 10, 0, 0).unwrap();

    let report = predict_matchweek(
        &mut conn,
        &ctx,
        &history,
        Season::new(2023),
        5,
        TimeDelta::hours(24),
        now,
    )
    .expect("predict");
    assert_eq!(report.points.scored, 2);
    assert_eq!(report.points.excluded, 0);
    assert_eq!(report.metrics.samples, 2);
    let total: f64 = report.rows.iter().filter_map(|r| r.points).sum();
    assert_eq!(total, report.points.total_points);
}

#[test]
fn unknown_match_ids_are_rejected() {
    let (mut conn, history) = imported();
    let ctx = trained(&history, EstimatorKind::PerTarget);
    let now = Utc.with_ymd_and_hms(2023, 9, 16, 10, 0, 0).unwrap();

    let err = predict_matches(&mut conn, &ctx, &history, &[1, 999], TimeDelta::hours(24), now)
        .expect_err("999 does not exist");
    assert!(err.to_string().contains("999"));
    assert!(prediction_cache::get(&conn, &[1]).expect("get").is_empty());

    let err = predict_matchweek(
        &mut conn,
        &ctx,
        &history,
        Season::new(2023),
        30,
        TimeDelta::hours(24),
        now,
    )
    .expect_err("no week 30");
    assert!(err.to_string().contains("week 30"));
}

#[test]
fn saved_model_predicts_the_same() {
    let (_conn, history) = imported();
    let ctx = trained(&history, EstimatorKind::PerTarget);
    let dir = std::env::temp_dir().join(format!("epl_forecast_model_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    assert!(ModelContext::load(&dir).is_err());
    ctx.save(&dir).expect("save");
    assert!(dir.join(CONTEXT_FILE).exists());

    let loaded = ModelContext::load(&dir).expect("load");
    assert_eq!(loaded.encoders, ctx.encoders);
    assert_eq!(loaded.elo, ctx.elo);
    assert_eq!(loaded.trained_at, ctx.trained_at);
    assert_eq!(loaded.estimator.kind(), EstimatorKind::PerTarget);

    let before = ctx
        .assembler()
        .assemble(&history.matches, &history.shooting)
        .expect("features");
    let after = loaded
        .assembler()
        .assemble(&history.matches, &history.shooting)
        .expect("features");
    assert_eq!(before, after);
    for row in &before.rows {
        let (h0, a0) = ctx.estimator.predict(&row.values);
        let (h1, a1) = loaded.estimator.predict(&row.values);
        assert!((h0 - h1).abs() < 1e-9);
        assert!((a0 - a1).abs() < 1e-9);
    }
    let _ = std::fs::remove_dir_all(&dir);
}
