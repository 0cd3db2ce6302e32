use chrono::{TimeDelta, TimeZone, Utc};

use epl_forecast::dataset;
use epl_forecast::prediction_cache::{self, CacheLookup, CachedPrediction};
use epl_forecast::scoreline::{MatchResult, Scoreline};

#[test]
fn cache_survives_reopening_the_database() {
    let dir = std::env::temp_dir().join(format!("epl_forecast_cache_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let path = dir.join("matches.sqlite");
    let t0 = Utc.with_ymd_and_hms(2024, 8, 16, 18, 0, 0).unwrap();
    let ttl = TimeDelta::hours(24);

    {
        let mut conn = dataset::open_db(&path).expect("open");
        let entries = vec![
            CachedPrediction::new(10, Scoreline::new(2, 0), t0),
            CachedPrediction::new(11, Scoreline::new(1, 1), t0),
        ];
        assert_eq!(prediction_cache::upsert(&mut conn, &entries).expect("upsert"), 2);
    }

    let conn = dataset::open_db(&path).expect("reopen");
    let now = t0 + TimeDelta::hours(23);
    match prediction_cache::lookup(&conn, &[11, 10], ttl, now).expect("lookup") {
        CacheLookup::Fresh(entries) => {
            let ids: Vec<i64> = entries.iter().map(|e| e.match_id).collect();
            assert_eq!(ids, vec![11, 10]);
            assert_eq!(entries[0].pred_result, MatchResult::Draw);
            assert_eq!(entries[1].pred_score, "2-0");
            assert_eq!(entries[1].timestamp, t0);
        }
        other => panic!("expected fresh batch, got {other:?}"),
    }
    drop(conn);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn one_missing_id_makes_the_batch_stale() {
    let mut conn = rusqlite::Connection::open_in_memory().expect("db");
    dataset::init_schema(&conn).expect("schema");
    let t0 = Utc.with_ymd_and_hms(2024, 8, 16, 18, 0, 0).unwrap();
    let ttl = TimeDelta::hours(24);
    prediction_cache::upsert(&mut conn, &[CachedPrediction::new(1, Scoreline::new(0, 1), t0)])
        .expect("upsert");

    assert!(prediction_cache::is_fresh(&conn, &[1], ttl, t0).expect("fresh"));
    assert!(prediction_cache::is_fresh(&conn, &[], ttl, t0).expect("empty"));
    assert!(!prediction_cache::is_fresh(&conn, &[1, 2], ttl, t0).expect("missing"));
    assert!(!prediction_cache::is_fresh(&conn, &[1], ttl, t0 + ttl).expect("expired"));

    // Stale entries are still readable on their own.
    let got = prediction_cache::get(&conn, &[2, 1]).expect("get");
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].scoreline(), Scoreline::new(0, 1));
}
