use chrono::{NaiveDate, NaiveTime};

use epl_forecast::dataset::MatchHistory;
use epl_forecast::elo::{EloConfig, replay};
use epl_forecast::features::{FEATURE_COUNT, FeatureAssembler, FeatureMatrix};
use epl_forecast::fixtures::{Match, ShootingRecord, ShootingStats};
use epl_forecast::h2h::H2hConfig;
use epl_forecast::pipeline::fit_encoders;
use epl_forecast::scoreline::Scoreline;
use epl_forecast::season::Season;

const EPS: f64 = 1e-9;

fn venue(team: &str) -> &'static str {
    match team {
        "A" => "A Park",
        "B" => "B Road",
        _ => "C Lane",
    }
}

fn fixture(id: i64, week: u32, day: (u32, u32), home: &str, away: &str, score: Option<(u8, u8)>) -> Match {
    Match {
        match_id: id,
        season: Season::new(2023),
        week,
        date: NaiveDate::from_ymd_opt(2023, day.0, day.1).expect("valid date"),
        kickoff: NaiveTime::from_hms_opt(15, 0, 0),
        home_team: home.to_string(),
        away_team: away.to_string(),
        venue: venue(home).to_string(),
        referee: None,
        attendance: None,
        score: score.map(|(h, a)| Scoreline::new(h, a)),
    }
}

fn shooting(m: &Match) -> Vec<ShootingRecord> {
    let Some(score) = m.score else {
        return Vec::new();
    };
    let stats = |gf: u8, ga: u8| ShootingStats {
        gf: f64::from(gf),
        ga: f64::from(ga),
        sh: f64::from(gf) * 4.0 + 2.0,
        sot: f64::from(gf) + 1.0,
        pk: 0.0,
        pkatt: 0.0,
    };
    vec![
        ShootingRecord {
            match_id: m.match_id,
            team: m.home_team.clone(),
            stats: stats(score.home, score.away),
        },
        ShootingRecord {
            match_id: m.match_id,
            team: m.away_team.clone(),
            stats: stats(score.away, score.home),
        },
    ]
}

fn seed_history() -> MatchHistory {
    let matches = vec![
        fixture(1, 1, (8, 12), "A", "B", Some((2, 1))),
        fixture(2, 2, (8, 19), "B", "C", Some((1, 1))),
        fixture(3, 3, (8, 26), "C", "A", Some((0, 2))),
        fixture(4, 4, (9, 2), "A", "B", Some((1, 1))),
        fixture(5, 5, (9, 16), "B", "C", Some((3, 0))),
        fixture(6, 6, (9, 23), "C", "A", None),
    ];
    let shooting = matches.iter().flat_map(shooting).collect();
    MatchHistory::new(matches, shooting)
}

fn assemble(history: &MatchHistory) -> FeatureMatrix {
    let encoders = fit_encoders(history, &[], &[]).expect("encoders");
    FeatureAssembler::new(&encoders, EloConfig::default(), H2hConfig::default())
        .assemble(&history.matches, &history.shooting)
        .expect("features")
}

fn get(matrix: &FeatureMatrix, id: i64, name: &str) -> f64 {
    matrix
        .row(id)
        .and_then(|row| row.get(name))
        .expect("feature present")
}

#[test]
fn elo_before_match_six_matches_hand_computation() {
    let history = seed_history();
    let (snaps, state) = replay(&history.matches, EloConfig::default());

    assert!((snaps[5].home - 1474.3063557065411).abs() < EPS);
    assert!((snaps[5].away - 1523.8244878999296).abs() < EPS);
    // Match 6 is pending, so the replay leaves ratings where match 5 put them.
    assert!((state.rating("B") - 1501.8691563935292).abs() < EPS);
    assert!((state.rating("A") - 1523.8244878999296).abs() < EPS);

    let matrix = assemble(&history);
    assert!((get(&matrix, 6, "elo_h") - 1474.3063557065411).abs() < EPS);
    assert!((get(&matrix, 6, "elo_a") - 1523.8244878999296).abs() < EPS);
    assert_eq!(get(&matrix, 1, "elo_h"), 1500.0);
    assert_eq!(get(&matrix, 1, "elo_a"), 1500.0);
}

#[test]
fn rolling_form_for_match_six() {
    let matrix = assemble(&seed_history());

    // C (home) last three: 1-1, 0-2, 0-3.
    assert!((get(&matrix, 6, "gf_rolling_h") - 1.0 / 3.0).abs() < EPS);
    assert!((get(&matrix, 6, "ga_rolling_h") - 2.0).abs() < EPS);
    assert!((get(&matrix, 6, "sh_rolling_h") - 10.0 / 3.0).abs() < EPS);
    assert!((get(&matrix, 6, "sot_rolling_h") - 4.0 / 3.0).abs() < EPS);
    // A (away) last three: 2-1, 2-0, 1-1.
    assert!((get(&matrix, 6, "gf_rolling_a") - 5.0 / 3.0).abs() < EPS);
    assert!((get(&matrix, 6, "ga_rolling_a") - 2.0 / 3.0).abs() < EPS);
    assert!((get(&matrix, 6, "sh_rolling_a") - 26.0 / 3.0).abs() < EPS);
    assert!((get(&matrix, 6, "sot_rolling_a") - 8.0 / 3.0).abs() < EPS);
    assert_eq!(get(&matrix, 6, "pk_rolling_a"), 0.0);

    assert!((get(&matrix, 6, "ppg_rolling_h") - 1.0 / 3.0).abs() < EPS);
    assert!((get(&matrix, 6, "ppg_rolling_a") - 7.0 / 3.0).abs() < EPS);
}

#[test]
fn head_to_head_and_calendar_for_match_six() {
    let matrix = assemble(&seed_history());

    assert_eq!(get(&matrix, 6, "h2h_avg_goals_h"), 0.0);
    assert_eq!(get(&matrix, 6, "h2h_avg_goals_a"), 2.0);
    assert_eq!(get(&matrix, 1, "h2h_avg_goals_h"), 1.5);

    assert_eq!(get(&matrix, 6, "home_team_encoded"), 2.0);
    assert_eq!(get(&matrix, 6, "away_team_encoded"), 0.0);
    assert_eq!(get(&matrix, 6, "venue_code"), 2.0);
    assert_eq!(get(&matrix, 6, "week"), 6.0);
    assert_eq!(get(&matrix, 6, "hour"), 15.0);
    // 2023-09-23 was a Saturday.
    assert_eq!(get(&matrix, 6, "day_code"), 5.0);
    assert_eq!(get(&matrix, 6, "season_encoded"), 1.0);
    assert_eq!(get(&matrix, 6, "pos_last_season_h"), 18.0);
}

#[test]
fn first_two_weeks_have_zero_rolling_stats() {
    let matrix = assemble(&seed_history());
    for id in [1, 2] {
        let row = matrix.row(id).expect("row");
        assert_eq!(&row.values[9..21], &[0.0; 12]);
    }
    // Week 3: C has one prior match (1-1 at B).
    assert!((get(&matrix, 3, "gf_rolling_h") - 1.0).abs() < EPS);
}

#[test]
fn input_order_does_not_change_features() {
    let history = seed_history();
    let expected = assemble(&history);

    let mut shuffled = history.clone();
    shuffled.matches.reverse();
    shuffled.shooting.reverse();
    let encoders = fit_encoders(&shuffled, &[], &[]).expect("encoders");
    let got = FeatureAssembler::new(&encoders, EloConfig::default(), H2hConfig::default())
        .assemble(&shuffled.matches, &shuffled.shooting)
        .expect("features");

    assert_eq!(got, expected);
    assert_eq!(got.rows.len(), 6);
    assert!(got.rows.iter().all(|r| r.values.len() == FEATURE_COUNT));
}

#[test]
fn unknown_team_is_surfaced() {
    let history = seed_history();
    let encoders = fit_encoders(&history, &[], &[]).expect("encoders");
    let mut matches = history.matches.clone();
    matches.push(fixture(7, 7, (9, 30), "D", "A", None));
    let err = FeatureAssembler::new(&encoders, EloConfig::default(), H2hConfig::default())
        .assemble(&matches, &history.shooting)
        .expect_err("D was never encoded");
    assert!(err.to_string().contains("unknown team 'D'"));
}

#[test]
fn match_without_shooting_record_keeps_its_window_slot() {
    let seed = seed_history();
    let mut matches = seed.matches.clone();
    matches.push(fixture(7, 7, (9, 30), "B", "A", None));
    let shooting: Vec<ShootingRecord> = seed
        .shooting
        .iter()
        .filter(|r| !(r.match_id == 4 && r.team == "B"))
        .cloned()
        .collect();
    let history = MatchHistory::new(matches, shooting);
    let matrix = assemble(&history);

    // B's last three: match 2 (1-1), match 4 (no record), match 5 (3-0).
    // Match 1 has left the window even though match 4 contributes nothing.
    assert!((get(&matrix, 7, "gf_rolling_h") - 2.0).abs() < EPS);
    assert!((get(&matrix, 7, "ga_rolling_h") - 0.5).abs() < EPS);
    assert!((get(&matrix, 7, "sh_rolling_h") - 10.0).abs() < EPS);
}
