//! SQLite match store: fixtures, results, per-team shooting stats.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::encoding::canonical_venue;
use crate::error::DataQualityError;
use crate::fixtures::{Match, ShootingRecord, ShootingStats, sort_chronologically};
use crate::persist::app_cache_dir;
use crate::prediction_cache;
use crate::scoreline::Scoreline;
use crate::season::Season;

/// Matches (played and pending) with the shooting stats recorded for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchHistory {
    pub matches: Vec<Match>,
    pub shooting: Vec<ShootingRecord>,
}

impl MatchHistory {
    pub fn new(mut matches: Vec<Match>, shooting: Vec<ShootingRecord>) -> Self {
        sort_chronologically(&mut matches);
        Self { matches, shooting }
    }

    pub fn get(&self, match_id: i64) -> Option<&Match> {
        self.matches.iter().find(|m| m.match_id == match_id)
    }

    pub fn played(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.is_played())
    }

    pub fn matchweek(&self, season: Season, week: u32) -> Vec<&Match> {
        self.matches
            .iter()
            .filter(|m| m.season == season && m.week == week)
            .collect()
    }

    /// Latest season present in the history.
    pub fn latest_season(&self) -> Option<Season> {
        self.matches.iter().map(|m| m.season).max()
    }

    /// First week of `season` that still has a pending fixture.
    pub fn next_open_week(&self, season: Season) -> Option<u32> {
        self.matches
            .iter()
            .filter(|m| m.season == season && !m.is_played())
            .map(|m| m.week)
            .min()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub run_id: i64,
    pub rows_seen: usize,
    pub matches_upserted: usize,
    pub shooting_upserted: usize,
    pub errors: Vec<String>,
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("matches.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            season TEXT NOT NULL,
            season_start INTEGER NOT NULL,
            week INTEGER NOT NULL,
            date TEXT NOT NULL,
            kickoff TEXT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            venue TEXT NOT NULL,
            referee TEXT NULL,
            attendance INTEGER NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            score_str TEXT NULL,
            outcome TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_matches_identity
            ON matches(date, home_team, away_team);
        CREATE INDEX IF NOT EXISTS idx_matches_season_week ON matches(season_start, week);

        CREATE TABLE IF NOT EXISTS shooting_stats (
            match_id INTEGER NOT NULL,
            team TEXT NOT NULL,
            gf REAL NOT NULL,
            ga REAL NOT NULL,
            sh REAL NOT NULL,
            sot REAL NOT NULL,
            pk REAL NOT NULL,
            pkatt REAL NOT NULL,
            PRIMARY KEY (match_id, team)
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            source TEXT NOT NULL,
            rows_seen INTEGER NOT NULL,
            matches_upserted INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    prediction_cache::init_schema(conn)?;
    Ok(())
}

pub fn upsert_matches(conn: &mut Connection, matches: &[Match]) -> Result<usize> {
    let tx = conn.transaction().context("begin match transaction")?;
    for m in matches {
        upsert_match(&tx, m)?;
    }
    tx.commit().context("commit match transaction")?;
    Ok(matches.len())
}

pub fn upsert_shooting_records(conn: &mut Connection, records: &[ShootingRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin shooting transaction")?;
    for r in records {
        upsert_shooting(&tx, r)?;
    }
    tx.commit().context("commit shooting transaction")?;
    Ok(records.len())
}

/// Every stored match up to and including `through` (all seasons when
/// `None`), oldest first, plus their shooting rows.
pub fn load_history(conn: &Connection, through: Option<Season>) -> Result<MatchHistory> {
    let through = through.map(|s| s.start_year);
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, season, week, date, kickoff, home_team, away_team,
                venue, referee, attendance, home_goals, away_goals
            FROM matches
            WHERE ?1 IS NULL OR season_start <= ?1
            ORDER BY date ASC, kickoff ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![through], |row| {
            Ok(RawMatch {
                match_id: row.get(0)?,
                season: row.get(1)?,
                week: row.get(2)?,
                date: row.get(3)?,
                kickoff: row.get(4)?,
                home_team: row.get(5)?,
                away_team: row.get(6)?,
                venue: row.get(7)?,
                referee: row.get(8)?,
                attendance: row.get(9)?,
                home_goals: row.get(10)?,
                away_goals: row.get(11)?,
            })
        })
        .context("query load matches")?;

    let mut matches = Vec::new();
    for row in rows {
        let raw = row.context("decode match row")?;
        matches.push(raw.into_match()?);
    }

    let mut stmt = conn
        .prepare(
            r#"
            SELECT s.match_id, s.team, s.gf, s.ga, s.sh, s.sot, s.pk, s.pkatt
            FROM shooting_stats s
            JOIN matches m ON m.match_id = s.match_id
            WHERE ?1 IS NULL OR m.season_start <= ?1
            ORDER BY s.match_id ASC, s.team ASC
            "#,
        )
        .context("prepare load shooting query")?;
    let rows = stmt
        .query_map(params![through], |row| {
            Ok(ShootingRecord {
                match_id: row.get(0)?,
                team: row.get(1)?,
                stats: ShootingStats {
                    gf: row.get(2)?,
                    ga: row.get(3)?,
                    sh: row.get(4)?,
                    sot: row.get(5)?,
                    pk: row.get(6)?,
                    pkatt: row.get(7)?,
                },
            })
        })
        .context("query load shooting")?;
    let mut shooting = Vec::new();
    for row in rows {
        shooting.push(row.context("decode shooting row")?);
    }

    Ok(MatchHistory::new(matches, shooting))
}

/// Imports a JSON array of fixture rows. Rows that cannot be used are
/// skipped and reported; the run itself is recorded in `ingest_runs`.
pub fn import_json(conn: &mut Connection, path: &Path) -> Result<IngestSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read fixture export {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).context("parse fixture export")?;
    let rows = value
        .as_array()
        .ok_or_else(|| anyhow!("fixture export must be a JSON array of rows"))?;
    import_rows(conn, rows, &path.display().to_string())
}

pub fn import_rows(conn: &mut Connection, rows: &[Value], source: &str) -> Result<IngestSummary> {
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, source, rows_seen, matches_upserted, errors_json)
         VALUES (?1, NULL, ?2, ?3, 0, '[]')",
        params![started_at, source, rows.len() as i64],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut summary = IngestSummary {
        run_id,
        rows_seen: rows.len(),
        ..IngestSummary::default()
    };

    let tx = conn.transaction().context("begin ingest transaction")?;
    for (idx, row) in rows.iter().enumerate() {
        let parsed = match parse_fixture_row(row, idx) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(row = idx, error = %err, "skipping fixture row");
                summary.errors.push(err.to_string());
                continue;
            }
        };
        let match_id = resolve_match_id(&tx, &parsed)?;
        let m = parsed.into_match(match_id);
        upsert_match(&tx, &m)?;
        summary.matches_upserted += 1;

        for (team, stats) in shooting_rows(row) {
            upsert_shooting(
                &tx,
                &ShootingRecord {
                    match_id,
                    team,
                    stats,
                },
            )?;
            summary.shooting_upserted += 1;
        }
    }
    tx.commit().context("commit ingest transaction")?;

    let finished_at = Utc::now().to_rfc3339();
    let errors_json = serde_json::to_string(&summary.errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, matches_upserted = ?2, errors_json = ?3
         WHERE run_id = ?4",
        params![
            finished_at,
            summary.matches_upserted as i64,
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;

    info!(
        run_id,
        rows = summary.rows_seen,
        matches = summary.matches_upserted,
        shooting = summary.shooting_upserted,
        skipped = summary.errors.len(),
        "fixture import finished"
    );
    Ok(summary)
}

struct RawMatch {
    match_id: i64,
    season: String,
    week: u32,
    date: String,
    kickoff: Option<String>,
    home_team: String,
    away_team: String,
    venue: String,
    referee: Option<String>,
    attendance: Option<u32>,
    home_goals: Option<u8>,
    away_goals: Option<u8>,
}

impl RawMatch {
    fn into_match(self) -> Result<Match> {
        let season: Season = self
            .season
            .parse()
            .with_context(|| format!("match {} season", self.match_id))?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .with_context(|| format!("match {} date '{}'", self.match_id, self.date))?;
        let kickoff = self.kickoff.as_deref().and_then(parse_kickoff);
        let score = match (self.home_goals, self.away_goals) {
            (Some(h), Some(a)) => Some(Scoreline::new(h, a)),
            _ => None,
        };
        Ok(Match {
            match_id: self.match_id,
            season,
            week: self.week,
            date,
            kickoff,
            home_team: self.home_team,
            away_team: self.away_team,
            venue: self.venue,
            referee: self.referee,
            attendance: self.attendance,
            score,
        })
    }
}

struct FixtureRow {
    explicit_id: Option<i64>,
    season: Season,
    week: u32,
    date: NaiveDate,
    kickoff: Option<NaiveTime>,
    home_team: String,
    away_team: String,
    venue: String,
    referee: Option<String>,
    attendance: Option<u32>,
    score: Option<Scoreline>,
}

impl FixtureRow {
    fn into_match(self, match_id: i64) -> Match {
        Match {
            match_id,
            season: self.season,
            week: self.week,
            date: self.date,
            kickoff: self.kickoff,
            home_team: self.home_team,
            away_team: self.away_team,
            venue: self.venue,
            referee: self.referee,
            attendance: self.attendance,
            score: self.score,
        }
    }
}

fn parse_fixture_row(v: &Value, idx: usize) -> Result<FixtureRow, DataQualityError> {
    let row_err = |msg: &str, column: &str| {
        DataQualityError::new(format!("fixture row {idx}: {msg}"))
            .with_columns(vec![column.to_string()])
            .with_rows(vec![idx as i64])
    };

    let date = str_field(v, "Date")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .ok_or_else(|| row_err("missing or invalid date", "Date"))?;
    let home_team = str_field(v, "Home")
        .map(str::to_string)
        .ok_or_else(|| row_err("missing home team", "Home"))?;
    let away_team = str_field(v, "Away")
        .map(str::to_string)
        .ok_or_else(|| row_err("missing away team", "Away"))?;
    let week = v
        .get("Wk")
        .and_then(as_u32_any)
        .ok_or_else(|| row_err("missing week", "Wk"))?;
    let season = match str_field(v, "Season") {
        Some(raw) => raw
            .parse::<Season>()
            .map_err(|_| row_err("invalid season", "Season"))?,
        None => Season::containing(date),
    };
    let score = match str_field(v, "Score") {
        Some(raw) => Some(
            raw.parse::<Scoreline>()
                .map_err(|_| row_err("invalid score", "Score"))?,
        ),
        None => None,
    };

    Ok(FixtureRow {
        explicit_id: v.get("MatchId").and_then(as_i64_any),
        season,
        week,
        date,
        kickoff: str_field(v, "Time").and_then(parse_kickoff),
        home_team,
        away_team,
        venue: canonical_venue(str_field(v, "Venue").unwrap_or("")).to_string(),
        referee: str_field(v, "Referee").map(str::to_string),
        attendance: v.get("Attendance").and_then(as_u32_any),
        score,
    })
}

/// Explicit id, else the id already stored for this fixture, else the next
/// free id. Re-importing the same export never duplicates matches.
fn resolve_match_id(tx: &rusqlite::Transaction<'_>, row: &FixtureRow) -> Result<i64> {
    if let Some(id) = row.explicit_id {
        return Ok(id);
    }
    let existing = tx
        .query_row(
            "SELECT match_id FROM matches WHERE date = ?1 AND home_team = ?2 AND away_team = ?3",
            params![
                row.date.format("%Y-%m-%d").to_string(),
                row.home_team,
                row.away_team
            ],
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .context("query existing match id")?;
    if let Some(id) = existing {
        return Ok(id);
    }
    tx.query_row(
        "SELECT COALESCE(MAX(match_id), 0) + 1 FROM matches",
        [],
        |r| r.get::<_, i64>(0),
    )
    .context("allocate match id")
}

fn shooting_rows(v: &Value) -> Vec<(String, ShootingStats)> {
    let Some(list) = v.get("Shooting").and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|s| {
            let team = str_field(s, "Team")?.to_string();
            let num = |key: &str| s.get(key).and_then(as_f64_any).unwrap_or(0.0);
            Some((
                team,
                ShootingStats {
                    gf: num("GF"),
                    ga: num("GA"),
                    sh: num("Sh"),
                    sot: num("SoT"),
                    pk: num("PK"),
                    pkatt: num("PKatt"),
                },
            ))
        })
        .collect()
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &Match) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            match_id, season, season_start, week, date, kickoff, home_team,
            away_team, venue, referee, attendance, home_goals, away_goals,
            score_str, outcome, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10, ?11, ?12, ?13,
            ?14, ?15, ?16
        )
        ON CONFLICT(match_id) DO UPDATE SET
            season = excluded.season,
            season_start = excluded.season_start,
            week = excluded.week,
            date = excluded.date,
            kickoff = excluded.kickoff,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            venue = excluded.venue,
            referee = excluded.referee,
            attendance = excluded.attendance,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            score_str = excluded.score_str,
            outcome = excluded.outcome,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id,
            m.season.to_string(),
            m.season.start_year,
            m.week,
            m.date.format("%Y-%m-%d").to_string(),
            m.kickoff.map(|t| t.format("%H:%M").to_string()),
            m.home_team,
            m.away_team,
            m.venue,
            m.referee,
            m.attendance,
            m.score.map(|s| s.home),
            m.score.map(|s| s.away),
            m.score.map(|s| s.to_string()),
            m.result().map(|r| r.code().to_string()),
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.match_id))?;
    Ok(())
}

fn upsert_shooting(tx: &rusqlite::Transaction<'_>, r: &ShootingRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO shooting_stats (match_id, team, gf, ga, sh, sot, pk, pkatt)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(match_id, team) DO UPDATE SET
            gf = excluded.gf,
            ga = excluded.ga,
            sh = excluded.sh,
            sot = excluded.sot,
            pk = excluded.pk,
            pkatt = excluded.pkatt
        "#,
        params![
            r.match_id,
            r.team,
            r.stats.gf,
            r.stats.ga,
            r.stats.sh,
            r.stats.sot,
            r.stats.pk,
            r.stats.pkatt,
        ],
    )
    .with_context(|| format!("upsert shooting {} {}", r.match_id, r.team))?;
    Ok(())
}

/// Accepts "20:00" and "20:00 (21:00)" style kickoff strings.
fn parse_kickoff(raw: &str) -> Option<NaiveTime> {
    let hhmm = raw.trim().get(..5)?;
    NaiveTime::parse_from_str(hhmm, "%H:%M").ok()
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return (f.fract() == 0.0).then_some(f as i64);
    }
    v.as_str()?.trim().replace(',', "").parse::<i64>().ok()
}

fn as_u32_any(v: &Value) -> Option<u32> {
    let n = as_i64_any(v)?;
    u32::try_from(n).ok()
}

pub(crate) fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}
