//! Per-match prediction cache with a time-to-live.
//!
//! Freshness is decided for a whole request batch: either every requested
//! match has an entry younger than the TTL and the batch is served from the
//! cache, or the caller recomputes the full batch and overwrites it.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StaleOrMissing;
use crate::scoreline::{MatchResult, Scoreline};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPrediction {
    pub match_id: i64,
    pub pred_home_goals: u8,
    pub pred_away_goals: u8,
    pub pred_score: String,
    pub pred_result: MatchResult,
    pub timestamp: DateTime<Utc>,
}

impl CachedPrediction {
    pub fn new(match_id: i64, predicted: Scoreline, timestamp: DateTime<Utc>) -> Self {
        Self {
            match_id,
            pred_home_goals: predicted.home,
            pred_away_goals: predicted.away,
            pred_score: predicted.to_string(),
            pred_result: predicted.result(),
            timestamp,
        }
    }

    pub fn scoreline(&self) -> Scoreline {
        Scoreline::new(self.pred_home_goals, self.pred_away_goals)
    }

    pub fn is_fresh(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) < ttl
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Every requested id, in request order.
    Fresh(Vec<CachedPrediction>),
    Stale(StaleOrMissing),
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS predictions_cache (
            match_id INTEGER PRIMARY KEY,
            pred_home_goals INTEGER NOT NULL,
            pred_away_goals INTEGER NOT NULL,
            pred_score TEXT NOT NULL,
            pred_result TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        "#,
    )
    .context("create predictions cache schema")?;
    Ok(())
}

/// True only if every id has an entry younger than `ttl`. An empty request
/// is trivially fresh.
pub fn is_fresh(conn: &Connection, ids: &[i64], ttl: TimeDelta, now: DateTime<Utc>) -> Result<bool> {
    Ok(matches!(lookup(conn, ids, ttl, now)?, CacheLookup::Fresh(_)))
}

pub fn lookup(conn: &Connection, ids: &[i64], ttl: TimeDelta, now: DateTime<Utc>) -> Result<CacheLookup> {
    let mut found = Vec::with_capacity(ids.len());
    let mut stale = StaleOrMissing::default();
    let mut stmt = conn
        .prepare(
            "SELECT match_id, pred_home_goals, pred_away_goals, pred_score, pred_result, timestamp
             FROM predictions_cache WHERE match_id = ?1",
        )
        .context("prepare cache lookup")?;

    for &id in ids {
        let raw = stmt
            .query_row(params![id], read_row)
            .optional()
            .with_context(|| format!("read cached prediction {id}"))?;
        match raw {
            None => stale.missing.push(id),
            Some(raw) => {
                let entry = raw.decode()?;
                if entry.is_fresh(ttl, now) {
                    found.push(entry);
                } else {
                    stale.expired.push(id);
                }
            }
        }
    }

    if stale.missing.is_empty() && stale.expired.is_empty() {
        Ok(CacheLookup::Fresh(found))
    } else {
        debug!(%stale, requested = ids.len(), "prediction cache miss");
        Ok(CacheLookup::Stale(stale))
    }
}

/// Entries for `ids` in request order, regardless of age. Ids without an
/// entry are skipped; check [`is_fresh`] first when the batch must be whole.
pub fn get(conn: &Connection, ids: &[i64]) -> Result<Vec<CachedPrediction>> {
    let mut stmt = conn
        .prepare(
            "SELECT match_id, pred_home_goals, pred_away_goals, pred_score, pred_result, timestamp
             FROM predictions_cache WHERE match_id = ?1",
        )
        .context("prepare cache get")?;
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(raw) = stmt
            .query_row(params![id], read_row)
            .optional()
            .with_context(|| format!("read cached prediction {id}"))?
        {
            out.push(raw.decode()?);
        }
    }
    Ok(out)
}

/// Inserts or overwrites the whole batch in one transaction.
pub fn upsert(conn: &mut Connection, entries: &[CachedPrediction]) -> Result<usize> {
    let tx = conn.transaction().context("begin cache transaction")?;
    for e in entries {
        tx.execute(
            r#"
            INSERT INTO predictions_cache (
                match_id, pred_home_goals, pred_away_goals, pred_score, pred_result, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(match_id) DO UPDATE SET
                pred_home_goals = excluded.pred_home_goals,
                pred_away_goals = excluded.pred_away_goals,
                pred_score = excluded.pred_score,
                pred_result = excluded.pred_result,
                timestamp = excluded.timestamp
            "#,
            params![
                e.match_id,
                e.pred_home_goals,
                e.pred_away_goals,
                e.pred_score,
                e.pred_result.code().to_string(),
                e.timestamp.to_rfc3339(),
            ],
        )
        .with_context(|| format!("upsert cached prediction {}", e.match_id))?;
    }
    tx.commit().context("commit cache transaction")?;
    Ok(entries.len())
}

struct RawEntry {
    match_id: i64,
    home: u8,
    away: u8,
    score: String,
    result: String,
    timestamp: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        match_id: row.get(0)?,
        home: row.get(1)?,
        away: row.get(2)?,
        score: row.get(3)?,
        result: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

impl RawEntry {
    fn decode(self) -> Result<CachedPrediction> {
        let pred_result = self
            .result
            .chars()
            .next()
            .and_then(MatchResult::from_code)
            .ok_or_else(|| anyhow!("cached prediction {} has result '{}'", self.match_id, self.result))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .with_context(|| format!("cached prediction {} timestamp", self.match_id))?
            .with_timezone(&Utc);
        Ok(CachedPrediction {
            match_id: self.match_id,
            pred_home_goals: self.home,
            pred_away_goals: self.away,
            pred_score: self.score,
            pred_result,
            timestamp,
        })
    }
}
