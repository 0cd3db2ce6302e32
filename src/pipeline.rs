//! Training and cached prediction runs over a full match history.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::dataset::MatchHistory;
use crate::elo::EloConfig;
use crate::encoding::{CategoryEncoder, EncoderArtifact};
use crate::error::CategoryKind;
use crate::estimator::{self, EstimatorKind, Sample};
use crate::evaluation::{ScoreMetrics, evaluate_scores};
use crate::features::FeatureAssembler;
use crate::h2h::H2hConfig;
use crate::model_context::ModelContext;
use crate::prediction_cache::{self, CacheLookup, CachedPrediction};
use crate::scoreline::{MatchResult, Scoreline};
use crate::scoring::{PointsSummary, ScoreRecord, ScoreTier, batch_points};
use crate::season::Season;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub kind: EstimatorKind,
    /// Teams not yet in the history (e.g. promoted sides) to encode anyway.
    pub extra_teams: Vec<String>,
    pub extra_venues: Vec<String>,
    pub elo: EloConfig,
    pub h2h: H2hConfig,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            kind: EstimatorKind::PerTarget,
            extra_teams: Vec::new(),
            extra_venues: Vec::new(),
            elo: EloConfig::default(),
            h2h: H2hConfig::default(),
        }
    }
}

pub fn fit_encoders(
    history: &MatchHistory,
    extra_teams: &[String],
    extra_venues: &[String],
) -> Result<EncoderArtifact> {
    let first_season = history
        .matches
        .iter()
        .map(|m| m.season)
        .min()
        .ok_or_else(|| anyhow!("cannot fit encoders on an empty history"))?;
    let teams = CategoryEncoder::fit(
        CategoryKind::Team,
        history
            .matches
            .iter()
            .flat_map(|m| [m.home_team.as_str(), m.away_team.as_str()])
            .chain(extra_teams.iter().map(String::as_str)),
    );
    let venues = CategoryEncoder::fit(
        CategoryKind::Venue,
        history
            .matches
            .iter()
            .map(|m| m.venue.as_str())
            .chain(extra_venues.iter().map(String::as_str)),
    );
    Ok(EncoderArtifact::new(first_season, teams, venues))
}

/// Fits encoders and estimator on every played match in `history`.
pub fn train_model(history: &MatchHistory, opts: &TrainOptions, now: DateTime<Utc>) -> Result<ModelContext> {
    let encoders = fit_encoders(history, &opts.extra_teams, &opts.extra_venues)?;
    let matrix = FeatureAssembler::new(&encoders, opts.elo, opts.h2h)
        .assemble(&history.matches, &history.shooting)
        .context("assemble training features")?;

    let samples: Vec<Sample> = matrix
        .rows
        .iter()
        .filter_map(|row| {
            let score = history.get(row.match_id)?.score?;
            Some(Sample {
                x: row.values,
                home_goals: f64::from(score.home),
                away_goals: f64::from(score.away),
            })
        })
        .collect();
    if samples.is_empty() {
        bail!("history has no played matches to train on");
    }

    let (estimator, report) = estimator::train(&samples, opts.kind)?;
    Ok(ModelContext {
        encoders,
        estimator,
        elo: opts.elo,
        h2h: opts.h2h,
        trained_at: now,
        report: Some(report),
    })
}

/// Predictions for `ids`, in request order.
///
/// Served from the cache only when every id is fresh; otherwise the whole
/// history is replayed, every requested match is predicted again and the
/// batch overwrites its cache entries in one transaction.
pub fn predict_matches(
    conn: &mut Connection,
    ctx: &ModelContext,
    history: &MatchHistory,
    ids: &[i64],
    ttl: TimeDelta,
    now: DateTime<Utc>,
) -> Result<Vec<CachedPrediction>> {
    let stale = match prediction_cache::lookup(conn, ids, ttl, now)? {
        CacheLookup::Fresh(entries) => {
            info!(requested = ids.len(), "prediction cache hit");
            return Ok(entries);
        }
        CacheLookup::Stale(stale) => stale,
    };

    let unknown: Vec<i64> = ids
        .iter()
        .copied()
        .filter(|id| history.get(*id).is_none())
        .collect();
    if !unknown.is_empty() {
        bail!("unknown match ids: {unknown:?}");
    }
    info!(
        requested = ids.len(),
        missing = stale.missing.len(),
        expired = stale.expired.len(),
        history = history.matches.len(),
        "recomputing predictions"
    );

    let matrix = ctx
        .assembler()
        .assemble(&history.matches, &history.shooting)
        .context("assemble prediction features")?;

    let mut entries = Vec::with_capacity(ids.len());
    for &id in ids {
        let row = matrix
            .row(id)
            .ok_or_else(|| anyhow!("no feature row for match {id}"))?;
        let (home, away) = ctx.estimator.predict(&row.values);
        entries.push(CachedPrediction::new(
            id,
            Scoreline::from_prediction(home, away),
            now,
        ));
    }
    prediction_cache::upsert(conn, &entries)?;
    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub match_id: i64,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub actual: Option<Scoreline>,
    pub predicted: Scoreline,
    pub pred_result: MatchResult,
    pub tier: Option<ScoreTier>,
    pub points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchweekReport {
    pub season: Season,
    pub week: u32,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub points: PointsSummary,
    pub metrics: ScoreMetrics,
}

pub fn build_report(
    history: &MatchHistory,
    predictions: &[CachedPrediction],
    season: Season,
    week: u32,
    now: DateTime<Utc>,
) -> Result<MatchweekReport> {
    let mut rows = Vec::with_capacity(predictions.len());
    let mut records = Vec::with_capacity(predictions.len());
    for p in predictions {
        let m = history
            .get(p.match_id)
            .ok_or_else(|| anyhow!("prediction for unknown match {}", p.match_id))?;
        let record = ScoreRecord {
            match_id: p.match_id,
            actual: m.score,
            predicted: p.scoreline(),
        };
        rows.push(ReportRow {
            match_id: m.match_id,
            date: m.date,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            actual: m.score,
            predicted: record.predicted,
            pred_result: p.pred_result,
            tier: record.tier(),
            points: record.points(),
        });
        records.push(record);
    }

    Ok(MatchweekReport {
        season,
        week,
        generated_at: now,
        rows,
        points: batch_points(&records),
        metrics: evaluate_scores(&records),
    })
}

/// Predicts one matchweek through the cache and scores it.
pub fn predict_matchweek(
    conn: &mut Connection,
    ctx: &ModelContext,
    history: &MatchHistory,
    season: Season,
    week: u32,
    ttl: TimeDelta,
    now: DateTime<Utc>,
) -> Result<MatchweekReport> {
    let ids: Vec<i64> = history
        .matchweek(season, week)
        .iter()
        .map(|m| m.match_id)
        .collect();
    if ids.is_empty() {
        bail!("no fixtures stored for {season} week {week}");
    }
    let predictions = predict_matches(conn, ctx, history, &ids, ttl, now)?;
    build_report(history, &predictions, season, week, now)
}
