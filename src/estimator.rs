//! Goal regression: standardized ridge models behind one `Estimator` value.

use anyhow::{Result, anyhow, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::features::{FEATURE_COUNT, FEATURE_NAMES, FEATURE_SET_VERSION};

pub const SPLIT_SEED: u64 = 42;
pub const VALIDATION_FRACTION: f64 = 0.2;
pub const L2_GRID: [f64; 7] = [0.01, 0.1, 1.0, 3.0, 10.0, 30.0, 100.0];

/// Linear model on standardized inputs with one or more outputs.
///
/// The standardization stats are fitted once on the training rows and
/// persisted with the coefficients; inference never re-fits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub intercepts: Vec<f64>,
    /// One coefficient row per output.
    pub coeffs: Vec<Vec<f64>>,
    pub l2: f64,
}

impl RidgeModel {
    /// Solves `(ZᵀZ + l2·I) β = Zᵀ(y - ȳ)` per output, where `Z` is the
    /// standardized design matrix. The intercept is not penalized.
    pub fn fit(x: &[[f64; FEATURE_COUNT]], targets: &[Vec<f64>], l2: f64) -> Result<Self> {
        let n = x.len();
        if n == 0 {
            bail!("cannot fit ridge model on zero rows");
        }
        if targets.is_empty() {
            bail!("ridge model needs at least one target");
        }
        if let Some(bad) = targets.iter().find(|t| t.len() != n) {
            bail!("target has {} rows, features have {n}", bad.len());
        }

        let (feature_means, feature_stds) = norm_stats(x);
        let z: Vec<[f64; FEATURE_COUNT]> = x
            .iter()
            .map(|row| standardize(row, &feature_means, &feature_stds))
            .collect();

        let mut gram = vec![vec![0.0; FEATURE_COUNT]; FEATURE_COUNT];
        for row in &z {
            for i in 0..FEATURE_COUNT {
                for j in i..FEATURE_COUNT {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..FEATURE_COUNT {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += l2.max(0.0);
        }

        let mut intercepts = Vec::with_capacity(targets.len());
        let mut coeffs = Vec::with_capacity(targets.len());
        for y in targets {
            let y_mean = y.iter().sum::<f64>() / n as f64;
            let mut rhs = vec![0.0; FEATURE_COUNT];
            for (row, yi) in z.iter().zip(y) {
                for (acc, zj) in rhs.iter_mut().zip(row) {
                    *acc += zj * (yi - y_mean);
                }
            }
            coeffs.push(solve(gram.clone(), rhs)?);
            intercepts.push(y_mean);
        }

        Ok(Self {
            feature_means: feature_means.to_vec(),
            feature_stds: feature_stds.to_vec(),
            intercepts,
            coeffs,
            l2,
        })
    }

    pub fn outputs(&self) -> usize {
        self.intercepts.len()
    }

    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.feature_means.len());
        self.intercepts
            .iter()
            .zip(&self.coeffs)
            .map(|(b0, beta)| {
                let mut out = *b0;
                for (idx, (xi, bi)) in x.iter().zip(beta).enumerate() {
                    let mu = self.feature_means.get(idx).copied().unwrap_or(0.0);
                    let sigma = self.feature_stds.get(idx).copied().unwrap_or(1.0);
                    out += bi * (xi - mu) / sigma;
                }
                out
            })
            .collect()
    }

    fn check_shape(&self, outputs: usize) -> Result<()> {
        let p = self.feature_means.len();
        if p != FEATURE_COUNT || self.feature_stds.len() != p {
            bail!("ridge model expects {p} features, feature set has {FEATURE_COUNT}");
        }
        if self.outputs() != outputs || self.coeffs.iter().any(|c| c.len() != p) {
            bail!("ridge model has inconsistent coefficient shape");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    Single,
    PerTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// One model with two outputs (home goals, away goals).
    Single(RidgeModel),
    /// Separate home-goals and away-goals models.
    PerTarget(RidgeModel, RidgeModel),
}

impl Estimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::Single(_) => EstimatorKind::Single,
            Estimator::PerTarget(..) => EstimatorKind::PerTarget,
        }
    }

    pub fn predict(&self, features: &[f64]) -> (f64, f64) {
        match self {
            Estimator::Single(model) => {
                let out = model.predict(features);
                (
                    out.first().copied().unwrap_or(0.0),
                    out.get(1).copied().unwrap_or(0.0),
                )
            }
            Estimator::PerTarget(home, away) => (
                home.predict(features).first().copied().unwrap_or(0.0),
                away.predict(features).first().copied().unwrap_or(0.0),
            ),
        }
    }

    pub fn validate_shape(&self) -> Result<()> {
        match self {
            Estimator::Single(model) => model.check_shape(2),
            Estimator::PerTarget(home, away) => {
                home.check_shape(1)?;
                away.check_shape(1)
            }
        }
    }
}

/// One labelled training row.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub x: [f64; FEATURE_COUNT],
    pub home_goals: f64,
    pub away_goals: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub kind: EstimatorKind,
    pub feature_set_version: u32,
    pub feature_names: Vec<String>,
    pub train_samples: usize,
    pub val_samples: usize,
    pub l2_home: f64,
    pub l2_away: f64,
    pub train_mse: f64,
    pub val_mse: f64,
}

/// Shuffles with a fixed seed, then holds out the last `VALIDATION_FRACTION`.
/// Always keeps at least one training row.
pub fn split_samples(samples: &[Sample]) -> (Vec<Sample>, Vec<Sample>) {
    let mut shuffled = samples.to_vec();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    shuffled.shuffle(&mut rng);
    let n = shuffled.len();
    let val_n = ((n as f64) * VALIDATION_FRACTION).round() as usize;
    let val_n = val_n.min(n.saturating_sub(1));
    let val = shuffled.split_off(n - val_n);
    (shuffled, val)
}

pub fn train(samples: &[Sample], kind: EstimatorKind) -> Result<(Estimator, TrainingReport)> {
    if samples.is_empty() {
        bail!("no played matches to train on");
    }
    let (train_set, val_set) = split_samples(samples);
    // With no hold-out rows the sweep scores on the training rows.
    let score_set: &[Sample] = if val_set.is_empty() { &train_set } else { &val_set };

    let x: Vec<[f64; FEATURE_COUNT]> = train_set.iter().map(|s| s.x).collect();
    let home: Vec<f64> = train_set.iter().map(|s| s.home_goals).collect();
    let away: Vec<f64> = train_set.iter().map(|s| s.away_goals).collect();

    let estimator = match kind {
        EstimatorKind::Single => {
            let targets = vec![home, away];
            let (model, _) = sweep(&x, &targets, score_set, |m, s| {
                let out = m.predict(&s.x);
                sq(out[0] - s.home_goals) + sq(out[1] - s.away_goals)
            })?;
            Estimator::Single(model)
        }
        EstimatorKind::PerTarget => {
            let (home_model, _) = sweep(&x, &[home], score_set, |m, s| {
                sq(m.predict(&s.x)[0] - s.home_goals)
            })?;
            let (away_model, _) = sweep(&x, &[away], score_set, |m, s| {
                sq(m.predict(&s.x)[0] - s.away_goals)
            })?;
            Estimator::PerTarget(home_model, away_model)
        }
    };

    let (l2_home, l2_away) = match &estimator {
        Estimator::Single(m) => (m.l2, m.l2),
        Estimator::PerTarget(h, a) => (h.l2, a.l2),
    };
    let report = TrainingReport {
        kind,
        feature_set_version: FEATURE_SET_VERSION,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        train_samples: train_set.len(),
        val_samples: val_set.len(),
        l2_home,
        l2_away,
        train_mse: mse(&estimator, &train_set),
        val_mse: mse(&estimator, score_set),
    };
    info!(
        kind = ?report.kind,
        train = report.train_samples,
        val = report.val_samples,
        l2_home,
        l2_away,
        train_mse = report.train_mse,
        val_mse = report.val_mse,
        "estimator trained"
    );
    Ok((estimator, report))
}

/// Mean squared error per goal (averaged over both sides).
pub fn mse(estimator: &Estimator, samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let (h, a) = estimator.predict(&s.x);
            sq(h - s.home_goals) + sq(a - s.away_goals)
        })
        .sum();
    sum / (2 * samples.len()) as f64
}

fn sweep<F>(
    x: &[[f64; FEATURE_COUNT]],
    targets: &[Vec<f64>],
    score_set: &[Sample],
    loss: F,
) -> Result<(RidgeModel, f64)>
where
    F: Fn(&RidgeModel, &Sample) -> f64 + Sync,
{
    let fits: Vec<Result<(RidgeModel, f64)>> = L2_GRID
        .par_iter()
        .map(|&l2| {
            let model = RidgeModel::fit(x, targets, l2)?;
            let total: f64 = score_set.iter().map(|s| loss(&model, s)).sum();
            let val = total / score_set.len().max(1) as f64;
            debug!(l2, val_loss = val, "l2 candidate");
            Ok((model, val))
        })
        .collect();

    let mut best: Option<(RidgeModel, f64)> = None;
    for fit in fits {
        let (model, val) = fit?;
        // Grid order breaks ties, so the smallest penalty wins.
        if best.as_ref().is_none_or(|(_, b)| val < *b) {
            best = Some((model, val));
        }
    }
    best.ok_or_else(|| anyhow!("empty L2 grid"))
}

fn sq(v: f64) -> f64 {
    v * v
}

fn norm_stats(x: &[[f64; FEATURE_COUNT]]) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let n = x.len().max(1) as f64;
    let mut mean = [0.0; FEATURE_COUNT];
    for row in x {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let mut std = [0.0; FEATURE_COUNT];
    for row in x {
        for i in 0..FEATURE_COUNT {
            let d = row[i] - mean[i];
            std[i] += d * d;
        }
    }
    for s in &mut std {
        *s = (*s / n).sqrt();
        // Constant columns carry no signal; keep them at zero after scaling.
        if *s < 1e-9 {
            *s = 1.0;
        }
    }
    (mean, std)
}

fn standardize(
    row: &[f64; FEATURE_COUNT],
    mean: &[f64; FEATURE_COUNT],
    std: &[f64; FEATURE_COUNT],
) -> [f64; FEATURE_COUNT] {
    let mut out = [0.0; FEATURE_COUNT];
    for i in 0..FEATURE_COUNT {
        out[i] = (row[i] - mean[i]) / std[i];
    }
    out
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            bail!("singular system at column {col}; increase the L2 penalty");
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in row + 1..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Ok(x)
}
