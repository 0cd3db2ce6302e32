use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::dataset::as_f64_any;
use crate::error::DataQualityError;
use crate::scoreline::Scoreline;
use crate::scoring::ScoreRecord;

pub const REQUIRED_COLUMNS: [&str; 4] = ["FTHG", "FTAG", "PredFTHG", "PredFTAG"];

/// Actual and predicted goals for one match. Predictions may be raw
/// regression outputs; actuals are whole goals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalPair {
    pub actual_home: f64,
    pub actual_away: f64,
    pub pred_home: f64,
    pub pred_away: f64,
}

impl From<(Scoreline, Scoreline)> for GoalPair {
    fn from((actual, predicted): (Scoreline, Scoreline)) -> Self {
        Self {
            actual_home: f64::from(actual.home),
            actual_away: f64::from(actual.away),
            pred_home: f64::from(predicted.home),
            pred_away: f64::from(predicted.away),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetrics {
    pub samples: usize,
    pub home_mae: f64,
    pub away_mae: f64,
    pub home_rmse: f64,
    pub away_rmse: f64,
    pub home_r2: f64,
    pub away_r2: f64,
    /// Over both sides together.
    pub rmse: f64,
    pub exact_rate: f64,
    pub goal_diff_sign_accuracy: f64,
    pub result_rate: f64,
}

pub fn evaluate(pairs: &[GoalPair]) -> ScoreMetrics {
    let valid: Vec<&GoalPair> = pairs
        .iter()
        .filter(|p| {
            p.actual_home.is_finite()
                && p.actual_away.is_finite()
                && p.pred_home.is_finite()
                && p.pred_away.is_finite()
        })
        .collect();
    if valid.is_empty() {
        warn!(rows = pairs.len(), "no valid rows to evaluate; returning zeroed metrics");
        return ScoreMetrics::default();
    }

    let home: Vec<(f64, f64)> = valid.iter().map(|p| (p.actual_home, p.pred_home)).collect();
    let away: Vec<(f64, f64)> = valid.iter().map(|p| (p.actual_away, p.pred_away)).collect();
    let n = valid.len() as f64;

    let mut exact = 0usize;
    let mut sign_hits = 0usize;
    let mut result_hits = 0usize;
    for p in &valid {
        let actual = Scoreline::from_prediction(p.actual_home, p.actual_away);
        let predicted = Scoreline::from_prediction(p.pred_home, p.pred_away);
        if actual == predicted {
            exact += 1;
        }
        if actual.result() == predicted.result() {
            result_hits += 1;
        }
        if sign(p.actual_home - p.actual_away) == sign(p.pred_home - p.pred_away) {
            sign_hits += 1;
        }
    }

    let sq_sum: f64 = home
        .iter()
        .chain(&away)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    ScoreMetrics {
        samples: valid.len(),
        home_mae: mae(&home),
        away_mae: mae(&away),
        home_rmse: rmse(&home),
        away_rmse: rmse(&away),
        home_r2: r2(&home),
        away_r2: r2(&away),
        rmse: (sq_sum / (2.0 * n)).sqrt(),
        exact_rate: exact as f64 / n,
        goal_diff_sign_accuracy: sign_hits as f64 / n,
        result_rate: result_hits as f64 / n,
    }
}

/// Metrics over scored records; pending matches are dropped.
pub fn evaluate_scores(records: &[ScoreRecord]) -> ScoreMetrics {
    let pairs: Vec<GoalPair> = records
        .iter()
        .filter_map(|r| r.actual.map(|a| GoalPair::from((a, r.predicted))))
        .collect();
    evaluate(&pairs)
}

/// Loosely typed records with `FTHG`, `FTAG`, `PredFTHG`, `PredFTAG`.
///
/// Numbers and numeric strings are accepted. Null or empty cells drop the
/// row. A column absent from every record, or a cell that holds something
/// non-numeric, is a data quality error.
pub fn evaluate_records(records: &[Value]) -> Result<ScoreMetrics, DataQualityError> {
    if records.is_empty() {
        return Ok(evaluate(&[]));
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| records.iter().all(|r| r.get(**col).is_none()))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DataQualityError::new("missing required evaluation columns").with_columns(missing));
    }

    let mut pairs = Vec::with_capacity(records.len());
    let mut bad_cols: Vec<String> = Vec::new();
    let mut bad_rows: Vec<i64> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let mut cells = [f64::NAN; 4];
        let mut row_ok = true;
        for (slot, col) in cells.iter_mut().zip(REQUIRED_COLUMNS) {
            match coerce_cell(record.get(col)) {
                Cell::Number(v) => *slot = v,
                Cell::Empty => row_ok = false,
                Cell::Invalid => {
                    row_ok = false;
                    if !bad_cols.iter().any(|c| c == col) {
                        bad_cols.push(col.to_string());
                    }
                    if bad_rows.last() != Some(&(idx as i64)) {
                        bad_rows.push(idx as i64);
                    }
                }
            }
        }
        if row_ok {
            pairs.push(GoalPair {
                actual_home: cells[0],
                actual_away: cells[1],
                pred_home: cells[2],
                pred_away: cells[3],
            });
        }
    }
    if !bad_rows.is_empty() {
        return Err(DataQualityError::new("non-numeric goal values")
            .with_columns(bad_cols)
            .with_rows(bad_rows));
    }
    Ok(evaluate(&pairs))
}

enum Cell {
    Number(f64),
    Empty,
    Invalid,
}

fn coerce_cell(v: Option<&Value>) -> Cell {
    match v {
        None | Some(Value::Null) => Cell::Empty,
        Some(Value::String(s)) if s.trim().is_empty() => Cell::Empty,
        Some(v) => match as_f64_any(v) {
            Some(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Invalid,
        },
    }
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn mae(pairs: &[(f64, f64)]) -> f64 {
    pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / pairs.len() as f64
}

fn rmse(pairs: &[(f64, f64)]) -> f64 {
    (pairs.iter().map(|(a, p)| (a - p).powi(2)).sum::<f64>() / pairs.len() as f64).sqrt()
}

/// 1 - SS_res / SS_tot. With constant actuals: 1.0 for a perfect fit, else 0.0.
fn r2(pairs: &[(f64, f64)]) -> f64 {
    let mean = pairs.iter().map(|(a, _)| a).sum::<f64>() / pairs.len() as f64;
    let ss_tot: f64 = pairs.iter().map(|(a, _)| (a - mean).powi(2)).sum();
    let ss_res: f64 = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn perfect_predictions() {
        let pairs: Vec<GoalPair> = [((2, 1), (2, 1)), ((0, 0), (0, 0)), ((1, 3), (1, 3))]
            .into_iter()
            .map(|((ah, aa), (ph, pa))| GoalPair::from((Scoreline::new(ah, aa), Scoreline::new(ph, pa))))
            .collect();
        let m = evaluate(&pairs);
        assert_eq!(m.samples, 3);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.home_r2, 1.0);
        assert_eq!(m.exact_rate, 1.0);
        assert_eq!(m.result_rate, 1.0);
    }

    #[test]
    fn raw_predictions_are_truncated_for_exact_and_result() {
        let m = evaluate(&[GoalPair {
            actual_home: 2.0,
            actual_away: 1.0,
            pred_home: 2.7,
            pred_away: 1.4,
        }]);
        assert_eq!(m.exact_rate, 1.0);
        assert!((m.home_mae - 0.7).abs() < 1e-12);
        assert!((m.away_mae - 0.4).abs() < 1e-12);
        // Single row: constant actuals, imperfect fit.
        assert_eq!(m.home_r2, 0.0);
    }

    #[test]
    fn records_coerce_and_drop_pending() {
        let records = vec![
            json!({"FTHG": 2, "FTAG": "1", "PredFTHG": "2", "PredFTAG": 0}),
            json!({"FTHG": null, "FTAG": null, "PredFTHG": 1, "PredFTAG": 1}),
            json!({"FTHG": "", "FTAG": "", "PredFTHG": 0, "PredFTAG": 0}),
        ];
        let m = evaluate_records(&records).unwrap();
        assert_eq!(m.samples, 1);
        assert_eq!(m.result_rate, 1.0);
        assert_eq!(m.exact_rate, 0.0);
    }

    #[test]
    fn missing_column_is_an_error() {
        let records = vec![json!({"FTHG": 1, "FTAG": 0, "PredFTHG": 1})];
        let err = evaluate_records(&records).unwrap_err();
        assert_eq!(err.columns, vec!["PredFTAG".to_string()]);
    }

    #[test]
    fn non_numeric_cell_names_row_and_column() {
        let records = vec![
            json!({"FTHG": 1, "FTAG": 0, "PredFTHG": 1, "PredFTAG": 0}),
            json!({"FTHG": "two", "FTAG": 0, "PredFTHG": 1, "PredFTAG": 0}),
        ];
        let err = evaluate_records(&records).unwrap_err();
        assert_eq!(err.columns, vec!["FTHG".to_string()]);
        assert_eq!(err.rows, vec![1]);
    }

    #[test]
    fn empty_batch_is_zeroed() {
        assert_eq!(evaluate(&[]), ScoreMetrics::default());
        assert_eq!(evaluate_records(&[]).unwrap(), ScoreMetrics::default());
    }
}
