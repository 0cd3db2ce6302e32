use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::pipeline::MatchweekReport;

pub struct ExportSummary {
    pub matches: usize,
    pub summary_rows: usize,
}

/// Writes the report to an `.xlsx` workbook with a `Predictions` sheet and
/// a `Summary` sheet.
pub fn export_report(path: &Path, report: &MatchweekReport) -> Result<ExportSummary> {
    let prediction_rows = prediction_rows(report);
    let summary_rows = summary_rows(report);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create export dir {}", parent.display()))?;
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportSummary {
        matches: prediction_rows.len().saturating_sub(1),
        summary_rows: summary_rows.len().saturating_sub(1),
    })
}

fn prediction_rows(report: &MatchweekReport) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Match ID".to_string(),
        "Date".to_string(),
        "Home".to_string(),
        "Away".to_string(),
        "Score".to_string(),
        "PredScore".to_string(),
        "PredResult".to_string(),
        "Tier".to_string(),
        "Points".to_string(),
    ]];
    for row in &report.rows {
        rows.push(vec![
            row.match_id.to_string(),
            row.date.format("%Y-%m-%d").to_string(),
            row.home_team.clone(),
            row.away_team.clone(),
            row.actual.map(|s| s.to_string()).unwrap_or_default(),
            row.predicted.to_string(),
            row.pred_result.to_string(),
            row.tier.map(|t| t.label().to_string()).unwrap_or_default(),
            row.points.map(|p| format!("{p:.1}")).unwrap_or_default(),
        ]);
    }
    rows
}

fn summary_rows(report: &MatchweekReport) -> Vec<Vec<String>> {
    let p = &report.points;
    let m = &report.metrics;
    let pairs: Vec<(&str, String)> = vec![
        ("Season", report.season.to_string()),
        ("Week", report.week.to_string()),
        ("Generated", report.generated_at.to_rfc3339()),
        ("Scored matches", p.scored.to_string()),
        ("Pending matches", p.excluded.to_string()),
        ("Exact", p.exact.to_string()),
        ("Close", p.close.to_string()),
        ("Result only", p.result_only.to_string()),
        ("Miss", p.miss.to_string()),
        ("Total points", format!("{:.1}", p.total_points)),
        ("Home MAE", format!("{:.3}", m.home_mae)),
        ("Away MAE", format!("{:.3}", m.away_mae)),
        ("RMSE", format!("{:.3}", m.rmse)),
        ("Home R2", format!("{:.3}", m.home_r2)),
        ("Away R2", format!("{:.3}", m.away_r2)),
        ("Exact rate", format!("{:.3}", m.exact_rate)),
        ("Result rate", format!("{:.3}", m.result_rate)),
        ("Goal diff sign accuracy", format!("{:.3}", m.goal_diff_sign_accuracy)),
    ];
    let mut rows = vec![vec!["Metric".to_string(), "Value".to_string()]];
    rows.extend(pairs.into_iter().map(|(k, v)| vec![k.to_string(), v]));
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
