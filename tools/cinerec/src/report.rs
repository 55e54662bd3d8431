//! Evaluation result files
//!
//! Every file is rendered from the same `EvaluationReport`:
//! `<stem>.json`, `<stem>_metrics.csv`, `<stem>.log` and `<stem>.txt`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cinerec_engine::EvaluationReport;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct SavedFiles {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub log: PathBuf,
    pub text: PathBuf,
}

impl SavedFiles {
    pub fn entries(&self) -> [(&'static str, &Path); 4] {
        [
            ("JSON", self.json.as_path()),
            ("CSV", self.csv.as_path()),
            ("LOG", self.log.as_path()),
            ("TXT", self.text.as_path()),
        ]
    }
}

/// Write all four renderings into `output_dir`, creating it if needed
pub fn save_results(report: &EvaluationReport, output_dir: &Path) -> Result<SavedFiles> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let stem = file_stem(report);
    let saved = SavedFiles {
        json: output_dir.join(format!("{stem}.json")),
        csv: output_dir.join(format!("{stem}_metrics.csv")),
        log: output_dir.join(format!("{stem}.log")),
        text: output_dir.join(format!("{stem}.txt")),
    };

    write_json(report, &saved.json)?;
    write_csv(report, &saved.csv)?;
    write_file(&saved.log, &render_log(report))?;
    write_file(&saved.text, &render_text(report))?;

    tracing::info!(dir = %output_dir.display(), stem = %stem, "Saved evaluation results");
    Ok(saved)
}

/// `evaluation_<YYYYmmdd_HHMMSS>` from the report's completion time
fn file_stem(report: &EvaluationReport) -> String {
    let finished = DateTime::parse_from_rfc3339(&report.timestamp)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    format!("evaluation_{}", finished.format("%Y%m%d_%H%M%S"))
}

fn write_json(report: &EvaluationReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn write_csv(report: &EvaluationReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in report.metric_rows() {
        writer.serialize(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Human-readable summary
pub fn render_text(report: &EvaluationReport) -> String {
    let mut out = String::new();
    for line in summary_lines(report) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// The text summary with a timestamp and level on every line
pub fn render_log(report: &EvaluationReport) -> String {
    let mut out = String::new();
    for line in summary_lines(report) {
        let _ = writeln!(out, "{} - INFO - {}", report.timestamp, line);
    }
    out
}

fn summary_lines(report: &EvaluationReport) -> Vec<String> {
    let m = &report.metrics;
    let k = m.ranking.k;
    let rule = "=".repeat(RULE_WIDTH);

    let mut lines = vec![
        rule.clone(),
        format!(
            "MOVIE RECOMMENDATION SYSTEM EVALUATION RESULTS ({} MODE)",
            report.config.mode.to_string().to_uppercase()
        ),
        rule.clone(),
        String::new(),
        "EVALUATION CONFIGURATION:".to_string(),
    ];
    lines.extend(key_values(&report.config));

    lines.push(String::new());
    lines.push("DATASET INFORMATION:".to_string());
    lines.extend(key_values(&report.dataset));

    lines.push(String::new());
    lines.push("RATING PREDICTION METRICS:".to_string());
    lines.push(format!("  mae: {:.4}", m.rating.mae));
    lines.push(format!("  rmse: {:.4}", m.rating.rmse));
    lines.push(format!("  count: {}", m.rating.count));

    lines.push(String::new());
    lines.push("RANKING METRICS:".to_string());
    lines.push(format!("  precision@{k}: {:.4}", m.ranking.precision));
    lines.push(format!("  recall@{k}: {:.4}", m.ranking.recall));
    lines.push(format!("  f1@{k}: {:.4}", m.ranking.f1));
    lines.push(format!("  ndcg@{k}: {:.4}", m.ranking.ndcg));

    if let Some(diversity) = &m.diversity {
        lines.push(String::new());
        lines.push("DIVERSITY METRICS:".to_string());
        lines.push(format!(
            "  avg_intra_list_diversity: {:.4}",
            diversity.avg_intra_list_diversity
        ));
        lines.push(format!("  avg_genre_coverage: {:.4}", diversity.avg_genre_coverage));
        lines.push(format!("  avg_unique_genres: {:.4}", diversity.avg_unique_genres));
    }

    lines.push(String::new());
    lines.push(format!("COVERAGE: {:.4}", m.catalog_coverage));
    lines.push(format!("COLD START RATE: {:.4}", m.cold_start_rate));
    lines.push(format!(
        "EVALUATION TIME: {:.2} seconds",
        report.evaluation_time_seconds
    ));
    lines.push(String::new());
    lines.push(format!("Evaluation completed at: {}", report.timestamp));
    lines.push(rule);
    lines
}

/// `  key: value` lines for each field of a flat record
fn key_values<T: Serialize>(record: &T) -> Vec<String> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields
            .iter()
            .map(|(key, value)| format!("  {}: {}", key, display_value(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
