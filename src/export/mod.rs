//! Output rendering: per-invoice JSON/CSV, the batch summary and the ZIP bundle.

pub mod bundle;
pub mod csv_export;

use crate::domain::model::{ProcessedInvoice, RunReport};
use crate::utils::display_name::sanitize_filename;
use crate::utils::error::Result;
use std::collections::HashSet;

pub const SUMMARY_FILE_NAME: &str = "invoices.csv";
pub const REPORT_FILE_NAME: &str = "report.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl ExportFile {
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }
}

/// File stems derived from display names, made unique within the batch.
pub fn unique_file_stems(invoices: &[ProcessedInvoice]) -> Vec<String> {
    // 批次檔名保留給 invoices.csv 與 report.json
    let mut used: HashSet<String> = [SUMMARY_FILE_NAME, REPORT_FILE_NAME]
        .iter()
        .filter_map(|name| name.rsplit_once('.'))
        .map(|(stem, _)| stem.to_string())
        .collect();
    invoices
        .iter()
        .map(|invoice| {
            let base = match sanitize_filename(invoice.display_name.trim()) {
                s if s.trim().is_empty() => "invoice".to_string(),
                s => s,
            };
            let mut stem = base.clone();
            let mut n = 2;
            while !used.insert(stem.to_lowercase()) {
                stem = format!("{} ({})", base, n);
                n += 1;
            }
            stem
        })
        .collect()
}

/// Renders every requested format. `report.json` is always included.
pub fn render_outputs(
    invoices: &[ProcessedInvoice],
    report: &RunReport,
    formats: &[String],
) -> Result<Vec<ExportFile>> {
    let wants = |format: &str| formats.iter().any(|f| f.eq_ignore_ascii_case(format));
    let mut files = Vec::new();

    for (invoice, stem) in invoices.iter().zip(unique_file_stems(invoices)) {
        if wants("json") {
            let json = serde_json::to_string_pretty(invoice)?;
            files.push(ExportFile::new(format!("{}.json", stem), json.into_bytes()));
        }
        if wants("csv") {
            let csv = csv_export::build_invoice_csv(invoice);
            files.push(ExportFile::new(format!("{}.csv", stem), csv.into_bytes()));
        }
    }

    if wants("csv") {
        let summary = csv_export::build_summary_csv(invoices)?;
        files.push(ExportFile::new(SUMMARY_FILE_NAME, summary.into_bytes()));
    }

    files.push(ExportFile::new(
        REPORT_FILE_NAME,
        serde_json::to_vec_pretty(report)?,
    ));

    Ok(files)
}
