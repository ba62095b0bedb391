use crate::domain::model::{Entry, InvoiceStatus, ProcessedInvoice};
use crate::utils::attrs::title_case;
use crate::utils::error::{ExtractorError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// 摘要類型的項目放在分組之後，不自成一組
pub const SUMMARY_TYPES: &[&str] = &["subtotal", "total", "due", "tax", "discount", "adjustment"];

struct EntryGroup<'a> {
    entry_type: String,
    entries: Vec<&'a Entry>,
}

fn group_entries(entries: &[Entry]) -> (Vec<EntryGroup<'_>>, Vec<&Entry>) {
    let mut groups: Vec<EntryGroup<'_>> = Vec::new();
    let mut summary = Vec::new();

    for entry in entries {
        let entry_type = entry.entry_type.as_deref().unwrap_or("other");
        if SUMMARY_TYPES.contains(&entry_type) {
            summary.push(entry);
            continue;
        }
        match groups.iter_mut().find(|g| g.entry_type == entry_type) {
            Some(group) => group.entries.push(entry),
            None => groups.push(EntryGroup {
                entry_type: entry_type.to_string(),
                entries: vec![entry],
            }),
        }
    }

    (groups, summary)
}

/// Attr keys ordered by how many entries use them, then by name.
fn collect_attr_keys(entries: &[&Entry]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        for key in entry.attrs.iter().flat_map(|attrs| attrs.keys()) {
            *counts.entry(key.as_str()).or_default() += 1;
        }
    }

    let mut keys: Vec<(&str, usize)> = counts.into_iter().collect();
    keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    keys.into_iter().map(|(key, _)| key.to_string()).collect()
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn row<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| quote(v.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn amount_text(amount: Option<f64>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_default()
}

fn attr_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string()),
        Some(other) => other.to_string(),
    }
}

/// Human-oriented CSV for one invoice: header block, one block per entry
/// type with its attrs as columns, then summary rows and the totals.
pub fn build_invoice_csv(invoice: &ProcessedInvoice) -> String {
    let extraction = &invoice.extraction;
    let mut lines: Vec<String> = Vec::new();

    lines.push(row(["Invoice", invoice.display_name.as_str()]));
    let header_fields = [
        ("Supplier", &extraction.supplier_name),
        ("Invoice #", &extraction.invoice_number),
        ("Date", &extraction.invoice_date),
        ("Currency", &extraction.currency),
    ];
    for (label, value) in header_fields {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            lines.push(row([label, value]));
        }
    }
    lines.push(String::new());

    if !extraction.entries.is_empty() {
        let (groups, summary) = group_entries(&extraction.entries);

        for group in &groups {
            let keys = collect_attr_keys(&group.entries);
            lines.push(quote(&title_case(&group.entry_type)));

            let mut headers = vec!["Entry".to_string(), "Amount".to_string()];
            headers.extend(keys.iter().cloned());
            lines.push(row(&headers));

            for entry in &group.entries {
                let mut values = vec![entry.label.clone(), amount_text(entry.amount)];
                values.extend(
                    keys.iter()
                        .map(|key| attr_text(entry.attrs.as_ref().and_then(|a| a.get(key)))),
                );
                lines.push(row(&values));
            }
            lines.push(String::new());
        }

        if !summary.is_empty() {
            for entry in summary {
                lines.push(row([entry.label.clone(), amount_text(entry.amount)]));
            }
            lines.push(String::new());
        }
    }

    if let Some(total) = extraction.total_amount {
        lines.push(row(["Total".to_string(), total.to_string()]));
    }
    if let Some(gst) = extraction.gst_amount {
        lines.push(row(["GST".to_string(), gst.to_string()]));
    }

    lines.join("\n")
}

/// Column order of `SummaryRow`.
const SUMMARY_HEADERS: [&str; 16] = [
    "source_file",
    "display_name",
    "status",
    "invoice_date",
    "supplier_name",
    "invoice_number",
    "total_amount",
    "gst_amount",
    "currency",
    "gst_number",
    "due_date",
    "entry_count",
    "ocr_tier",
    "turns_used",
    "corrections",
    "error",
];

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    source_file: &'a str,
    display_name: &'a str,
    status: &'static str,
    invoice_date: Option<&'a str>,
    supplier_name: Option<&'a str>,
    invoice_number: Option<&'a str>,
    total_amount: Option<f64>,
    gst_amount: Option<f64>,
    currency: Option<&'a str>,
    gst_number: Option<&'a str>,
    due_date: Option<&'a str>,
    entry_count: usize,
    ocr_tier: Option<u8>,
    turns_used: usize,
    corrections: usize,
    error: Option<&'a str>,
}

/// One row per processed document, for spreadsheets.
pub fn build_summary_csv(invoices: &[ProcessedInvoice]) -> Result<String> {
    // 空批次也要有標題列
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADERS)?;

    for invoice in invoices {
        let e = &invoice.extraction;
        writer.serialize(SummaryRow {
            source_file: &invoice.source_path,
            display_name: &invoice.display_name,
            status: match invoice.status {
                InvoiceStatus::Draft => "draft",
                InvoiceStatus::Error => "error",
            },
            invoice_date: e.invoice_date.as_deref(),
            supplier_name: e.supplier_name.as_deref(),
            invoice_number: e.invoice_number.as_deref(),
            total_amount: e.total_amount,
            gst_amount: e.gst_amount,
            currency: e.currency.as_deref(),
            gst_number: e.gst_number.as_deref(),
            due_date: e.due_date.as_deref(),
            entry_count: e.entries.len(),
            ocr_tier: invoice.ocr_tier.map(|t| t.number()),
            turns_used: invoice.turns_used,
            corrections: invoice.corrections.len(),
            error: invoice.error_message.as_deref(),
        })?;
    }

    let bytes = writer.into_inner().map_err(|e| ExtractorError::ProcessingError {
        message: format!("failed to flush summary CSV: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| ExtractorError::ProcessingError {
        message: format!("summary CSV is not UTF-8: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{InvoiceExtraction, OcrTier};
    use serde_json::json;

    fn power_bill() -> ProcessedInvoice {
        let mut usage = Entry::new("Anytime usage", Some(99.66), Some("electricity"));
        usage.attrs = json!({"unit_amount": 278.0, "unit_price": 0.3585, "unit": "kWh"})
            .as_object()
            .cloned();
        let mut daily = Entry::new("Daily charge", Some(31.0), Some("electricity"));
        daily.attrs = json!({"unit_amount": 31, "unit": "days"}).as_object().cloned();

        ProcessedInvoice {
            source_path: "bills/mercury.pdf".to_string(),
            display_name: "2024-07-31 Mercury #INV-88".to_string(),
            status: InvoiceStatus::Draft,
            extraction: InvoiceExtraction {
                invoice_date: Some("2024-07-31".to_string()),
                supplier_name: Some("Mercury \"Energy\"".to_string()),
                invoice_number: Some("INV-88".to_string()),
                total_amount: Some(150.0),
                gst_amount: Some(19.57),
                currency: Some("NZD".to_string()),
                entries: vec![
                    usage,
                    daily,
                    Entry::new("Prompt payment discount", Some(-5.5), Some("discount")),
                    Entry::new("Broadband", Some(24.84), None),
                    Entry::new("Total due", Some(150.0), Some("total")),
                ],
                ..Default::default()
            },
            ocr_tier: Some(OcrTier::TextLayer),
            raw_extracted_text: None,
            raw_conversation: None,
            corrections: vec![],
            turns_used: 3,
            error_message: None,
        }
    }

    #[test]
    fn test_invoice_csv_groups_entries_by_type() {
        let csv = build_invoice_csv(&power_bill());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], r#""Invoice","2024-07-31 Mercury #INV-88""#);
        assert_eq!(lines[1], r#""Supplier","Mercury ""Energy""""#);
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], r#""Electricity""#);
        assert_eq!(lines[7], r#""Entry","Amount","unit","unit_amount","unit_price""#);
        assert_eq!(lines[8], r#""Anytime usage","99.66","kWh","278","0.3585""#);
        assert_eq!(lines[9], r#""Daily charge","31","days","31","""#);
        assert_eq!(lines[11], r#""Other""#);
        assert!(csv.contains(r#""Prompt payment discount","-5.5""#));
        assert!(csv.ends_with("\"Total\",\"150\"\n\"GST\",\"19.57\""));
    }

    #[test]
    fn test_invoice_csv_without_entries() {
        let mut invoice = power_bill();
        invoice.extraction.entries.clear();
        invoice.extraction.gst_amount = None;

        let csv = build_invoice_csv(&invoice);
        assert!(csv.ends_with("\n\n\"Total\",\"150\""));
    }

    #[test]
    fn test_summary_csv() {
        let mut failed = power_bill();
        failed.source_path = "bills/broken.pdf".to_string();
        failed.status = InvoiceStatus::Error;
        failed.extraction = InvoiceExtraction::default();
        failed.ocr_tier = None;
        failed.error_message = Some("PDF text extraction failed: bad xref".to_string());

        let csv = build_summary_csv(&[power_bill(), failed]).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "source_file");
        assert_eq!(&headers[2], "status");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "draft");
        assert_eq!(&rows[0][6], "150.0");
        assert_eq!(&rows[1][2], "error");
        assert_eq!(&rows[1][6], "");
        assert_eq!(&rows[1][15], "PDF text extraction failed: bad xref");
    }

    #[test]
    fn test_empty_summary_has_header() {
        let csv = build_summary_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("source_file,display_name,status,"));
        assert!(csv.trim_end().ends_with(",error"));
    }
}
