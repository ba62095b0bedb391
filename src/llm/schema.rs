use crate::domain::model::{Entry, InvoiceExtraction};
use chrono::NaiveDate;
use serde_json::Value;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d %B %Y", "%d %b %Y"];

/// Basic type validation of a submitted invoice. Issues are phrased for the
/// model so they can be sent back as a tool result.
pub fn validate_extraction(value: Value) -> Result<InvoiceExtraction, Vec<String>> {
    let Value::Object(obj) = &value else {
        return Err(vec!["submit_invoice arguments must be a JSON object".to_string()]);
    };

    let mut issues = Vec::new();

    match obj.get("entries") {
        Some(Value::Array(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                check_entry(i, entry, &mut issues);
            }
        }
        Some(Value::Null) | None => {
            issues.push("'entries' is required, use [] when the document has no line items".to_string())
        }
        Some(_) => issues.push("'entries' must be an array".to_string()),
    }

    for field in ["total_amount", "gst_amount"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) if n.as_f64().map_or(false, f64::is_finite) => {}
            Some(other) => issues.push(format!("'{}' must be a number or null, got {}", field, other)),
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    let mut extraction: InvoiceExtraction = match serde_json::from_value(value) {
        Ok(extraction) => extraction,
        Err(e) => return Err(vec![format!("invalid field type: {}", e)]),
    };

    extraction.invoice_date = normalize_date("invoice_date", extraction.invoice_date.take(), &mut issues);
    extraction.due_date = normalize_date("due_date", extraction.due_date.take(), &mut issues);

    if let Some(currency) = extraction.currency.take() {
        let code = currency.trim().to_ascii_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            extraction.currency = Some(code);
        } else {
            issues.push(format!("'currency' must be a 3-letter ISO code, got \"{}\"", currency));
        }
    }

    extraction.entries.iter_mut().for_each(trim_entry);
    extraction.supplier_name = trimmed(extraction.supplier_name.take());
    extraction.invoice_number = trimmed(extraction.invoice_number.take());
    extraction.gst_number = trimmed(extraction.gst_number.take());

    if issues.is_empty() {
        Ok(extraction)
    } else {
        Err(issues)
    }
}

/// True when the extraction carries at least one entry or header field.
pub fn has_invoice_content(extraction: &InvoiceExtraction) -> bool {
    !extraction.entries.is_empty()
        || extraction.total_amount.is_some()
        || extraction.gst_amount.is_some()
        || [
            &extraction.invoice_date,
            &extraction.supplier_name,
            &extraction.invoice_number,
            &extraction.gst_number,
            &extraction.due_date,
        ]
        .iter()
        .any(|field| field.is_some())
}

fn check_entry(i: usize, entry: &Value, issues: &mut Vec<String>) {
    let Value::Object(obj) = entry else {
        issues.push(format!("entries[{}] must be an object", i));
        return;
    };

    match obj.get("label") {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        _ => issues.push(format!("entries[{}] needs a non-empty 'label'", i)),
    }

    match obj.get("amount") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_f64().map_or(false, f64::is_finite) => {}
        Some(other) => issues.push(format!("entries[{}].amount must be a number or null, got {}", i, other)),
    }

    match obj.get("attrs") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => issues.push(format!("entries[{}].attrs must be an object", i)),
    }
}

/// Accepts a few common layouts and rewrites them as `YYYY-MM-DD`.
pub fn normalize_date(field: &str, value: Option<String>, issues: &mut Vec<String>) -> Option<String> {
    let raw = value?;
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    issues.push(format!("'{}' must be a date in YYYY-MM-DD format, got \"{}\"", field, s));
    None
}

fn trim_entry(entry: &mut Entry) {
    entry.label = entry.label.trim().to_string();
    entry.entry_type = trimmed(entry.entry_type.take()).map(|t| t.to_lowercase());
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
