use crate::domain::model::InvoiceExtraction;
use std::path::Path;

/// Builds a short human name: `<date> <supplier> <invoice#>`, falling back to
/// the total and finally to the source file name.
pub fn generate_display_name(extraction: &InvoiceExtraction, original_filename: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(date) = non_empty(&extraction.invoice_date) {
        parts.push(date.to_string());
    }
    if let Some(supplier) = non_empty(&extraction.supplier_name) {
        parts.push(supplier.to_string());
    }
    if let Some(number) = non_empty(&extraction.invoice_number) {
        parts.push(format!("#{}", number));
    } else if let Some(total) = extraction.total_amount {
        parts.push(format!("${:.2}", total));
    }

    // 只有金額或日期不足以辨識，補上檔名
    if non_empty(&extraction.supplier_name).is_none() {
        let stem = Path::new(original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(original_filename);
        if !stem.is_empty() {
            parts.push(stem.to_string());
        }
    }

    if parts.is_empty() {
        "Untitled invoice".to_string()
    } else {
        parts.join(" ")
    }
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
