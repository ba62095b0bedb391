use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One line of the financial story: a charge, a discount or a summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

impl Entry {
    pub fn new(label: impl Into<String>, amount: Option<f64>, entry_type: Option<&str>) -> Self {
        Self {
            label: label.into(),
            amount,
            entry_type: entry_type.map(str::to_string),
            attrs: None,
        }
    }
}

/// 萃取結果，欄位對應 invoices 表的平面結構
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceExtraction {
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub gst_amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl InvoiceExtraction {
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{}\n\n{}", existing, note),
            _ => note.to_string(),
        });
    }
}

/// Which extraction tier produced the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrTier {
    TextLayer,
    Tesseract,
    Paddle,
}

impl OcrTier {
    pub fn number(self) -> u8 {
        match self {
            OcrTier::TextLayer => 1,
            OcrTier::Tesseract => 2,
            OcrTier::Paddle => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(OcrTier::TextLayer),
            2 => Some(OcrTier::Tesseract),
            3 => Some(OcrTier::Paddle),
            _ => None,
        }
    }
}

impl fmt::Display for OcrTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OcrTier::TextLayer => "text layer",
            OcrTier::Tesseract => "tesseract",
            OcrTier::Paddle => "paddleocr",
        };
        write!(f, "tier {} ({})", self.number(), name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentText {
    pub full_text: String,
    pub pages: Vec<String>,
    pub total_pages: usize,
    /// Raw text layer of a PDF whose fonts were broken, kept for OCR cross-checking.
    pub text_layer_ref: Option<String>,
    pub ocr_tier: OcrTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedInvoice {
    pub source_path: String,
    pub display_name: String,
    pub status: InvoiceStatus,
    pub extraction: InvoiceExtraction,
    pub ocr_tier: Option<OcrTier>,
    pub raw_extracted_text: Option<String>,
    pub raw_conversation: Option<String>,
    pub corrections: Vec<String>,
    pub turns_used: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub output_path: String,
    pub processed: usize,
    pub drafted: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn summarize(output_path: impl Into<String>, invoices: &[ProcessedInvoice]) -> Self {
        let drafted = invoices
            .iter()
            .filter(|inv| inv.status == InvoiceStatus::Draft)
            .count();
        Self {
            output_path: output_path.into(),
            processed: invoices.len(),
            drafted,
            failed: invoices.len() - drafted,
        }
    }
}
