use crate::pdf::ocr::OcrOutput;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Tesseract 的門檻：乾淨掃描檔大約落在 88% 平均信心、8% 低信心字
pub const MIN_CONFIDENCE: f64 = 80.0;
pub const MAX_LOW_CONFIDENCE_RATIO: f64 = 0.10;
pub const MIN_TEXT_LENGTH: usize = 50;
pub const MIN_NUMBER_MATCH_RATIO: f64 = 0.5;

const MIN_TEXT_LAYER_LENGTH: usize = 100;
const MAX_REPLACEMENT_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub accept: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayerVerdict {
    pub accept: bool,
    pub reason: String,
    /// Garbled fonts rather than an empty (scanned) page.
    pub text_layer_broken: bool,
}

pub fn assess_text_layer(full_text: &str) -> TextLayerVerdict {
    let has_cid_garbage = full_text.contains("(cid:");
    let replacement_count = full_text.matches('\u{fffd}').count();
    let has_replacement_garbage = replacement_count > MAX_REPLACEMENT_CHARS;
    let has_minimal_text = full_text.trim().chars().count() < MIN_TEXT_LAYER_LENGTH;

    if !has_cid_garbage && !has_replacement_garbage && !has_minimal_text {
        return TextLayerVerdict {
            accept: true,
            reason: "text layer OK".to_string(),
            text_layer_broken: false,
        };
    }

    let reason = if has_minimal_text {
        "minimal text (possibly scanned/image PDF)".to_string()
    } else {
        format!(
            "broken text (cid:{}, replacements:{})",
            has_cid_garbage, replacement_count
        )
    };

    TextLayerVerdict {
        accept: false,
        reason,
        text_layer_broken: has_cid_garbage || has_replacement_garbage,
    }
}

/// Decides whether tier-2 OCR output is good enough or should escalate.
pub fn assess_ocr_quality(ocr: &OcrOutput, text_layer: Option<&str>) -> Verdict {
    let reject = |reason: String| Verdict {
        accept: false,
        reason,
    };

    if let Some(conf) = &ocr.confidence {
        if conf.mean < MIN_CONFIDENCE {
            return reject(format!(
                "confidence {}% < {}% threshold",
                conf.mean, MIN_CONFIDENCE
            ));
        }

        if conf.total_words > 0 {
            let low_ratio = conf.low_confidence_words as f64 / conf.total_words as f64;
            if low_ratio > MAX_LOW_CONFIDENCE_RATIO {
                return reject(format!(
                    "{}% low-confidence words > {}% threshold",
                    (low_ratio * 100.0).round(),
                    MAX_LOW_CONFIDENCE_RATIO * 100.0
                ));
            }
        }
    }

    let text_len = ocr.full_text.trim().chars().count();
    if text_len < MIN_TEXT_LENGTH {
        return reject(format!(
            "extracted text too short ({} < {} chars)",
            text_len, MIN_TEXT_LENGTH
        ));
    }

    if let Some(layer) = text_layer.filter(|t| t.trim().chars().count() > MIN_TEXT_LAYER_LENGTH) {
        let layer_numbers = extract_numbers(layer);
        if layer_numbers.len() > 3 {
            let ocr_numbers: HashSet<String> = extract_numbers(&ocr.full_text).into_iter().collect();
            let matched = layer_numbers.iter().filter(|n| ocr_numbers.contains(*n)).count();
            let ratio = matched as f64 / layer_numbers.len() as f64;
            if ratio < MIN_NUMBER_MATCH_RATIO {
                return reject(format!(
                    "number cross-ref: {}/{} matched ({}% < {}%)",
                    matched,
                    layer_numbers.len(),
                    (ratio * 100.0).round(),
                    MIN_NUMBER_MATCH_RATIO * 100.0
                ));
            }
        }
    }

    let reason = match &ocr.confidence {
        Some(conf) => format!(
            "confidence {}%, {}/{} low-conf words",
            conf.mean, conf.low_confidence_words, conf.total_words
        ),
        None => "no confidence data, text length OK".to_string(),
    };
    Verdict {
        accept: true,
        reason,
    }
}

/// Distinct number-like tokens (`1,234.50`, `2024-07-01`, `12/08`) with `$` and `,` removed.
pub fn extract_numbers(text: &str) -> Vec<String> {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER_RE.get_or_init(|| Regex::new(r"\d[\d,.\-/]+\d").expect("valid number regex"));

    let mut seen = HashSet::new();
    re.find_iter(text)
        .map(|m| m.as_str().replace(['$', ','], ""))
        .filter(|n| seen.insert(n.clone()))
        .collect()
}
