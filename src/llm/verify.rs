use crate::domain::chat::{ChatMessage, ChatRequest};
use crate::domain::model::InvoiceExtraction;
use crate::domain::ports::ChatModel;
use crate::llm::prompts::{build_verify_prompt, VERIFY_SYSTEM_PROMPT};
use crate::llm::repair::{normalize_invoice_value, parse_tool_arguments};
use crate::llm::schema::validate_extraction;
use crate::utils::error::{ExtractorError, Result};
use serde_json::Value;

pub const MAX_TEXT_LAYER_CHARS: usize = 30_000;

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub corrected: InvoiceExtraction,
    pub corrections: Vec<String>,
}

impl VerificationResult {
    pub fn has_corrections(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Independent second pass that reconciles an OCR-based extraction against
/// the PDF's raw text layer.
pub struct OcrVerifier<'a, M: ChatModel + ?Sized> {
    model: &'a M,
    max_tokens: u32,
}

impl<'a, M: ChatModel + ?Sized> OcrVerifier<'a, M> {
    pub fn new(model: &'a M, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    pub async fn verify(
        &self,
        extraction: &InvoiceExtraction,
        text_layer_ref: &str,
    ) -> Result<VerificationResult> {
        let extraction_json = serde_json::to_string_pretty(extraction)?;
        let text_layer: String = text_layer_ref.chars().take(MAX_TEXT_LAYER_CHARS).collect();

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(VERIFY_SYSTEM_PROMPT),
                ChatMessage::user(build_verify_prompt(&extraction_json, &text_layer)),
            ],
            tools: Vec::new(),
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            json_response: true,
        };

        let response = self.model.complete(&request).await?;
        let content = response.message.content.unwrap_or_default();
        let parsed = parse_tool_arguments(&content)?;

        let mut object = match parsed.value {
            Value::Object(object) => object,
            _ => {
                return Err(ExtractorError::LlmError {
                    message: "verifier reply is not a JSON object".to_string(),
                })
            }
        };

        let corrections: Vec<String> = match object.remove("corrections") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Null => None,
                    other if !other.is_string() => Some(other.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        if corrections.is_empty() {
            tracing::debug!("🔎 Verifier found nothing to correct");
            return Ok(VerificationResult {
                corrected: extraction.clone(),
                corrections,
            });
        }

        let corrected_value = object.remove("corrected").ok_or_else(|| ExtractorError::LlmError {
            message: "verifier listed corrections but returned no corrected extraction".to_string(),
        })?;

        let mut repairs = Vec::new();
        let normalized = normalize_invoice_value(corrected_value, &mut repairs);
        let mut corrected = validate_extraction(normalized)
            .map_err(|issues| ExtractorError::SchemaValidationError { issues })?;

        // 驗證只修正數值，不應該把原本的註記弄丟
        if corrected.notes.is_none() {
            corrected.notes = extraction.notes.clone();
        }

        Ok(VerificationResult {
            corrected,
            corrections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatResponse;
    use crate::domain::model::Entry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedModel {
        reply: String,
        seen: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(ChatResponse {
                message: ChatMessage::assistant(self.reply.clone()),
                finish_reason: Some("stop".to_string()),
                usage: None,
            })
        }
    }

    fn canned(reply: Value) -> CannedModel {
        CannedModel {
            reply: reply.to_string(),
            seen: Mutex::new(None),
        }
    }

    fn ocr_extraction() -> InvoiceExtraction {
        InvoiceExtraction {
            supplier_name: Some("Watercare".to_string()),
            total_amount: Some(185.80),
            notes: Some("Scanned copy".to_string()),
            entries: vec![Entry::new("Total", Some(185.80), Some("total"))],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_applies_corrections() {
        let model = canned(json!({
            "corrected": {
                "supplier_name": "Watercare",
                "total_amount": 135.80,
                "entries": [{"label": "Total", "amount": 135.80, "type": "total"}]
            },
            "corrections": ["total_amount: 185.80 -> 135.80"]
        }));
        let verifier = OcrVerifier::new(&model, 2048);

        let result = verifier.verify(&ocr_extraction(), "TOTAL 135.80").await.unwrap();

        assert!(result.has_corrections());
        assert_eq!(result.corrected.total_amount, Some(135.80));
        assert_eq!(result.corrected.notes.as_deref(), Some("Scanned copy"));

        let seen = model.seen.lock().unwrap().clone().unwrap();
        assert!(seen.json_response);
        assert!(seen.tools.is_empty());
        assert!(seen.messages[1].content.as_deref().unwrap().contains("TOTAL 135.80"));
    }

    #[tokio::test]
    async fn test_no_corrections_keeps_original() {
        let model = canned(json!({"corrected": {"entries": []}, "corrections": []}));
        let verifier = OcrVerifier::new(&model, 2048);

        let original = ocr_extraction();
        let result = verifier.verify(&original, "TOTAL 185.80").await.unwrap();

        assert!(!result.has_corrections());
        assert_eq!(result.corrected, original);
    }

    #[tokio::test]
    async fn test_text_layer_is_truncated() {
        let model = canned(json!({"corrections": []}));
        let verifier = OcrVerifier::new(&model, 2048);
        let huge = "9".repeat(MAX_TEXT_LAYER_CHARS + 500);

        verifier.verify(&ocr_extraction(), &huge).await.unwrap();

        let seen = model.seen.lock().unwrap().clone().unwrap();
        let prompt = seen.messages[1].content.clone().unwrap();
        assert!(prompt.matches('9').count() <= MAX_TEXT_LAYER_CHARS + 20);
    }

    #[tokio::test]
    async fn test_invalid_corrected_payload_is_an_error() {
        let model = canned(json!({
            "corrected": {"entries": [{"label": "", "amount": 1}]},
            "corrections": ["something"]
        }));
        let verifier = OcrVerifier::new(&model, 2048);

        let err = verifier.verify(&ocr_extraction(), "text").await.unwrap_err();
        assert!(matches!(err, ExtractorError::SchemaValidationError { .. }));
    }
}
