use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{
    DocumentText, InvoiceExtraction, InvoiceStatus, OcrTier, ProcessedInvoice, RunReport,
};
use crate::domain::ports::{ChatModel, TextSource};
use crate::export::bundle::{build_bundle, BUNDLE_FILE_NAME};
use crate::export::render_outputs;
use crate::llm::agent::{AgentSettings, ExtractionAgent};
use crate::llm::verify::OcrVerifier;
use crate::utils::attrs::normalize_all_entry_attrs;
use crate::utils::display_name::generate_display_name;
use crate::utils::error::{ExtractorError, Result};
use std::path::Path;
use std::time::Instant;

/// Per-document stages: read text, run the extraction agent, cross-check
/// OCR output against the text layer, then write every result at the end.
pub struct InvoicePipeline<S: Storage, C: ConfigProvider, M: ChatModel, T: TextSource> {
    storage: S,
    config: C,
    model: M,
    reader: T,
    forced_tier: Option<OcrTier>,
}

impl<S: Storage, C: ConfigProvider, M: ChatModel, T: TextSource> InvoicePipeline<S, C, M, T> {
    pub fn new(storage: S, config: C, model: M, reader: T) -> Self {
        Self {
            storage,
            config,
            model,
            reader,
            forced_tier: None,
        }
    }

    /// Re-extract every document with one specific tier.
    pub fn with_forced_tier(mut self, tier: Option<OcrTier>) -> Self {
        self.forced_tier = tier;
        self
    }

    fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            max_turns: self.config.max_turns(),
            temperature: self.config.temperature(),
            max_tokens: self.config.max_tokens(),
        }
    }

    /// Verification failures never fail the document; the unverified
    /// extraction is kept.
    async fn verify(
        &self,
        extraction: InvoiceExtraction,
        text_layer_ref: &str,
    ) -> (InvoiceExtraction, Vec<String>) {
        let started = Instant::now();
        let verifier = OcrVerifier::new(&self.model, self.config.max_tokens());

        match verifier.verify(&extraction, text_layer_ref).await {
            Ok(result) if result.has_corrections() => {
                tracing::info!(
                    "🔎 OCR verification corrected {} issue(s) in {:?}",
                    result.corrections.len(),
                    started.elapsed()
                );
                let mut corrected = result.corrected;
                corrected.append_note(&format!(
                    "OCR corrections applied: {}",
                    result.corrections.join("; ")
                ));
                (corrected, result.corrections)
            }
            Ok(_) => (extraction, Vec::new()),
            Err(e) => {
                tracing::warn!("⚠️ OCR verification failed, using original extraction: {}", e);
                (extraction, Vec::new())
            }
        }
    }
}

/// Builds the record for a document whose text could not be read.
pub fn failed_invoice(path: &Path, error: &ExtractorError) -> ProcessedInvoice {
    let file_name = file_name_of(path);
    ProcessedInvoice {
        source_path: path.display().to_string(),
        display_name: generate_display_name(&InvoiceExtraction::default(), &file_name),
        status: InvoiceStatus::Error,
        extraction: InvoiceExtraction::default(),
        ocr_tier: None,
        raw_extracted_text: None,
        raw_conversation: None,
        corrections: Vec::new(),
        turns_used: 0,
        error_message: Some(error.to_string()),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[async_trait::async_trait]
impl<S, C, M, T> Pipeline for InvoicePipeline<S, C, M, T>
where
    S: Storage,
    C: ConfigProvider,
    M: ChatModel,
    T: TextSource,
{
    async fn extract(&self, path: &Path) -> Result<DocumentText> {
        tracing::debug!("Reading text from {}", path.display());
        let document = self.reader.read_document(path, self.forced_tier).await?;
        tracing::info!(
            "📄 {}: {} page(s) via {}",
            path.display(),
            document.total_pages,
            document.ocr_tier
        );
        Ok(document)
    }

    async fn transform(&self, path: &Path, document: DocumentText) -> Result<ProcessedInvoice> {
        let agent = ExtractionAgent::new(&self.model, self.agent_settings());

        let (mut extraction, raw_conversation, turns_used, agent_ok) =
            match agent.run(&document).await {
                Ok(outcome) => {
                    if !outcome.repairs.is_empty() {
                        tracing::debug!("Repaired model output: {:?}", outcome.repairs);
                    }
                    (
                        outcome.extraction,
                        Some(outcome.raw_conversation),
                        outcome.turns_used,
                        true,
                    )
                }
                Err(e) => {
                    // LLM 失敗不算文件失敗，保留原文讓使用者手動補
                    tracing::warn!("⚠️ LLM extraction failed for {}: {}", path.display(), e);
                    let turns = match &e {
                        ExtractorError::TurnBudgetExhausted { max_turns } => *max_turns,
                        _ => 0,
                    };
                    let extraction = InvoiceExtraction {
                        notes: Some(format!("LLM extraction failed: {}. Raw text preserved.", e)),
                        ..Default::default()
                    };
                    (extraction, None, turns, false)
                }
            };

        let mut corrections = Vec::new();
        if agent_ok && self.config.verify_ocr() {
            if let Some(text_layer_ref) = document.text_layer_ref.as_deref() {
                tracing::info!("🔎 Verifying OCR extraction against the PDF text layer");
                let (verified, applied) = self.verify(extraction, text_layer_ref).await;
                extraction = verified;
                corrections = applied;
            }
        }

        normalize_all_entry_attrs(&mut extraction.entries);
        if extraction.currency.is_none() {
            extraction.currency = Some(self.config.default_currency().to_uppercase());
        }

        let display_name = generate_display_name(&extraction, &file_name_of(path));

        Ok(ProcessedInvoice {
            source_path: path.display().to_string(),
            display_name,
            status: InvoiceStatus::Draft,
            extraction,
            ocr_tier: Some(document.ocr_tier),
            raw_extracted_text: Some(document.full_text),
            raw_conversation,
            corrections,
            turns_used,
            error_message: None,
        })
    }

    async fn load(&self, invoices: &[ProcessedInvoice]) -> Result<String> {
        let output_path = if self.config.bundle_output() {
            self.storage.location(BUNDLE_FILE_NAME)
        } else {
            self.storage.location("")
        };

        let report = RunReport::summarize(output_path.clone(), invoices);
        let files = render_outputs(invoices, &report, self.config.output_formats())?;

        tracing::debug!("Writing {} output file(s)", files.len());
        for file in &files {
            self.storage.write_file(&file.name, &file.contents).await?;
        }

        if self.config.bundle_output() {
            let zip_data = build_bundle(&files)?;
            tracing::debug!("Writing ZIP bundle ({} bytes) to storage", zip_data.len());
            self.storage.write_file(BUNDLE_FILE_NAME, &zip_data).await?;
        }

        Ok(output_path)
    }
}
