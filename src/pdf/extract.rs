use crate::domain::model::{DocumentText, OcrTier};
use crate::domain::ports::{OcrBackend, TextLayerReader, TextSource};
use crate::pdf::ocr::OcrOutput;
use crate::pdf::quality::{assess_ocr_quality, assess_text_layer};
use crate::pdf::{is_image, is_supported_document};
use crate::utils::error::{ExtractorError, Result};
use async_trait::async_trait;
use std::path::Path;

/// Text layer through `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextLayer;

#[async_trait]
impl TextLayerReader for PdfTextLayer {
    async fn read_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = tokio::fs::read(path).await?;

        // pdf-extract 是同步的，而且遇到怪檔案可能 panic
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
            .map_err(|e| ExtractorError::PdfError {
                message: format!("text layer extraction aborted: {}", e),
            })?
            .map_err(|e| ExtractorError::PdfError {
                message: e.to_string(),
            })
    }
}

/// Reads invoice documents into text.
///
/// PDFs try their embedded text layer first (tier 1). Scans, photos and PDFs
/// with broken fonts go through OCR: tier 2 (Tesseract) is assessed for
/// quality and escalated to tier 3 (PaddleOCR) when it falls short.
pub struct DocumentReader<O: OcrBackend, L: TextLayerReader = PdfTextLayer> {
    ocr: Option<O>,
    text_layer: L,
}

impl<O: OcrBackend> DocumentReader<O, PdfTextLayer> {
    pub fn new(ocr: Option<O>) -> Self {
        Self::with_text_layer(ocr, PdfTextLayer)
    }
}

impl<O: OcrBackend, L: TextLayerReader> DocumentReader<O, L> {
    pub fn with_text_layer(ocr: Option<O>, text_layer: L) -> Self {
        Self { ocr, text_layer }
    }

    async fn read_text_layer(&self, path: &Path) -> Result<DocumentText> {
        let pages = self.text_layer.read_pages(path).await?;
        Ok(DocumentText {
            full_text: pages.join("\n\n"),
            total_pages: pages.len(),
            pages,
            text_layer_ref: None,
            ocr_tier: OcrTier::TextLayer,
        })
    }

    fn ocr_backend(&self) -> Result<&O> {
        self.ocr.as_ref().ok_or_else(|| ExtractorError::OcrError {
            message: "no OCR command configured".to_string(),
        })
    }

    /// Tier 2, then tier 3 when tier 2 fails the quality checks.
    async fn run_ocr_pipeline(
        &self,
        path: &Path,
        text_layer: Option<&DocumentText>,
        text_layer_broken: bool,
    ) -> Result<DocumentText> {
        let ocr = self.ocr_backend()?;
        let text_layer_ref = text_layer
            .filter(|_| text_layer_broken)
            .map(|layer| layer.full_text.clone());

        let tesseract = match ocr.recognize(path, OcrTier::Tesseract).await {
            Ok(output) => {
                let verdict = assess_ocr_quality(&output, text_layer.map(|l| l.full_text.as_str()));
                if verdict.accept {
                    tracing::info!("✅ Tesseract accepted ({})", verdict.reason);
                    return Ok(into_document(output, OcrTier::Tesseract, text_layer_ref));
                }
                tracing::info!("⬆️ Tesseract rejected ({}), escalating to PaddleOCR", verdict.reason);
                Some(output)
            }
            Err(e) => {
                tracing::warn!("⚠️ Tesseract failed ({}), escalating to PaddleOCR", e);
                None
            }
        };

        match ocr.recognize(path, OcrTier::Paddle).await {
            Ok(output) => Ok(into_document(output, OcrTier::Paddle, text_layer_ref)),
            Err(e) => match tesseract {
                // 第三層不可用時，退回第二層的結果總比沒有好
                Some(output) if !output.full_text.trim().is_empty() => {
                    tracing::warn!("⚠️ PaddleOCR failed ({}), keeping rejected Tesseract output", e);
                    Ok(into_document(output, OcrTier::Tesseract, text_layer_ref))
                }
                _ => Err(e),
            },
        }
    }

    /// Re-extraction with an explicit tier, skipping quality assessment.
    async fn read_with_tier(&self, path: &Path, tier: OcrTier) -> Result<DocumentText> {
        if tier == OcrTier::TextLayer {
            if is_image(path) {
                return Err(ExtractorError::PdfError {
                    message: format!("{} has no text layer", path.display()),
                });
            }
            return self.read_text_layer(path).await;
        }

        // 盡力取得文字層供後續驗證使用
        let text_layer_ref = if is_image(path) {
            None
        } else {
            match self.read_text_layer(path).await {
                Ok(layer) if assess_text_layer(&layer.full_text).text_layer_broken => {
                    Some(layer.full_text)
                }
                _ => None,
            }
        };

        let output = self.ocr_backend()?.recognize(path, tier).await?;
        Ok(into_document(output, tier, text_layer_ref))
    }
}

fn into_document(output: OcrOutput, tier: OcrTier, text_layer_ref: Option<String>) -> DocumentText {
    // 沒有分頁資料時把全文當成單頁，工具才找得到內容
    let pages = if output.pages.is_empty() && !output.full_text.trim().is_empty() {
        vec![output.full_text.clone()]
    } else {
        output.pages
    };
    let total_pages = if output.total_pages > 0 {
        output.total_pages
    } else {
        pages.len()
    };
    DocumentText {
        full_text: output.full_text,
        pages,
        total_pages,
        text_layer_ref,
        ocr_tier: tier,
    }
}

#[async_trait]
impl<O: OcrBackend, L: TextLayerReader> TextSource for DocumentReader<O, L> {
    async fn read_document(&self, path: &Path, forced_tier: Option<OcrTier>) -> Result<DocumentText> {
        if !is_supported_document(path) {
            return Err(ExtractorError::UnsupportedDocument {
                path: path.display().to_string(),
            });
        }

        if let Some(tier) = forced_tier {
            tracing::info!("🎯 Forced {} for {}", tier, path.display());
            return self.read_with_tier(path, tier).await;
        }

        if is_image(path) {
            tracing::debug!("Image file detected, using OCR directly: {}", path.display());
            return self.run_ocr_pipeline(path, None, false).await;
        }

        let (text_layer, layer_error, broken) = match self.read_text_layer(path).await {
            Ok(layer) => {
                let verdict = assess_text_layer(&layer.full_text);
                if verdict.accept {
                    tracing::debug!("Text layer accepted for {}", path.display());
                    return Ok(layer);
                }
                tracing::info!("📄 Text layer unusable: {}", verdict.reason);
                (Some(layer), None, verdict.text_layer_broken)
            }
            Err(e) => {
                tracing::info!("📄 Text layer extraction failed: {}", e);
                (None, Some(e), false)
            }
        };

        if self.ocr.is_some() {
            return self.run_ocr_pipeline(path, text_layer.as_ref(), broken).await;
        }

        match (text_layer, layer_error) {
            (Some(layer), _) if !layer.full_text.trim().is_empty() => {
                tracing::warn!(
                    "⚠️ No OCR configured, using imperfect text layer for {}",
                    path.display()
                );
                Ok(layer)
            }
            (_, Some(e)) => Err(e),
            _ => Err(ExtractorError::PdfError {
                message: format!(
                    "{} has no usable text layer and no OCR command is configured",
                    path.display()
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::ocr::OcrConfidence;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeOcr {
        tesseract: Option<OcrOutput>,
        paddle: Option<OcrOutput>,
        calls: Mutex<Vec<OcrTier>>,
    }

    #[async_trait]
    impl OcrBackend for FakeOcr {
        async fn recognize(&self, _path: &Path, tier: OcrTier) -> Result<OcrOutput> {
            self.calls.lock().unwrap().push(tier);
            let output = match tier {
                OcrTier::Tesseract => self.tesseract.clone(),
                OcrTier::Paddle => self.paddle.clone(),
                OcrTier::TextLayer => None,
            };
            output.ok_or_else(|| ExtractorError::OcrError {
                message: format!("no command configured for {}", tier),
            })
        }
    }

    /// Serves a fixed text layer without touching the file.
    struct FakeLayer(Vec<String>);

    #[async_trait]
    impl TextLayerReader for FakeLayer {
        async fn read_pages(&self, _path: &Path) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn layer(text: &str) -> FakeLayer {
        FakeLayer(vec![text.to_string()])
    }

    fn cid_layer() -> String {
        format!("(cid:3)(cid:4)(cid:5) {} (cid:6)(cid:7)", clean_scan())
    }

    fn output(text: &str, mean: Option<f64>) -> OcrOutput {
        OcrOutput {
            full_text: text.to_string(),
            pages: vec![text.to_string()],
            total_pages: 1,
            confidence: mean.map(|mean| OcrConfidence {
                mean,
                per_page: vec![mean],
                low_confidence_words: 1,
                total_words: 100,
            }),
        }
    }

    fn clean_scan() -> String {
        "Mercury Energy tax invoice 2024-07-01 electricity 135.80 GST 17.71 total 153.51".to_string()
    }

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_image_accepted_at_tier_two() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "receipt.jpg", b"not really a jpeg");
        let reader = DocumentReader::new(Some(FakeOcr {
            tesseract: Some(output(&clean_scan(), Some(91.0))),
            ..Default::default()
        }));

        let doc = reader.read_document(&path, None).await.unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
        assert_eq!(doc.total_pages, 1);
        assert!(doc.text_layer_ref.is_none());
        let calls = reader.ocr.as_ref().unwrap().calls.lock().unwrap().clone();
        assert_eq!(calls, vec![OcrTier::Tesseract]);
    }

    #[tokio::test]
    async fn test_low_confidence_escalates_to_paddle() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.HEIC", b"heic");
        let reader = DocumentReader::new(Some(FakeOcr {
            tesseract: Some(output(&clean_scan(), Some(61.0))),
            paddle: Some(output("Mercury Energy | Total | 153.51", None)),
            ..Default::default()
        }));

        let doc = reader.read_document(&path, None).await.unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::Paddle);
        assert_eq!(doc.full_text, "Mercury Energy | Total | 153.51");
    }

    #[tokio::test]
    async fn test_rejected_tesseract_kept_when_paddle_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.png", b"png");
        let reader = DocumentReader::new(Some(FakeOcr {
            tesseract: Some(output(&clean_scan(), Some(61.0))),
            ..Default::default()
        }));

        let doc = reader.read_document(&path, None).await.unwrap();
        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_falls_back_to_ocr() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "scan.pdf", b"this is not a pdf");
        let reader = DocumentReader::new(Some(FakeOcr {
            tesseract: Some(output(&clean_scan(), Some(90.0))),
            ..Default::default()
        }));

        let doc = reader.read_document(&path, None).await.unwrap();
        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
        assert!(doc.text_layer_ref.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_pdf_without_ocr_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "scan.pdf", b"this is not a pdf");
        let reader: DocumentReader<FakeOcr> = DocumentReader::new(None);

        let err = reader.read_document(&path, None).await.unwrap_err();
        assert!(matches!(err, ExtractorError::PdfError { .. }));
    }

    #[tokio::test]
    async fn test_image_without_ocr_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "receipt.png", b"png");
        let reader: DocumentReader<FakeOcr> = DocumentReader::new(None);

        let err = reader.read_document(&path, None).await.unwrap_err();
        assert!(matches!(err, ExtractorError::OcrError { .. }));
    }

    #[tokio::test]
    async fn test_forced_tier_skips_assessment() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "receipt.png", b"png");
        let reader = DocumentReader::new(Some(FakeOcr {
            tesseract: Some(output("tiny", Some(20.0))),
            paddle: Some(output("Paddle text", None)),
            ..Default::default()
        }));

        let doc = reader
            .read_document(&path, Some(OcrTier::Tesseract))
            .await
            .unwrap();
        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
        assert_eq!(doc.full_text, "tiny");

        let doc = reader.read_document(&path, Some(OcrTier::Paddle)).await.unwrap();
        assert_eq!(doc.ocr_tier, OcrTier::Paddle);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let reader: DocumentReader<FakeOcr> = DocumentReader::new(None);
        let err = reader
            .read_document(Path::new("notes.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractorError::UnsupportedDocument { .. }));
    }

    #[tokio::test]
    async fn test_good_text_layer_skips_ocr() {
        let text = format!("{} {}", clean_scan(), "Account 123-456 paid by direct debit.");
        let reader = DocumentReader::with_text_layer(Some(FakeOcr::default()), layer(&text));

        let doc = reader.read_document(Path::new("bill.pdf"), None).await.unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::TextLayer);
        assert_eq!(doc.full_text, text);
        assert!(reader.ocr.as_ref().unwrap().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cid_text_layer_is_kept_for_verification() {
        let reader = DocumentReader::with_text_layer(
            Some(FakeOcr {
                tesseract: Some(output(&clean_scan(), Some(92.0))),
                ..Default::default()
            }),
            layer(&cid_layer()),
        );

        let doc = reader.read_document(Path::new("bill.pdf"), None).await.unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
        assert_eq!(doc.full_text, clean_scan());
        assert_eq!(doc.text_layer_ref, Some(cid_layer()));
    }

    #[tokio::test]
    async fn test_replacement_chars_mark_layer_broken() {
        let garbled = format!("{}{}", "\u{fffd}".repeat(25), clean_scan());
        let reader = DocumentReader::with_text_layer(
            Some(FakeOcr {
                tesseract: Some(output(&clean_scan(), Some(92.0))),
                ..Default::default()
            }),
            layer(&garbled),
        );

        let doc = reader.read_document(Path::new("bill.pdf"), None).await.unwrap();
        assert_eq!(doc.text_layer_ref, Some(garbled));
    }

    #[tokio::test]
    async fn test_minimal_text_layer_is_not_a_reference() {
        let reader = DocumentReader::with_text_layer(
            Some(FakeOcr {
                tesseract: Some(output(&clean_scan(), Some(92.0))),
                ..Default::default()
            }),
            layer("Page 1 of 1"),
        );

        let doc = reader.read_document(Path::new("scan.pdf"), None).await.unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
        assert!(doc.text_layer_ref.is_none());
    }

    #[tokio::test]
    async fn test_broken_layer_used_when_no_ocr() {
        let reader: DocumentReader<FakeOcr, FakeLayer> =
            DocumentReader::with_text_layer(None, layer(&cid_layer()));

        let doc = reader.read_document(Path::new("bill.pdf"), None).await.unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::TextLayer);
        assert_eq!(doc.full_text, cid_layer());
        assert!(doc.text_layer_ref.is_none());
    }

    #[tokio::test]
    async fn test_empty_layer_without_ocr_is_an_error() {
        let reader: DocumentReader<FakeOcr, FakeLayer> =
            DocumentReader::with_text_layer(None, layer("   "));

        let err = reader.read_document(Path::new("scan.pdf"), None).await.unwrap_err();
        assert!(matches!(err, ExtractorError::PdfError { .. }));
    }

    #[tokio::test]
    async fn test_forced_tier_keeps_broken_layer_reference() {
        let reader = DocumentReader::with_text_layer(
            Some(FakeOcr {
                tesseract: Some(output("tiny", Some(20.0))),
                ..Default::default()
            }),
            layer(&cid_layer()),
        );

        let doc = reader
            .read_document(Path::new("bill.pdf"), Some(OcrTier::Tesseract))
            .await
            .unwrap();

        assert_eq!(doc.ocr_tier, OcrTier::Tesseract);
        assert_eq!(doc.text_layer_ref, Some(cid_layer()));
    }

    #[tokio::test]
    async fn test_ocr_without_pages_becomes_one_page() {
        let text = clean_scan();
        let reader = DocumentReader::new(Some(FakeOcr {
            tesseract: Some(OcrOutput {
                full_text: text.clone(),
                pages: vec![],
                total_pages: 0,
                confidence: None,
            }),
            ..Default::default()
        }));

        let doc = reader
            .read_document(Path::new("receipt.png"), None)
            .await
            .unwrap();

        assert_eq!(doc.pages, vec![text]);
        assert_eq!(doc.total_pages, 1);
    }
}
