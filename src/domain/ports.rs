use crate::domain::chat::{ChatRequest, ChatResponse};
use crate::domain::model::{DocumentText, OcrTier, ProcessedInvoice};
use crate::pdf::ocr::OcrOutput;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn location(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn api_endpoint(&self) -> &str;
    fn api_key(&self) -> Option<&str>;
    fn model(&self) -> &str;
    fn max_turns(&self) -> usize;
    fn temperature(&self) -> f32;
    fn max_tokens(&self) -> u32;
    fn request_timeout_secs(&self) -> u64;
    fn tesseract_command(&self) -> &[String];
    fn paddle_command(&self) -> &[String];
    fn ocr_timeout_secs(&self) -> u64;
    fn verify_ocr(&self) -> bool;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn bundle_output(&self) -> bool;
    fn default_currency(&self) -> &str;
}

/// One request/response round trip with a hosted chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn recognize(&self, path: &Path, tier: OcrTier) -> Result<OcrOutput>;
}

/// Per-page text of a PDF's embedded text layer.
#[async_trait]
pub trait TextLayerReader: Send + Sync {
    async fn read_pages(&self, path: &Path) -> Result<Vec<String>>;
}

#[async_trait]
pub trait TextSource: Send + Sync {
    /// `forced_tier` skips quality assessment and runs exactly that tier.
    async fn read_document(&self, path: &Path, forced_tier: Option<OcrTier>) -> Result<DocumentText>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<DocumentText>;
    async fn transform(&self, path: &Path, document: DocumentText) -> Result<ProcessedInvoice>;
    async fn load(&self, invoices: &[ProcessedInvoice]) -> Result<String>;
}
