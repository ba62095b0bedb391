pub mod cli;
pub mod toml_config;

use crate::domain::model::OcrTier;
use crate::domain::ports::ConfigProvider;
use crate::llm::agent::DEFAULT_MAX_TURNS;
use crate::utils::error::{ExtractorError, Result};
use crate::utils::validation::{
    validate_command, validate_input_files, validate_non_empty_string, validate_output_formats,
    validate_path, validate_range, validate_url, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_OUTPUT_PATH: &str = "./output";
pub const DEFAULT_CURRENCY: &str = "NZD";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "invoice-extractor")]
#[command(about = "Extract structured invoice data from PDFs and images with a tool-calling LLM")]
pub struct CliConfig {
    /// Invoice PDFs or images to process
    pub files: Vec<String>,

    #[arg(short, long, help = "TOML configuration file; replaces the LLM/OCR/output flags")]
    pub config: Option<String>,

    #[arg(long, default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    #[serde(skip)]
    pub api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,

    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    #[arg(long = "timeout", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, help = "LLM request timeout in seconds")]
    pub request_timeout_secs: u64,

    #[arg(long, value_delimiter = ' ', help = "Tier 2 OCR command, document path is appended")]
    pub tesseract_command: Vec<String>,

    #[arg(long, value_delimiter = ' ', help = "Tier 3 OCR command, document path is appended")]
    pub paddle_command: Vec<String>,

    #[arg(long = "ocr-timeout", default_value_t = DEFAULT_OCR_TIMEOUT_SECS)]
    pub ocr_timeout_secs: u64,

    #[arg(long, help = "Skip the OCR verification pass")]
    pub no_verify: bool,

    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "json,csv")]
    pub formats: Vec<String>,

    #[arg(long, help = "Also write everything into a single ZIP file")]
    pub bundle: bool,

    #[arg(long, default_value = DEFAULT_CURRENCY)]
    pub currency: String,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3), help = "Force an extraction tier (1 text layer, 2 Tesseract, 3 PaddleOCR)")]
    pub tier: Option<u8>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Record stage timings and memory usage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn forced_tier(&self) -> Option<OcrTier> {
        self.tier.and_then(OcrTier::from_number)
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }

    fn tesseract_command(&self) -> &[String] {
        &self.tesseract_command
    }

    fn paddle_command(&self) -> &[String] {
        &self.paddle_command
    }

    fn ocr_timeout_secs(&self) -> u64 {
        self.ocr_timeout_secs
    }

    fn verify_ocr(&self) -> bool {
        !self.no_verify
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn bundle_output(&self) -> bool {
        self.bundle
    }

    fn default_currency(&self) -> &str {
        &self.currency
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_input_files("files", &self.files)?;
        if self.config.is_none() {
            validate_settings(self)?;
        }
        Ok(())
    }
}

/// Checks shared by every `ConfigProvider`, whichever source it came from.
pub fn validate_settings<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_url("llm.endpoint", config.api_endpoint())?;
    validate_non_empty_string("llm.model", config.model())?;
    validate_range("llm.max_turns", config.max_turns(), 1, 50)?;
    validate_range("llm.temperature", config.temperature(), 0.0, 2.0)?;
    validate_range("llm.max_tokens", config.max_tokens(), 256, 128_000)?;
    validate_range("llm.timeout_seconds", config.request_timeout_secs(), 1, 3600)?;

    validate_command("ocr.tesseract_command", config.tesseract_command())?;
    validate_command("ocr.paddle_command", config.paddle_command())?;
    validate_range("ocr.timeout_seconds", config.ocr_timeout_secs(), 1, 3600)?;

    validate_path("output.path", config.output_path())?;
    validate_output_formats("output.formats", config.output_formats())?;
    validate_currency("output.default_currency", config.default_currency())?;

    Ok(())
}

fn validate_currency(field_name: &str, currency: &str) -> Result<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: currency.to_string(),
            reason: "Expected a 3-letter ISO 4217 code such as NZD".to_string(),
        });
    }
    Ok(())
}
