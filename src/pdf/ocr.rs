use crate::domain::model::OcrTier;
use crate::domain::ports::{ConfigProvider, OcrBackend};
use crate::utils::error::{ExtractorError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfidence {
    pub mean: f64,
    #[serde(default)]
    pub per_page: Vec<f64>,
    #[serde(default)]
    pub low_confidence_words: usize,
    #[serde(default)]
    pub total_words: usize,
}

/// What an OCR script prints on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrOutput {
    pub full_text: String,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub confidence: Option<OcrConfidence>,
}

/// Runs external OCR programs. The document path is appended as the last
/// argument; the program renders pages itself and prints one JSON object.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    tesseract_command: Vec<String>,
    paddle_command: Vec<String>,
    timeout: Duration,
}

impl CommandOcr {
    pub fn new(tesseract_command: Vec<String>, paddle_command: Vec<String>, timeout: Duration) -> Self {
        Self {
            tesseract_command,
            paddle_command,
            timeout,
        }
    }

    /// `None` when no OCR command is configured at all.
    pub fn from_config<C: ConfigProvider>(config: &C) -> Option<Self> {
        if config.tesseract_command().is_empty() && config.paddle_command().is_empty() {
            return None;
        }
        Some(Self::new(
            config.tesseract_command().to_vec(),
            config.paddle_command().to_vec(),
            Duration::from_secs(config.ocr_timeout_secs()),
        ))
    }

    fn command_for(&self, tier: OcrTier) -> Option<&[String]> {
        let command = match tier {
            OcrTier::Tesseract => &self.tesseract_command,
            OcrTier::Paddle => &self.paddle_command,
            OcrTier::TextLayer => return None,
        };
        (!command.is_empty()).then_some(command.as_slice())
    }

    pub fn supports(&self, tier: OcrTier) -> bool {
        self.command_for(tier).is_some()
    }
}

#[async_trait]
impl OcrBackend for CommandOcr {
    async fn recognize(&self, path: &Path, tier: OcrTier) -> Result<OcrOutput> {
        let command = self.command_for(tier).ok_or_else(|| ExtractorError::OcrError {
            message: format!("no command configured for {}", tier),
        })?;

        tracing::debug!("Running {} for {}: {:?}", tier, path.display(), command);

        let child = Command::new(&command[0])
            .args(&command[1..])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractorError::OcrError {
                message: format!("failed to start '{}': {}", command[0], e),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractorError::OcrError {
                message: format!("{} timed out after {:?}", tier, self.timeout),
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut result: OcrOutput = parse_script_json(&stdout, &stderr)?;
        if result.total_pages == 0 {
            result.total_pages = result.pages.len();
        }
        Ok(result)
    }
}

/// Parses a script's JSON stdout, skipping any non-JSON prefix (warnings,
/// progress lines) and surfacing `{"error": "..."}` payloads.
pub fn parse_script_json<T: DeserializeOwned>(stdout: &str, stderr: &str) -> Result<T> {
    let json_str = stdout.find('{').map_or(stdout, |start| &stdout[start..]);

    match serde_json::from_str::<serde_json::Value>(json_str) {
        Ok(value) => {
            if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
                let message = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
                return Err(ExtractorError::OcrError {
                    message: format!("Script error: {}", message),
                });
            }
            Ok(serde_json::from_value(value)?)
        }
        Err(_) => {
            let trimmed = stderr.trim();
            let message = if trimmed.is_empty() {
                "No output from script".to_string()
            } else {
                serde_json::from_str::<serde_json::Value>(trimmed)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                    .unwrap_or_else(|| trimmed.to_string())
            };
            Err(ExtractorError::OcrError {
                message: format!("Script failed: {}", message),
            })
        }
    }
}
