use crate::config::{
    validate_settings, DEFAULT_API_ENDPOINT, DEFAULT_CURRENCY, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_OCR_TIMEOUT_SECS, DEFAULT_OUTPUT_PATH, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::domain::ports::ConfigProvider;
use crate::llm::agent::DEFAULT_MAX_TURNS;
use crate::utils::error::{ExtractorError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_turns: Option<usize>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub tesseract_command: Vec<String>,
    #[serde(default)]
    pub paddle_command: Vec<String>,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub bundle: bool,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn default_ocr_timeout() -> u64 {
    DEFAULT_OCR_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

fn default_output_path() -> String {
    DEFAULT_OUTPUT_PATH.to_string()
}

fn default_formats() -> Vec<String> {
    vec!["json".to_string(), "csv".to_string()]
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_command: Vec::new(),
            paddle_command: Vec::new(),
            timeout_seconds: default_ocr_timeout(),
            verify: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            formats: default_formats(),
            bundle: false,
            default_currency: default_currency(),
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ExtractorError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ExtractorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENAI_API_KEY})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_settings(self)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn api_endpoint(&self) -> &str {
        self.llm.endpoint.as_deref().unwrap_or(DEFAULT_API_ENDPOINT)
    }

    fn api_key(&self) -> Option<&str> {
        // 未替換的 ${VAR} 視為沒有設定
        self.llm
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty() && !env_var_pattern().is_match(key))
    }

    fn model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    fn max_turns(&self) -> usize {
        self.llm.max_turns.unwrap_or(DEFAULT_MAX_TURNS)
    }

    fn temperature(&self) -> f32 {
        self.llm.temperature.unwrap_or(0.0)
    }

    fn max_tokens(&self) -> u32 {
        self.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    fn request_timeout_secs(&self) -> u64 {
        self.llm.timeout_seconds.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    fn tesseract_command(&self) -> &[String] {
        &self.ocr.tesseract_command
    }

    fn paddle_command(&self) -> &[String] {
        &self.ocr.paddle_command
    }

    fn ocr_timeout_secs(&self) -> u64 {
        self.ocr.timeout_seconds
    }

    fn verify_ocr(&self) -> bool {
        self.ocr.verify
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn output_formats(&self) -> &[String] {
        &self.output.formats
    }

    fn bundle_output(&self) -> bool {
        self.output.bundle
    }

    fn default_currency(&self) -> &str {
        &self.output.default_currency
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
