use crate::utils::error::{ExtractorError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    let invalid = |reason: String| ExtractorError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: url_str.to_string(),
        reason,
    };

    if url_str.is_empty() {
        return Err(invalid("URL cannot be empty".to_string()));
    }

    let url = Url::parse(url_str).map_err(|e| invalid(format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(format!("Unsupported URL scheme: {}", scheme))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() || path.contains('\0') {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path must be non-empty and contain no null bytes".to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 檢查輸出格式是否都是支援的格式
pub fn validate_output_formats(field_name: &str, formats: &[String]) -> Result<()> {
    const VALID: [&str; 2] = ["json", "csv"];

    if formats.is_empty() {
        return Err(ExtractorError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: String::new(),
            reason: "At least one output format is required".to_string(),
        });
    }

    for format in formats {
        if !VALID.iter().any(|valid| format.eq_ignore_ascii_case(valid)) {
            return Err(ExtractorError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: format.clone(),
                reason: format!("Unsupported format. Valid formats: {}", VALID.join(", ")),
            });
        }
    }
    Ok(())
}

/// An OCR command is either unset or a program followed by its arguments.
pub fn validate_command(field_name: &str, command: &[String]) -> Result<()> {
    if let Some(program) = command.first() {
        validate_non_empty_string(field_name, program)?;
    }
    Ok(())
}

pub fn validate_input_files(field_name: &str, files: &[String]) -> Result<()> {
    if files.is_empty() {
        return Err(ExtractorError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    for file in files {
        validate_path(field_name, file)?;
        let path = Path::new(file);
        if !crate::pdf::is_supported_document(path) {
            return Err(ExtractorError::UnsupportedDocument { path: file.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("llm.endpoint", "https://api.openai.com/v1").is_ok());
        assert!(validate_url("llm.endpoint", "http://localhost:11434/v1").is_ok());
        assert!(validate_url("llm.endpoint", "").is_err());
        assert!(validate_url("llm.endpoint", "not a url").is_err());
        assert!(validate_url("llm.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("llm.max_turns", 10, 1, 50).is_ok());
        assert!(validate_range("llm.max_turns", 0, 1, 50).is_err());
        assert!(validate_range("llm.temperature", 2.5, 0.0, 2.0).is_err());
    }

    #[test]
    fn test_validate_output_formats() {
        let ok = vec!["json".to_string(), "csv".to_string()];
        assert!(validate_output_formats("output.formats", &ok).is_ok());

        let upper = vec!["JSON".to_string(), "Csv".to_string()];
        assert!(validate_output_formats("output.formats", &upper).is_ok());

        let bad = vec!["xlsx".to_string()];
        assert!(validate_output_formats("output.formats", &bad).is_err());
        assert!(validate_output_formats("output.formats", &[]).is_err());
    }

    #[test]
    fn test_validate_input_files() {
        let files = vec!["bills/power.pdf".to_string(), "receipt.HEIC".to_string()];
        assert!(validate_input_files("files", &files).is_ok());

        let bad = vec!["notes.txt".to_string()];
        assert!(matches!(
            validate_input_files("files", &bad),
            Err(ExtractorError::UnsupportedDocument { .. })
        ));
        assert!(validate_input_files("files", &[]).is_err());
    }

    #[test]
    fn test_validate_command() {
        assert!(validate_command("ocr.tesseract_command", &[]).is_ok());
        assert!(validate_command("ocr.tesseract_command", &["python".to_string()]).is_ok());
        assert!(validate_command("ocr.tesseract_command", &[" ".to_string()]).is_err());
    }
}
