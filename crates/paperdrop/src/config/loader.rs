use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SUPPORTED_VERSION: &str = "1.0";
const MIN_DPI: u32 = 72;
const MAX_DPI: u32 = 1200;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.upload_directory.trim().is_empty() {
        return Err(invalid("uploadDirectory must not be empty"));
    }
    if config.max_file_size == 0 {
        return Err(invalid("maxFileSize must be greater than 0"));
    }
    if config.worker_count == 0 {
        return Err(invalid("workerCount must be greater than 0"));
    }
    if config.job_timeout_secs == 0 {
        return Err(invalid("jobTimeoutSecs must be greater than 0"));
    }

    if !(MIN_DPI..=MAX_DPI).contains(&config.ocr.dpi) {
        return Err(invalid(format!(
            "ocr.dpi must be between {} and {}, got {}",
            MIN_DPI, MAX_DPI, config.ocr.dpi
        )));
    }

    for language in &config.ocr.languages {
        if !is_valid_language_code(language) {
            return Err(invalid(format!("Invalid OCR language code '{}'", language)));
        }
    }

    Ok(())
}

/// Tesseract language codes look like `eng`, `chi_sim`, `deu_latf`.
fn is_valid_language_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
