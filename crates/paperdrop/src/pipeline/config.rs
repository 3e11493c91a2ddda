use crate::config::Config;

pub struct ChainConfig {
    pub max_file_size: u64,
    pub ocr_languages: Vec<String>,
    pub ocr_dpi: u32,
    pub tessdata_dir: Option<String>,
}

impl ChainConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size: config.max_file_size,
            ocr_languages: config.ocr.languages.clone(),
            ocr_dpi: config.ocr.dpi,
            tessdata_dir: config.ocr.tessdata_dir.clone(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
