use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::llm::LlmConfig;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_data")]
    pub data_folder: String,

    #[serde(default = "default_language")]
    pub language: Language,

    #[serde(default = "default_upload_chunk_chars")]
    pub upload_chunk_chars: usize,

    #[serde(default)]
    pub book: BookDefaults,

    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Vi,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Vi => "vi",
            Language::En => "en",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookDefaults {
    #[serde(default = "default_chapters_count")]
    pub chapters_count: u32,
    #[serde(default = "default_duration_min")]
    pub duration_min: u32,
    #[serde(default = "default_frame_ratio")]
    pub frame_ratio: String,
}

impl Default for BookDefaults {
    fn default() -> Self {
        Self {
            chapters_count: default_chapters_count(),
            duration_min: default_duration_min(),
            frame_ratio: default_frame_ratio(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            data_folder: default_data(),
            language: default_language(),
            upload_chunk_chars: default_upload_chunk_chars(),
            book: BookDefaults::default(),
            llm: LlmConfig::default(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_data() -> String {
    "build".to_string()
}
fn default_language() -> Language {
    Language::Vi
}
fn default_upload_chunk_chars() -> usize {
    3000
}
fn default_chapters_count() -> u32 {
    12
}
fn default_duration_min() -> u32 {
    240
}
fn default_frame_ratio() -> String {
    "9:16".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(CONFIG_FILE, content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.data_folder)?;
        Ok(())
    }
}
