use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::Result;

#[derive(Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub extractor: ExtractorSection,
}

#[derive(Deserialize)]
pub struct ExtractorSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for ExtractorSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the file at `path`, or fall back to defaults when there is none.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
