//! Configuration type definitions
//!
//! Every section is optional in YAML; a missing file or an empty document
//! yields a working configuration as long as an API key is available in the
//! environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core_types::VoiceGender;
use crate::errors::SearchError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const STORAGE_FILE_NAME: &str = "omnisearch_v11.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OmniConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_search_model")]
    pub search_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Longest prefix of a message sent to the speech model, in characters.
    #[serde(default = "default_speech_char_limit")]
    pub speech_char_limit: usize,
    #[serde(default)]
    pub auth: LlmAuth,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            search_model: default_search_model(),
            tts_model: default_tts_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            speech_char_limit: default_speech_char_limit(),
            auth: LlmAuth::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LlmAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Command used to play generated WAV files, e.g. `aplay` or `afplay`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default)]
    pub voice: VoiceGender,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            output_dir: default_output_dir(),
            player: None,
            voice: VoiceGender::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_search_model() -> String { DEFAULT_SEARCH_MODEL.to_string() }
fn default_tts_model() -> String { DEFAULT_TTS_MODEL.to_string() }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_speech_char_limit() -> usize { 1000 }
fn default_sample_rate() -> u32 { 24000 }
fn default_channels() -> u16 { 1 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> PathBuf { PathBuf::from("omnisearch.log") }
fn default_output_dir() -> PathBuf { std::env::temp_dir().join("omnisearch") }

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("omnisearch")
        .join(STORAGE_FILE_NAME)
}

impl OmniConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.llm.search_model.trim().is_empty() {
            return Err(SearchError::Config("llm.search_model cannot be empty".to_string()));
        }

        if self.llm.tts_model.trim().is_empty() {
            return Err(SearchError::Config("llm.tts_model cannot be empty".to_string()));
        }

        if self.llm.base_url.trim().is_empty() {
            return Err(SearchError::Config("llm.base_url cannot be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(SearchError::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.speech_char_limit == 0 {
            return Err(SearchError::Config("llm.speech_char_limit must be greater than 0".to_string()));
        }

        if self.audio.sample_rate == 0 {
            return Err(SearchError::Config("audio.sample_rate must be greater than 0".to_string()));
        }

        if self.audio.channels == 0 {
            return Err(SearchError::Config("audio.channels must be greater than 0".to_string()));
        }

        Ok(())
    }
}
