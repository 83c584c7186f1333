use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_binary_path() -> PathBuf {
    PathBuf::from("whisper-cli")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/ggml-base.en.bin")
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_max_input_bytes() -> usize {
    10 * 1024 * 1024
}

/// Speech-to-text settings, the `[stt]` section of the server config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Path to the whisper.cpp executable.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,
    /// Path to the GGML model file.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Hard limit on one transcription run. Default: 120.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Largest accepted audio payload. Default: 10 MiB.
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            model_path: default_model_path(),
            timeout_seconds: default_timeout_seconds(),
            max_input_bytes: default_max_input_bytes(),
        }
    }
}

impl SttConfig {
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.binary_path.as_os_str().is_empty() {
            return Err(VoiceError::Config("stt.binary_path must not be empty".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(VoiceError::Config(
                "stt.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.max_input_bytes == 0 {
            return Err(VoiceError::Config(
                "stt.max_input_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
