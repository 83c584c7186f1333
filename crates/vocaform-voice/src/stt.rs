use crate::config::SttConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Text recognised from one audio clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    /// 0.0 to 1.0. Backends without per-token scores report 1.0.
    pub confidence: f32,
}

/// Turns raw audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription, VoiceError>;
}

/// Strips whisper.cpp segment timestamps (`[00:00:00.000 --> 00:00:02.000]`)
/// and joins segments into one line.
pub fn clean_transcript(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let line = line.trim();
            match line.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
                Some((stamp, text)) if stamp.contains("-->") => text.trim(),
                _ => line,
            }
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// whisper.cpp subprocess transcriber.
#[derive(Debug, Clone)]
pub struct SttService {
    model_path: PathBuf,
    binary_path: PathBuf,
    timeout: Duration,
    max_input_bytes: usize,
}

impl SttService {
    pub fn new(model_path: impl Into<PathBuf>, binary_path: impl Into<PathBuf>) -> Self {
        Self::from_config(&SttConfig {
            model_path: model_path.into(),
            binary_path: binary_path.into(),
            ..SttConfig::default()
        })
    }

    pub fn from_config(config: &SttConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            binary_path: config.binary_path.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_input_bytes: config.max_input_bytes,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_input_bytes(&self) -> usize {
        self.max_input_bytes
    }

    async fn run(&self, audio_data: &[u8]) -> Result<String, VoiceError> {
        if audio_data.is_empty() {
            return Err(VoiceError::EmptyInput);
        }
        if audio_data.len() > self.max_input_bytes {
            return Err(VoiceError::InputTooLarge {
                size: audio_data.len(),
                limit: self.max_input_bytes,
            });
        }

        // -m <model>, -f - reads audio from stdin, -nt drops timestamps where supported
        let mut command = Command::new(&self.binary_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg("-")
            .arg("-nt")
            .kill_on_drop(true)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("Failed to spawn STT binary: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Stt("Failed to open stdin".to_string()))?;

        // A binary that never reads stdin blocks the write once the pipe
        // fills, so the write runs under the same deadline as the wait.
        let exchange = async move {
            // A binary that ignores stdin may exit before we finish writing.
            if let Err(e) = stdin.write_all(audio_data).await {
                tracing::debug!(error = %e, "STT process closed stdin early");
            }
            drop(stdin);
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| VoiceError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| VoiceError::Stt(format!("Failed to read stdout: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!(
                "STT binary failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Transcriber for SttService {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcription, VoiceError> {
        let raw = self.run(audio).await?;
        let text = clean_transcript(&raw);
        if text.is_empty() {
            return Err(VoiceError::EmptyTranscript);
        }
        tracing::debug!(bytes = audio.len(), chars = text.len(), "audio transcribed");
        Ok(Transcription {
            text,
            confidence: 1.0,
        })
    }
}
