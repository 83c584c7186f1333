use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("audio input too large: {size} bytes (limit: {limit} bytes)")]
    InputTooLarge { size: usize, limit: usize },

    #[error("audio input is empty")]
    EmptyInput,

    #[error("STT error: {0}")]
    Stt(String),

    #[error("STT process timed out after {0} seconds")]
    Timeout(u64),

    #[error("transcription produced no text")]
    EmptyTranscript,
}
