//! Speech-to-text for Vocaform conversations.
//!
//! Spoken answers arrive as raw audio and are transcribed before they reach
//! the answer interpreter. The [`Transcriber`] trait is the seam the
//! conversation engine depends on; [`SttService`] implements it by piping
//! audio through a local whisper.cpp binary.

pub mod config;
pub mod error;
pub mod stt;

pub use config::SttConfig;
pub use error::VoiceError;
pub use stt::{clean_transcript, SttService, Transcriber, Transcription};
