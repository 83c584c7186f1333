use crate::store::StoreError;
use thiserror::Error;
use vocaform_answers::AnswerError;
use vocaform_types::Phase;
use vocaform_voice::VoiceError;

/// Errors surfaced by the state machine and the conversation engine.
///
/// None of these leave a partially applied turn behind: the engine only
/// persists a state after every step of the turn succeeded.
#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    UnknownConversation(String),

    #[error("form not found: {0}")]
    UnknownForm(String),

    #[error("question not found: {0}")]
    UnknownQuestion(String),

    #[error("conversation {0} is already complete")]
    AlreadyComplete(String),

    #[error("conversation {0} was abandoned")]
    Abandoned(String),

    #[error("conversation {conversation_id} cannot take this step in phase {phase}")]
    InvalidPhase {
        conversation_id: String,
        phase: Phase,
    },

    #[error("transcription failed: {0}")]
    TranscriptionFailed(#[from] VoiceError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("conversation {conversation_id} cannot close, unanswered required questions: {missing:?}")]
    IncompleteForm {
        conversation_id: String,
        missing: Vec<String>,
    },
}
