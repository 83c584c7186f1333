//! Conversation engine for voice-driven form completion.
//!
//! A conversation walks a respondent through a form one question at a
//! time. Each user turn is interpreted, validated and applied to an explicit
//! state machine ([`machine`]) that decides whether to accept the answer,
//! ask again, ask a clarifying follow-up, or move on. The
//! [`ConversationEngine`] wires the machine to its collaborators:
//!
//! - a [`FormProvider`] for question definitions
//! - a [`SessionStore`] that persists state between turns
//! - an answer interpreter and sentiment scorer from `vocaform-answers`
//! - an optional [`Transcriber`](vocaform_voice::Transcriber) for audio turns
//! - a [`CompletionNotifier`] told about finished responses
//!
//! # Guarantees
//!
//! - Turns for one conversation are applied one at a time.
//! - A turn is either fully persisted or not applied at all.
//! - The question index never moves backwards.
//! - A conversation completes only once every required question has an
//!   answer record, and always completes in a bounded number of turns
//!   because each question has a retry cap.

pub mod engine;
pub mod error;
pub mod machine;
pub mod prompts;
pub mod providers;
pub mod store;

pub use engine::{ConversationEngine, TurnReply};
pub use error::ConversationError;
pub use machine::TurnInput;
pub use providers::{
    CompletionNotifier, CompletionReport, FormProvider, LogNotifier, NotifyError,
    SqliteFormProvider, StaticFormProvider,
};
pub use store::{ArchiveReason, MemorySessionStore, SessionStore, SqliteSessionStore, StoreError};
