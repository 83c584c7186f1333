//! Error types for answer interpretation and enrichment.

/// Errors raised while interpreting or validating an answer.
///
/// These describe broken question configuration or a failing interpreter
/// backend. An answer the user simply got wrong is a `Decision::Reject`,
/// not an error.
#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    /// The question cannot be answered as configured.
    #[error("malformed question {question_id}: {reason}")]
    MalformedQuestion { question_id: String, reason: String },

    /// A remote interpreter failed to produce a candidate.
    #[error("interpreter failed: {0}")]
    Interpreter(String),
}

/// Errors raised by a sentiment scorer. Always non-fatal to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SentimentError {
    /// Nothing to score.
    #[error("sentiment input is empty")]
    EmptyInput,

    /// The scoring backend could not be reached or answered badly.
    #[error("sentiment scorer unavailable: {0}")]
    Unavailable(String),
}
