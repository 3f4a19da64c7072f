//! Error types for the flow module.

use thiserror::Error;

/// Errors returned by flow controller operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// No state exists for the conversation id.
    ///
    /// Recoverable: initialize the conversation, or report it to the user.
    #[error("Conversation not initialized: {0}")]
    ConversationNotFound(String),

    /// The conversation has no participants to choose from.
    ///
    /// This is a configuration error for that conversation; retrying will not
    /// help until it is re-initialized with participants.
    #[error("No speaker available in conversation: {0}")]
    NoSpeaker(String),

    /// Rendering the mention-context hints failed.
    #[error("Failed to render mention context: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// A turn generator failed to produce text.
    #[error("Turn generation failed: {0}")]
    GenerationFailed(String),
}

impl FlowError {
    /// Check if the caller can recover by initializing the conversation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowError::ConversationNotFound(_))
    }

    /// Check if the error is fatal for the conversation it names.
    ///
    /// Returns `true` for `NoSpeaker`: the participant list is empty and every
    /// later call would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FlowError::NoSpeaker(_))
    }
}
