//! Participants and the message records the controller reads.

use serde::{Deserialize, Serialize};

/// An agent eligible to speak in a conversation.
///
/// Owned by the embedding application; the controller keeps copies for the
/// lifetime of a conversation state. Only `id` and `display_name` affect flow
/// decisions. The remaining fields are passed through to statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Opaque unique identifier.
    pub id: String,

    /// Name used for mention matching and turn tracking.
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

impl Participant {
    /// Creates a participant with only an id and a display name.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            model_identifier: None,
            provider_name: None,
            system_instruction: None,
        }
    }

    pub fn with_model(mut self, model_identifier: impl Into<String>) -> Self {
        self.model_identifier = Some(model_identifier.into());
        self
    }

    pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }
}

/// A message as seen by the flow controller.
///
/// Used both for the message that triggers a speaker decision and for the
/// recent-history feed behind mention-context hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMessage {
    /// Display name of the sender, if known.
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Raw message text, scanned for `@name` mentions.
    pub content: String,
}

impl FlowMessage {
    /// Creates a message from a named sender.
    pub fn new(sender_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_name: Some(sender_name.into()),
            content: content.into(),
        }
    }

    /// Creates a message without a known sender.
    pub fn anonymous(content: impl Into<String>) -> Self {
        Self {
            sender_name: None,
            content: content.into(),
        }
    }

    /// Returns true if the message carries any text.
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Returns the sender name, treating an empty name as unknown.
    pub fn sender(&self) -> Option<&str> {
        self.sender_name.as_deref().filter(|name| !name.is_empty())
    }
}
