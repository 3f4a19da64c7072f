//! Single-owner flow controller.

use super::clock::{Clock, SystemClock};
use super::config::FlowConfig;
use super::error::FlowError;
use super::participant::{FlowMessage, Participant};
use super::state::ConversationFlowState;
use super::stats::FlowStatistics;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Decides who speaks next across any number of conversations.
///
/// Holds one [`ConversationFlowState`] per conversation id. Operations on one
/// conversation never touch another's state. All operations complete
/// synchronously.
///
/// For use from several threads at once, see
/// [`SharedFlowController`](super::SharedFlowController).
///
/// # Examples
///
/// ```
/// use dialogue_flow::{FlowController, FlowMessage, ManualClock, Participant};
/// use std::sync::Arc;
///
/// let clock = ManualClock::new(1_000_000);
/// let mut flow = FlowController::new()
///     .with_clock(Arc::new(clock.clone()))
///     .with_seed(42);
///
/// flow.initialize_conversation("room", vec![
///     Participant::new("a", "Alice"),
///     Participant::new("b", "Bob"),
/// ]);
///
/// let next = flow
///     .get_next_speaker("room", Some(&FlowMessage::new("Alice", "@Bob?")))
///     .unwrap();
/// assert_eq!(next.display_name, "Bob");
///
/// let stats = flow.get_flow_statistics("room").unwrap();
/// assert_eq!(stats.mention_chains.get("Alice-Bob"), Some(&1));
/// ```
#[derive(Debug)]
pub struct FlowController {
    conversations: HashMap<String, ConversationFlowState>,
    config: FlowConfig,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl FlowController {
    /// Creates a controller with default config, the system clock and an
    /// entropy-seeded random source.
    pub fn new() -> Self {
        Self::with_config(FlowConfig::default())
    }

    pub fn with_config(config: FlowConfig) -> Self {
        Self {
            conversations: HashMap::new(),
            config,
            clock: Arc::new(SystemClock),
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Makes random choices reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Creates the flow state for a conversation.
    ///
    /// An existing state for the same id is replaced, not merged.
    pub fn initialize_conversation(
        &mut self,
        conversation_id: impl Into<String>,
        participants: Vec<Participant>,
    ) {
        let conversation_id = conversation_id.into();
        if participants.is_empty() {
            warn!(
                target: "dialogue_flow::controller",
                conversation_id = %conversation_id,
                event = "empty_participants"
            );
        }

        let participant_count = participants.len();
        let state = ConversationFlowState::new(participants, self.config.clone(), &mut self.rng);
        let replaced = self
            .conversations
            .insert(conversation_id.clone(), state)
            .is_some();

        info!(
            target: "dialogue_flow::controller",
            conversation_id = %conversation_id,
            participant_count,
            replaced,
            event = "conversation_initialized"
        );
    }

    /// Returns the flow state of a conversation, if initialized.
    pub fn get_conversation_state(&self, conversation_id: &str) -> Option<&ConversationFlowState> {
        self.conversations.get(conversation_id)
    }

    /// Discards the flow state of a conversation. Idempotent.
    pub fn cleanup_conversation(&mut self, conversation_id: &str) {
        if self.conversations.remove(conversation_id).is_some() {
            info!(
                target: "dialogue_flow::controller",
                conversation_id = %conversation_id,
                event = "conversation_cleaned_up"
            );
        }
    }

    /// Decides who speaks next.
    ///
    /// `last_message` is the message that just arrived. When it is absent or
    /// empty, mentions are not consulted and a random participant is chosen.
    ///
    /// # Errors
    ///
    /// - [`FlowError::ConversationNotFound`] if the id was never initialized.
    /// - [`FlowError::NoSpeaker`] if the conversation has no participants.
    pub fn get_next_speaker(
        &mut self,
        conversation_id: &str,
        last_message: Option<&FlowMessage>,
    ) -> Result<Participant, FlowError> {
        let now = self.clock.now_millis();
        let state = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| FlowError::ConversationNotFound(conversation_id.to_string()))?;

        state
            .next_speaker(last_message, now, &mut self.rng)
            .ok_or_else(|| FlowError::NoSpeaker(conversation_id.to_string()))
    }

    /// Builds advisory mention hints for `participant`'s next prompt.
    ///
    /// Reads at most the last `context_window` entries of `recent_messages`.
    /// Returns an empty string when nothing applies.
    pub fn generate_mention_context(
        &self,
        conversation_id: &str,
        participant: &Participant,
        recent_messages: &[FlowMessage],
    ) -> Result<String, FlowError> {
        let state = self
            .conversations
            .get(conversation_id)
            .ok_or_else(|| FlowError::ConversationNotFound(conversation_id.to_string()))?;

        Ok(state.mention_context(participant, recent_messages, self.clock.now_millis())?)
    }

    /// Returns a diagnostic snapshot, or `None` if the id is unknown.
    pub fn get_flow_statistics(&self, conversation_id: &str) -> Option<FlowStatistics> {
        self.conversations
            .get(conversation_id)
            .map(ConversationFlowState::statistics)
    }

    /// Returns the number of initialized conversations.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations.keys().cloned().collect()
    }
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new()
    }
}
