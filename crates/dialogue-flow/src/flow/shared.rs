//! Thread-safe flow controller with per-conversation serialization.
//!
//! A speaker decision is a read-modify-write across several maps of one
//! conversation's state. [`SharedFlowController`] wraps each state in its own
//! mutex so that calls for the same conversation run one at a time, while
//! calls for different conversations only share a brief read lock on the
//! index. Random picks draw from a per-call generator seeded from the shared
//! one, so the shared generator is never locked together with a state.

use super::clock::{Clock, SystemClock};
use super::config::FlowConfig;
use super::error::FlowError;
use super::participant::{FlowMessage, Participant};
use super::state::ConversationFlowState;
use super::stats::FlowStatistics;
use rand::{RngCore, SeedableRng};
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

type StateHandle = Arc<Mutex<ConversationFlowState>>;

#[derive(Debug)]
struct Inner {
    conversations: RwLock<HashMap<String, StateHandle>>,
    config: FlowConfig,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

/// Cloneable, `Send + Sync` handle to a set of conversation flow states.
///
/// Offers the same operations as [`FlowController`](super::FlowController)
/// through `&self`.
///
/// # Examples
///
/// ```
/// use dialogue_flow::{Participant, SharedFlowController};
/// use std::thread;
///
/// let flow = SharedFlowController::new();
/// let handles: Vec<_> = (0..4)
///     .map(|i| {
///         let flow = flow.clone();
///         thread::spawn(move || {
///             let id = format!("room-{}", i);
///             flow.initialize_conversation(
///                 id.clone(),
///                 vec![Participant::new("a", "Alice"), Participant::new("b", "Bob")],
///             );
///             flow.get_next_speaker(&id, None).unwrap()
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert_eq!(flow.conversation_count(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SharedFlowController {
    inner: Arc<Inner>,
}

impl SharedFlowController {
    pub fn new() -> Self {
        Self::with_config(FlowConfig::default())
    }

    pub fn with_config(config: FlowConfig) -> Self {
        Self::build(config, Arc::new(SystemClock), StdRng::from_entropy())
    }

    /// Creates a controller with an explicit clock and seed.
    pub fn with_clock_and_seed(config: FlowConfig, clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::build(config, clock, StdRng::seed_from_u64(seed))
    }

    fn build(config: FlowConfig, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            inner: Arc::new(Inner {
                conversations: RwLock::new(HashMap::new()),
                config,
                clock,
                rng: Mutex::new(rng),
            }),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.inner.config
    }

    /// Creates the flow state for a conversation, replacing any existing one.
    pub fn initialize_conversation(
        &self,
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
        let state = {
            let mut rng = lock(&self.inner.rng);
            ConversationFlowState::new(participants, self.inner.config.clone(), &mut *rng)
        };

        let replaced = self
            .inner
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation_id.clone(), Arc::new(Mutex::new(state)))
            .is_some();

        info!(
            target: "dialogue_flow::controller",
            conversation_id = %conversation_id,
            participant_count,
            replaced,
            event = "conversation_initialized"
        );
    }

    /// Returns a snapshot of a conversation's flow state.
    pub fn get_conversation_state(&self, conversation_id: &str) -> Option<ConversationFlowState> {
        let handle = self.handle(conversation_id)?;
        let state = lock(&handle);
        Some(state.clone())
    }

    /// Discards the flow state of a conversation. Idempotent.
    pub fn cleanup_conversation(&self, conversation_id: &str) {
        let removed = self
            .inner
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conversation_id)
            .is_some();

        if removed {
            info!(
                target: "dialogue_flow::controller",
                conversation_id = %conversation_id,
                event = "conversation_cleaned_up"
            );
        }
    }

    /// Decides who speaks next; see
    /// [`FlowController::get_next_speaker`](super::FlowController::get_next_speaker).
    pub fn get_next_speaker(
        &self,
        conversation_id: &str,
        last_message: Option<&FlowMessage>,
    ) -> Result<Participant, FlowError> {
        let handle = self.require(conversation_id)?;
        let mut rng = self.fork_rng();
        let mut state = lock(&handle);
        let now = self.inner.clock.now_millis();

        state
            .next_speaker(last_message, now, &mut rng)
            .ok_or_else(|| FlowError::NoSpeaker(conversation_id.to_string()))
    }

    /// Puts back a snapshot taken with
    /// [`get_conversation_state`](Self::get_conversation_state).
    ///
    /// Used to roll back a speaker decision whose turn never happened. Returns
    /// `false` and does nothing if the conversation was cleaned up meanwhile.
    pub fn restore_conversation_state(
        &self,
        conversation_id: &str,
        snapshot: ConversationFlowState,
    ) -> bool {
        let Some(handle) = self.handle(conversation_id) else {
            return false;
        };
        *lock(&handle) = snapshot;

        debug!(
            target: "dialogue_flow::controller",
            conversation_id = %conversation_id,
            event = "conversation_restored"
        );
        true
    }

    /// Builds advisory mention hints for `participant`'s next prompt.
    pub fn generate_mention_context(
        &self,
        conversation_id: &str,
        participant: &Participant,
        recent_messages: &[FlowMessage],
    ) -> Result<String, FlowError> {
        let handle = self.require(conversation_id)?;
        let state = lock(&handle);
        Ok(state.mention_context(participant, recent_messages, self.inner.clock.now_millis())?)
    }

    /// Returns a diagnostic snapshot, or `None` if the id is unknown.
    pub fn get_flow_statistics(&self, conversation_id: &str) -> Option<FlowStatistics> {
        let handle = self.handle(conversation_id)?;
        let state = lock(&handle);
        Some(state.statistics())
    }

    pub fn conversation_count(&self) -> usize {
        self.inner
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn fork_rng(&self) -> StdRng {
        StdRng::seed_from_u64(lock(&self.inner.rng).next_u64())
    }

    fn handle(&self, conversation_id: &str) -> Option<StateHandle> {
        self.inner
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned()
    }

    fn require(&self, conversation_id: &str) -> Result<StateHandle, FlowError> {
        self.handle(conversation_id)
            .ok_or_else(|| FlowError::ConversationNotFound(conversation_id.to_string()))
    }
}

impl Default for SharedFlowController {
    fn default() -> Self {
        Self::new()
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
