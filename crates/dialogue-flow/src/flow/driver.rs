//! Async turn loop that drives a conversation with the flow controller.
//!
//! The driver owns none of the text generation. Each turn it asks the
//! [`SharedFlowController`] for the next speaker, builds that speaker's mention
//! hints, and hands both to a [`TurnGenerator`]. The reply is appended to the
//! history and becomes the trigger message of the following turn.
//!
//! Generation is awaited without holding any flow lock, and the next speaker
//! is only requested after the previous reply arrived, so turns of one
//! conversation never interleave. A failed generation restores the flow
//! state captured before the speaker was chosen.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dialogue_flow::{DriverConfig, FlowMessage, SharedFlowController, TurnDriver};
//! use std::sync::Arc;
//!
//! let flow = SharedFlowController::new();
//! flow.initialize_conversation("room", participants);
//!
//! let driver = TurnDriver::new(flow, Arc::new(my_generator))
//!     .with_config(DriverConfig { max_turns: 6, ..Default::default() });
//!
//! let mut history = vec![FlowMessage::new("User", "Kick off: @Alice, your take?")];
//! let turns = driver.run("room", &mut history).await?;
//! ```

use super::error::FlowError;
use super::participant::{FlowMessage, Participant};
use super::shared::SharedFlowController;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a generator needs to produce one participant's turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: String,
    /// The participant whose turn it is.
    pub speaker: Participant,
    /// Advisory mention hints for the speaker's prompt. May be empty.
    pub mention_context: String,
    /// Conversation so far, oldest first.
    pub history: Vec<FlowMessage>,
}

/// Produces the text of one turn. Implemented by the embedding application,
/// typically by calling a language model.
#[async_trait]
pub trait TurnGenerator: Send + Sync {
    async fn generate(&self, request: TurnRequest) -> Result<String, FlowError>;
}

/// A completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Who spoke in this turn
    pub speaker: Participant,

    /// What was said
    pub content: String,
}

/// Configuration for the turn loop.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Number of turns produced by one [`TurnDriver::run`] call.
    ///
    /// **Default:** 10
    pub max_turns: usize,

    /// Minimum delay between consecutive turns.
    ///
    /// Spreads generation calls out to stay under provider rate limits.
    /// `Duration::ZERO` disables the delay.
    ///
    /// **Default:** `Duration::ZERO`
    pub min_turn_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            min_turn_interval: Duration::ZERO,
        }
    }
}

/// Runs turns of a conversation against a [`TurnGenerator`].
pub struct TurnDriver {
    flow: SharedFlowController,
    generator: Arc<dyn TurnGenerator>,
    config: DriverConfig,
}

impl TurnDriver {
    pub fn new(flow: SharedFlowController, generator: Arc<dyn TurnGenerator>) -> Self {
        Self {
            flow,
            generator,
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn flow(&self) -> &SharedFlowController {
        &self.flow
    }

    /// Produces one turn and appends it to `history`.
    ///
    /// The last entry of `history`, if any, is the message the speaker
    /// decision reacts to. If generation fails, the speaker decision is
    /// rolled back so the turn can be retried from the same history.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        history: &mut Vec<FlowMessage>,
    ) -> Result<DialogueTurn, FlowError> {
        let snapshot = self
            .flow
            .get_conversation_state(conversation_id)
            .ok_or_else(|| FlowError::ConversationNotFound(conversation_id.to_string()))?;
        let speaker = self.flow.get_next_speaker(conversation_id, history.last())?;
        let content = match self.generate(conversation_id, &speaker, history).await {
            Ok(content) => content,
            Err(err) => {
                self.flow.restore_conversation_state(conversation_id, snapshot);
                warn!(
                    target: "dialogue_flow::driver",
                    conversation_id = %conversation_id,
                    speaker = %speaker.display_name,
                    error = %err,
                    event = "turn_rolled_back"
                );
                return Err(err);
            }
        };

        history.push(FlowMessage::new(speaker.display_name.clone(), content.clone()));
        info!(
            target: "dialogue_flow::driver",
            conversation_id = %conversation_id,
            speaker = %speaker.display_name,
            turn = history.len(),
            event = "dialogue_turn_emitted"
        );

        Ok(DialogueTurn { speaker, content })
    }

    async fn generate(
        &self,
        conversation_id: &str,
        speaker: &Participant,
        history: &[FlowMessage],
    ) -> Result<String, FlowError> {
        let mention_context = self
            .flow
            .generate_mention_context(conversation_id, speaker, history)?;

        let request = TurnRequest {
            conversation_id: conversation_id.to_string(),
            speaker: speaker.clone(),
            mention_context,
            history: history.to_vec(),
        };
        self.generator.generate(request).await
    }

    /// Produces up to `max_turns` turns, stopping at the first error.
    pub async fn run(
        &self,
        conversation_id: &str,
        history: &mut Vec<FlowMessage>,
    ) -> Result<Vec<DialogueTurn>, FlowError> {
        let mut turns = Vec::new();

        for idx in 0..self.config.max_turns {
            if idx > 0 && !self.config.min_turn_interval.is_zero() {
                tokio::time::sleep(self.config.min_turn_interval).await;
            }
            turns.push(self.run_turn(conversation_id, history).await?);
        }

        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::clock::ManualClock;
    use crate::flow::config::FlowConfig;
    use std::sync::Mutex;

    /// Replies with a scripted line per call and records every request.
    struct ScriptedGenerator {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<TurnRequest>>,
    }

    impl ScriptedGenerator {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TurnGenerator for ScriptedGenerator {
        async fn generate(&self, request: TurnRequest) -> Result<String, FlowError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| FlowError::GenerationFailed("script exhausted".to_string()))
        }
    }

    fn flow() -> SharedFlowController {
        let flow = SharedFlowController::with_clock_and_seed(
            FlowConfig::default(),
            Arc::new(ManualClock::new(1_000_000)),
            8,
        );
        flow.initialize_conversation(
            "room",
            vec![
                Participant::new("a", "Alice"),
                Participant::new("b", "Bob"),
                Participant::new("c", "Carol"),
            ],
        );
        flow
    }

    #[tokio::test]
    async fn test_run_turn_follows_mention() {
        let generator = Arc::new(ScriptedGenerator::new(&["Happy to."]));
        let driver = TurnDriver::new(flow(), generator.clone());
        let mut history = vec![FlowMessage::new("User", "@Carol can you start?")];

        let turn = driver.run_turn("room", &mut history).await.unwrap();

        assert_eq!(turn.speaker.display_name, "Carol");
        assert_eq!(turn.content, "Happy to.");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], FlowMessage::new("Carol", "Happy to."));

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].history.len(), 1);
        assert!(requests[0].mention_context.contains("User addressed you directly."));
    }

    #[tokio::test]
    async fn test_run_stops_at_max_turns() {
        let generator = Arc::new(ScriptedGenerator::new(&["one", "two", "three", "four"]));
        let driver = TurnDriver::new(flow(), generator).with_config(DriverConfig {
            max_turns: 3,
            ..Default::default()
        });
        let mut history = Vec::new();

        let turns = driver.run("room", &mut history).await.unwrap();

        assert_eq!(turns.len(), 3);
        assert_eq!(history.len(), 3);
        for pair in turns.windows(2) {
            assert_ne!(pair[0].speaker.id, pair[1].speaker.id);
        }
    }

    #[tokio::test]
    async fn test_generator_error_is_propagated() {
        let generator = Arc::new(ScriptedGenerator::new(&["only one"]));
        let driver = TurnDriver::new(flow(), generator);
        let mut history = Vec::new();

        let err = driver.run("room", &mut history).await.unwrap_err();

        assert!(matches!(err, FlowError::GenerationFailed(_)));
        assert_eq!(history.len(), 1);
    }

    /// Fails the first call, then replies normally.
    struct FlakyGenerator {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl TurnGenerator for FlakyGenerator {
        async fn generate(&self, _request: TurnRequest) -> Result<String, FlowError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                return Err(FlowError::GenerationFailed("backend timeout".to_string()));
            }
            Ok("Sure.".to_string())
        }
    }

    #[tokio::test]
    async fn test_failed_turn_is_rolled_back() {
        let generator = Arc::new(FlakyGenerator {
            calls: Mutex::new(0),
        });
        let driver = TurnDriver::new(flow(), generator);
        let mut history = vec![FlowMessage::new("User", "@Carol can you start?")];

        let err = driver.run_turn("room", &mut history).await.unwrap_err();
        assert!(matches!(err, FlowError::GenerationFailed(_)));
        assert_eq!(history.len(), 1);

        let stats = driver.flow().get_flow_statistics("room").unwrap();
        assert_eq!(stats.last_speaker, None);
        assert!(stats.mention_chains.is_empty());
        assert!(stats.recent_mentions.is_empty());

        let retry = driver.run_turn("room", &mut history).await.unwrap();
        assert_eq!(retry.speaker.display_name, "Carol");
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let generator = Arc::new(ScriptedGenerator::new(&["unused"]));
        let driver = TurnDriver::new(flow(), generator.clone());
        let mut history = Vec::new();

        let err = driver.run_turn("nowhere", &mut history).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(generator.requests.lock().unwrap().is_empty());
    }
}
