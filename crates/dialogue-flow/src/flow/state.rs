//! Per-conversation flow state and the turn decision built on it.
//!
//! A [`ConversationFlowState`] is created once per conversation and owned
//! exclusively by a controller. The mention guard ([`super::guard`]), the
//! random selector ([`super::selector`]) and the reporters
//! ([`super::stats`], [`super::context`]) all operate on it.

use super::config::FlowConfig;
use super::guard::ChainDecision;
use super::mention::resolve_all;
use super::participant::{FlowMessage, Participant};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Mentioner label used when the triggering message has no known sender.
pub(crate) const UNKNOWN_SENDER: &str = "unknown";

/// Ordered pair `(mentioner, mentioned)` indexing mention chains.
///
/// Direction matters: `Alice -> Bob` and `Bob -> Alice` are tracked
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainKey {
    pub mentioner: String,
    pub mentioned: String,
}

impl ChainKey {
    pub fn new(mentioner: impl Into<String>, mentioned: impl Into<String>) -> Self {
        Self {
            mentioner: mentioner.into(),
            mentioned: mentioned.into(),
        }
    }

    /// Returns the same pair in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            mentioner: self.mentioned.clone(),
            mentioned: self.mentioner.clone(),
        }
    }

    /// Returns true if `name` is on either side of the pair.
    pub fn involves(&self, name: &str) -> bool {
        self.mentioner == name || self.mentioned == name
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.mentioner, self.mentioned)
    }
}

/// The latest accepted mention that targeted a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionRecord {
    /// Display name of the mentioner.
    pub mentioned_by: String,
    /// When the mention was accepted, in milliseconds.
    pub timestamp: u64,
}

/// Turn-taking bookkeeping for one conversation.
///
/// # Invariants
///
/// - After any selection exactly one participant has a non-zero consecutive
///   turn count; before the first selection the map is empty.
/// - `mention_chain_counts` and `last_mention_timestamps` always share the
///   same key set.
/// - `last_speaker`, when set, is the id of a member of `participants`.
#[derive(Debug, Clone)]
pub struct ConversationFlowState {
    pub(crate) participants: Vec<Participant>,
    /// Shuffled at initialization. Reported in statistics, never used to pick
    /// speakers.
    pub(crate) speaking_order: Vec<Participant>,
    pub(crate) last_speaker: Option<String>,
    pub(crate) consecutive_turn_counts: HashMap<String, u32>,
    pub(crate) mention_chain_counts: HashMap<ChainKey, u32>,
    pub(crate) last_mention_timestamps: HashMap<ChainKey, u64>,
    pub(crate) last_mentions: HashMap<String, MentionRecord>,
    pub(crate) config: FlowConfig,
}

impl ConversationFlowState {
    /// Creates a fresh state for `participants`, shuffling the speaking order.
    pub fn new<R: Rng + ?Sized>(
        participants: Vec<Participant>,
        config: FlowConfig,
        rng: &mut R,
    ) -> Self {
        let mut speaking_order = participants.clone();
        speaking_order.shuffle(rng);

        Self {
            participants,
            speaking_order,
            last_speaker: None,
            consecutive_turn_counts: HashMap::new(),
            mention_chain_counts: HashMap::new(),
            last_mention_timestamps: HashMap::new(),
            last_mentions: HashMap::new(),
            config,
        }
    }

    /// Returns the participants in registration order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Returns the shuffled speaking order captured at initialization.
    pub fn speaking_order(&self) -> &[Participant] {
        &self.speaking_order
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Returns whoever was chosen last, if anyone.
    pub fn last_speaker(&self) -> Option<&Participant> {
        self.last_speaker
            .as_deref()
            .and_then(|id| self.participant_by_id(id))
    }

    /// Returns how many turns in a row the participant has just taken.
    pub fn consecutive_turns(&self, participant_id: &str) -> u32 {
        self.consecutive_turn_counts
            .get(participant_id)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the accepted-mention count for a directed pair.
    pub fn chain_count(&self, key: &ChainKey) -> u32 {
        self.mention_chain_counts.get(key).copied().unwrap_or(0)
    }

    /// Returns when the directed pair last had a mention accepted.
    pub fn last_mention_time(&self, key: &ChainKey) -> Option<u64> {
        self.last_mention_timestamps.get(key).copied()
    }

    /// Returns the latest accepted mention targeting the participant.
    pub fn last_mention_of(&self, participant_id: &str) -> Option<&MentionRecord> {
        self.last_mentions.get(participant_id)
    }

    /// Returns all directed chain counts.
    pub fn mention_chains(&self) -> &HashMap<ChainKey, u32> {
        &self.mention_chain_counts
    }

    pub(crate) fn participant_by_id(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Decides who speaks next and updates the bookkeeping.
    ///
    /// Mentions in `last_message` are tried in order; the first one the chain
    /// guard accepts picks the speaker. Otherwise the sender's chains are
    /// forgiven and a random participant is chosen.
    ///
    /// Returns `None` only when the conversation has no participants, in which
    /// case nothing is mutated.
    pub fn next_speaker<R: Rng + ?Sized>(
        &mut self,
        last_message: Option<&FlowMessage>,
        now: u64,
        rng: &mut R,
    ) -> Option<Participant> {
        if self.participants.is_empty() {
            return None;
        }

        let message = last_message.filter(|message| message.has_content());

        if let Some(message) = message {
            if let Some(chosen) = self.speaker_from_mentions(message, now) {
                self.record_turn(&chosen.id);
                return Some(chosen);
            }

            if let Some(sender) = message.sender() {
                let forgiven = self.forgive_chains(sender);
                if forgiven > 0 {
                    debug!(
                        target: "dialogue_flow::chain",
                        sender = %sender,
                        forgiven,
                        event = "chains_forgiven"
                    );
                }
            }
        }

        let chosen = self.select_random(rng)?.clone();
        self.record_turn(&chosen.id);
        info!(
            target: "dialogue_flow::controller",
            speaker = %chosen.display_name,
            reason = "random",
            event = "speaker_selected"
        );
        Some(chosen)
    }

    /// Tries every mention in the message, returning the first accepted one.
    fn speaker_from_mentions(&mut self, message: &FlowMessage, now: u64) -> Option<Participant> {
        let sender = message.sender();
        let mentioner = sender.unwrap_or(UNKNOWN_SENDER);

        let candidates: Vec<Participant> = resolve_all(&message.content, &self.participants)
            .into_iter()
            .cloned()
            .collect();

        for target in candidates {
            if sender == Some(target.display_name.as_str()) {
                continue;
            }

            let key = ChainKey::new(mentioner, target.display_name.clone());
            match self.check_mention(&key, now) {
                ChainDecision::Accept => {
                    self.accept_mention(&key, &target.id, now);
                    info!(
                        target: "dialogue_flow::controller",
                        speaker = %target.display_name,
                        mentioned_by = %mentioner,
                        reason = "mention",
                        event = "speaker_selected"
                    );
                    return Some(target);
                }
                ChainDecision::Reject(reason) => {
                    debug!(
                        target: "dialogue_flow::chain",
                        chain = %key,
                        reason = %reason,
                        event = "mention_rejected"
                    );
                }
            }
        }

        None
    }

    /// Marks `chosen_id` as the last speaker and resets everyone else's streak.
    pub(crate) fn record_turn(&mut self, chosen_id: &str) {
        for participant in &self.participants {
            let count = self
                .consecutive_turn_counts
                .entry(participant.id.clone())
                .or_insert(0);
            if participant.id == chosen_id {
                *count += 1;
            } else {
                *count = 0;
            }
        }
        self.last_speaker = Some(chosen_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn state(names: &[&str]) -> ConversationFlowState {
        let participants = names
            .iter()
            .map(|name| Participant::new(name.to_lowercase(), *name))
            .collect();
        ConversationFlowState::new(
            participants,
            FlowConfig::default(),
            &mut StdRng::seed_from_u64(7),
        )
    }

    fn non_zero_counts(state: &ConversationFlowState) -> Vec<String> {
        state
            .consecutive_turn_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[test]
    fn test_chain_key_display_and_reverse() {
        let key = ChainKey::new("Alice", "Bob");
        assert_eq!(key.to_string(), "Alice-Bob");
        assert_eq!(key.reversed(), ChainKey::new("Bob", "Alice"));
        assert!(key.involves("Bob"));
        assert!(!key.involves("Carol"));
    }

    #[test]
    fn test_speaking_order_is_permutation() {
        let state = state(&["Alice", "Bob", "Carol", "Dave"]);
        let mut ordered: Vec<_> = state
            .speaking_order()
            .iter()
            .map(|p| p.display_name.clone())
            .collect();
        ordered.sort();
        assert_eq!(ordered, vec!["Alice", "Bob", "Carol", "Dave"]);
    }

    #[test]
    fn test_record_turn_keeps_single_non_zero_count() {
        let mut state = state(&["Alice", "Bob", "Carol"]);
        assert!(state.consecutive_turn_counts.is_empty());

        state.record_turn("alice");
        state.record_turn("alice");
        assert_eq!(state.consecutive_turns("alice"), 2);
        assert_eq!(non_zero_counts(&state), vec!["alice"]);

        state.record_turn("bob");
        assert_eq!(state.consecutive_turns("alice"), 0);
        assert_eq!(state.consecutive_turns("bob"), 1);
        assert_eq!(non_zero_counts(&state), vec!["bob"]);
        assert_eq!(state.last_speaker().unwrap().display_name, "Bob");
    }

    #[test]
    fn test_next_speaker_without_participants() {
        let mut state = state(&[]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(state.next_speaker(None, 0, &mut rng).is_none());
        assert!(state.last_speaker.is_none());
        assert!(state.consecutive_turn_counts.is_empty());
    }

    #[test]
    fn test_mention_selects_target() {
        let mut state = state(&["Alice", "Bob", "Carol"]);
        let mut rng = StdRng::seed_from_u64(1);
        let message = FlowMessage::new("Alice", "what do you think @carol?");

        let chosen = state.next_speaker(Some(&message), 1_000, &mut rng).unwrap();
        assert_eq!(chosen.display_name, "Carol");
        assert_eq!(state.chain_count(&ChainKey::new("Alice", "Carol")), 1);
        assert_eq!(
            state.last_mention_of("carol"),
            Some(&MentionRecord {
                mentioned_by: "Alice".to_string(),
                timestamp: 1_000,
            })
        );
    }

    #[test]
    fn test_self_mention_is_skipped_for_next_candidate() {
        let mut state = state(&["Alice", "Bob", "Carol"]);
        let mut rng = StdRng::seed_from_u64(1);
        let message = FlowMessage::new("Alice", "@Alice here, passing to @Bob");

        let chosen = state.next_speaker(Some(&message), 1_000, &mut rng).unwrap();
        assert_eq!(chosen.display_name, "Bob");
        assert_eq!(state.chain_count(&ChainKey::new("Alice", "Alice")), 0);
    }

    #[test]
    fn test_anonymous_mention_uses_unknown_sender() {
        let mut state = state(&["Alice", "Bob"]);
        let mut rng = StdRng::seed_from_u64(1);
        let message = FlowMessage::anonymous("@Bob please start");

        let chosen = state.next_speaker(Some(&message), 1_000, &mut rng).unwrap();
        assert_eq!(chosen.display_name, "Bob");
        assert_eq!(state.chain_count(&ChainKey::new(UNKNOWN_SENDER, "Bob")), 1);
    }

    #[test]
    fn test_empty_content_skips_mentions() {
        let mut state = state(&["Alice", "Bob"]);
        let mut rng = StdRng::seed_from_u64(1);
        state.record_turn("alice");
        let message = FlowMessage::new("Alice", "");

        let chosen = state.next_speaker(Some(&message), 1_000, &mut rng).unwrap();
        assert_eq!(chosen.display_name, "Bob");
        assert!(state.mention_chain_counts.is_empty());
    }
}
