//! Read-only statistics snapshot of a conversation's flow state.

use super::participant::Participant;
use super::state::{ConversationFlowState, MentionRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diagnostic snapshot returned by `get_flow_statistics`.
///
/// Field names serialize in camelCase and are stable; embedders may expose
/// this shape over the network as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStatistics {
    pub participant_count: usize,

    /// Display name of the last chosen speaker.
    pub last_speaker: Option<String>,

    /// Display name → consecutive turns, for every participant.
    pub consecutive_turns: BTreeMap<String, u32>,

    /// Target display name → latest accepted mention of them.
    pub recent_mentions: BTreeMap<String, MentionRecord>,

    /// `"Mentioner-Mentioned"` → accepted mention count.
    pub mention_chains: BTreeMap<String, u32>,

    pub max_mention_chain: u32,
    pub mention_cooldown_ms: u64,
    pub chain_expiry_ms: u64,

    /// Display names in the order shuffled at initialization.
    pub speaking_order: Vec<String>,

    pub participants: Vec<Participant>,
}

impl ConversationFlowState {
    /// Builds a statistics snapshot. Does not mutate the state.
    pub fn statistics(&self) -> FlowStatistics {
        let consecutive_turns = self
            .participants
            .iter()
            .map(|p| (p.display_name.clone(), self.consecutive_turns(&p.id)))
            .collect();

        let recent_mentions = self
            .last_mentions
            .iter()
            .filter_map(|(id, record)| {
                self.participant_by_id(id)
                    .map(|p| (p.display_name.clone(), record.clone()))
            })
            .collect();

        let mention_chains = self
            .mention_chain_counts
            .iter()
            .map(|(key, count)| (key.to_string(), *count))
            .collect();

        FlowStatistics {
            participant_count: self.participants.len(),
            last_speaker: self.last_speaker().map(|p| p.display_name.clone()),
            consecutive_turns,
            recent_mentions,
            mention_chains,
            max_mention_chain: self.config.max_mention_chain,
            mention_cooldown_ms: self.config.mention_cooldown_ms,
            chain_expiry_ms: self.config.chain_expiry_ms,
            speaking_order: self
                .speaking_order
                .iter()
                .map(|p| p.display_name.clone())
                .collect(),
            participants: self.participants.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::config::FlowConfig;
    use crate::flow::state::ChainKey;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn state() -> ConversationFlowState {
        ConversationFlowState::new(
            vec![
                Participant::new("a", "Alice").with_model("model-a"),
                Participant::new("b", "Bob"),
            ],
            FlowConfig::default(),
            &mut StdRng::seed_from_u64(29),
        )
    }

    #[test]
    fn test_fresh_statistics() {
        let stats = state().statistics();

        assert_eq!(stats.participant_count, 2);
        assert_eq!(stats.last_speaker, None);
        assert_eq!(stats.consecutive_turns.get("Alice"), Some(&0));
        assert_eq!(stats.consecutive_turns.get("Bob"), Some(&0));
        assert!(stats.recent_mentions.is_empty());
        assert!(stats.mention_chains.is_empty());
        assert_eq!(stats.max_mention_chain, 2);
        assert_eq!(stats.mention_cooldown_ms, 30_000);
        assert_eq!(stats.speaking_order.len(), 2);
    }

    #[test]
    fn test_statistics_after_mention() {
        let mut state = state();
        state.accept_mention(&ChainKey::new("Alice", "Bob"), "b", 500);
        state.record_turn("b");

        let stats = state.statistics();
        assert_eq!(stats.last_speaker.as_deref(), Some("Bob"));
        assert_eq!(stats.consecutive_turns.get("Bob"), Some(&1));
        assert_eq!(stats.mention_chains.get("Alice-Bob"), Some(&1));
        assert_eq!(
            stats.recent_mentions.get("Bob"),
            Some(&MentionRecord {
                mentioned_by: "Alice".to_string(),
                timestamp: 500,
            })
        );
    }

    #[test]
    fn test_statistics_json_shape() {
        let mut state = state();
        state.accept_mention(&ChainKey::new("Alice", "Bob"), "b", 500);
        let json = serde_json::to_value(state.statistics()).unwrap();

        assert_eq!(json["participantCount"], 2);
        assert_eq!(json["mentionChains"]["Alice-Bob"], 1);
        assert_eq!(json["recentMentions"]["Bob"]["mentionedBy"], "Alice");
        assert_eq!(json["maxMentionChain"], 2);
        assert_eq!(json["mentionCooldownMs"], 30_000);
        assert_eq!(json["participants"][0]["modelIdentifier"], "model-a");
    }
}
