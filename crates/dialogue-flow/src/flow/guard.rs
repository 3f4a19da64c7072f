//! Chain guard: decides whether a resolved mention may pick the next speaker.
//!
//! For a directed pair `(mentioner, mentioned)` the guard looks at
//!
//! - `forward`: accepted mentions in this direction,
//! - `reverse`: accepted mentions in the opposite direction,
//! - `last`: when this direction last had a mention accepted.
//!
//! and rejects the mention if any of these holds, checked in this order:
//!
//! 1. `forward >= max_mention_chain` ([`ChainBreak::MaxChain`])
//! 2. `forward + reverse >= 2 * max_mention_chain` ([`ChainBreak::BackAndForth`])
//! 3. `now - last < mention_cooldown_ms` ([`ChainBreak::Cooldown`])
//!
//! A direction that has never been accepted (or whose entry expired) has no
//! cooldown.

use super::state::{ChainKey, ConversationFlowState, MentionRecord};
use std::fmt;
use tracing::debug;

/// Why a mention was not allowed to choose the next speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainBreak {
    /// The mentioner already reached the per-direction limit.
    MaxChain,
    /// The pair has exchanged too many mentions in total.
    BackAndForth,
    /// The same direction was accepted too recently.
    Cooldown,
}

impl ChainBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainBreak::MaxChain => "max chain",
            ChainBreak::BackAndForth => "too much back-and-forth",
            ChainBreak::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a chain guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainDecision {
    Accept,
    Reject(ChainBreak),
}

impl ChainDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ChainDecision::Accept)
    }
}

impl ConversationFlowState {
    /// Evaluates a candidate mention without changing any state.
    pub fn check_mention(&self, key: &ChainKey, now: u64) -> ChainDecision {
        let max_chain = self.config.max_mention_chain;
        let forward = self.chain_count(key);
        let reverse = self.chain_count(&key.reversed());

        if forward >= max_chain {
            return ChainDecision::Reject(ChainBreak::MaxChain);
        }
        if u64::from(forward) + u64::from(reverse) >= 2 * u64::from(max_chain) {
            return ChainDecision::Reject(ChainBreak::BackAndForth);
        }
        if let Some(last) = self.last_mention_time(key) {
            if now.saturating_sub(last) < self.config.mention_cooldown_ms {
                return ChainDecision::Reject(ChainBreak::Cooldown);
            }
        }

        ChainDecision::Accept
    }

    /// Records an accepted mention and purges expired chains.
    pub(crate) fn accept_mention(&mut self, key: &ChainKey, mentioned_id: &str, now: u64) {
        *self.mention_chain_counts.entry(key.clone()).or_insert(0) += 1;
        self.last_mention_timestamps.insert(key.clone(), now);
        self.last_mentions.insert(
            mentioned_id.to_string(),
            MentionRecord {
                mentioned_by: key.mentioner.clone(),
                timestamp: now,
            },
        );

        let expired = self.sweep_expired_chains(now);
        if expired > 0 {
            debug!(
                target: "dialogue_flow::chain",
                expired,
                event = "chains_expired"
            );
        }
    }

    /// Removes chains whose last accepted mention is older than the expiry.
    ///
    /// Returns the number of directed pairs removed.
    pub(crate) fn sweep_expired_chains(&mut self, now: u64) -> usize {
        let expiry = self.config.chain_expiry_ms;
        let expired: Vec<ChainKey> = self
            .last_mention_timestamps
            .iter()
            .filter(|(_, last)| now.saturating_sub(**last) > expiry)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_chain(key);
        }
        expired.len()
    }

    /// Drops every chain the sender takes part in, in either direction.
    ///
    /// Returns the number of directed pairs removed.
    pub(crate) fn forgive_chains(&mut self, sender: &str) -> usize {
        let involved: Vec<ChainKey> = self
            .mention_chain_counts
            .keys()
            .chain(self.last_mention_timestamps.keys())
            .filter(|key| key.involves(sender))
            .cloned()
            .collect();

        let mut removed = 0;
        for key in &involved {
            if self.remove_chain(key) {
                removed += 1;
            }
        }
        removed
    }

    fn remove_chain(&mut self, key: &ChainKey) -> bool {
        let had_count = self.mention_chain_counts.remove(key).is_some();
        let had_time = self.last_mention_timestamps.remove(key).is_some();
        had_count || had_time
    }
}
