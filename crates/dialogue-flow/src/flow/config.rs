//! Configuration for mention-chain limits and context reporting.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the flow controller.
///
/// Every conversation state captures a copy of the controller's config when it
/// is initialized, so changing the controller's config later only affects new
/// conversations.
///
/// # Examples
///
/// ```
/// use dialogue_flow::FlowConfig;
///
/// // Use default configuration
/// let config = FlowConfig::default();
/// assert_eq!(config.max_mention_chain, 2);
///
/// // Customize specific values
/// let relaxed = FlowConfig {
///     mention_cooldown_ms: 5_000,
///     ..Default::default()
/// };
/// assert_eq!(relaxed.chain_expiry_ms, 300_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Maximum accepted mentions in one direction before the chain breaks.
    ///
    /// The pair as a whole may accumulate at most twice this many.
    ///
    /// **Default:** 2
    pub max_mention_chain: u32,

    /// Minimum time between two accepted mentions in the same direction.
    ///
    /// **Default:** 30 000 ms
    pub mention_cooldown_ms: u64,

    /// Chain entries untouched for longer than this are purged on the next
    /// accepted mention anywhere in the conversation.
    ///
    /// **Default:** 300 000 ms
    pub chain_expiry_ms: u64,

    /// Number of trailing history messages inspected when building
    /// mention-context hints.
    ///
    /// **Default:** 15
    pub context_window: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_mention_chain: 2,
            mention_cooldown_ms: 30_000,
            chain_expiry_ms: 300_000,
            context_window: 15,
        }
    }
}

impl FlowConfig {
    /// Returns the mention cooldown as a [`Duration`].
    pub fn mention_cooldown(&self) -> Duration {
        Duration::from_millis(self.mention_cooldown_ms)
    }

    /// Returns the chain expiry as a [`Duration`].
    pub fn chain_expiry(&self) -> Duration {
        Duration::from_millis(self.chain_expiry_ms)
    }
}
