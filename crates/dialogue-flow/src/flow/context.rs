//! Advisory mention hints injected into a participant's prompt.

use super::mention::resolve_all;
use super::participant::{FlowMessage, Participant};
use super::state::{ChainKey, ConversationFlowState, UNKNOWN_SENDER};
use minijinja::{Environment, context};

const MENTION_CONTEXT_TEMPLATE: &str = "\
{% if addressed_by %}
{{ addressed_by }} addressed you directly. Respond to their point before raising new ones.
{% endif %}
{% if pending %}
You were mentioned by {{ pending | join(\", \") }} and have not replied yet.
{% endif %}
{% for partner in saturated %}
You and {{ partner }} have been mentioning each other repeatedly. \
{% if alternatives %}Consider addressing {{ alternatives | join(\" or \") }} instead.\
{% else %}Consider addressing the whole group instead.{% endif %}

{% endfor %}";

impl ConversationFlowState {
    /// Builds prompt hints about mentions for `participant`.
    ///
    /// Only the last `context_window` messages of `recent_messages` are read.
    /// Returns an empty string when no hint applies. Does not mutate the
    /// state.
    pub fn mention_context(
        &self,
        participant: &Participant,
        recent_messages: &[FlowMessage],
        now: u64,
    ) -> Result<String, minijinja::Error> {
        let addressed_by = self
            .last_mention_of(&participant.id)
            .filter(|record| now.saturating_sub(record.timestamp) <= self.config.chain_expiry_ms)
            .map(|record| record.mentioned_by.clone());

        let pending: Vec<String> = self
            .pending_mentions(participant, recent_messages)
            .into_iter()
            .filter(|sender| Some(sender) != addressed_by.as_ref())
            .collect();

        let saturated = self.saturated_partners(participant);
        let alternatives: Vec<&str> = self
            .participants
            .iter()
            .filter(|p| p.id != participant.id)
            .map(|p| p.display_name.as_str())
            .filter(|name| !saturated.contains(name))
            .collect();

        if addressed_by.is_none() && pending.is_empty() && saturated.is_empty() {
            return Ok(String::new());
        }

        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("mention_context", MENTION_CONTEXT_TEMPLATE)?;
        let rendered = env.get_template("mention_context")?.render(context! {
            addressed_by => addressed_by,
            pending => pending,
            saturated => saturated,
            alternatives => alternatives,
        })?;

        Ok(rendered.trim().to_string())
    }

    /// Senders who mentioned `participant` after their last message.
    fn pending_mentions(
        &self,
        participant: &Participant,
        recent_messages: &[FlowMessage],
    ) -> Vec<String> {
        let start = recent_messages
            .len()
            .saturating_sub(self.config.context_window);
        let mut pending: Vec<String> = Vec::new();

        for message in &recent_messages[start..] {
            let sender = message.sender();
            if sender == Some(participant.display_name.as_str()) {
                pending.clear();
                continue;
            }

            let mentions_participant = resolve_all(&message.content, &self.participants)
                .iter()
                .any(|p| p.id == participant.id);
            if mentions_participant {
                let from = sender.unwrap_or(UNKNOWN_SENDER).to_string();
                if !pending.contains(&from) {
                    pending.push(from);
                }
            }
        }

        pending
    }

    /// Participants whose chain with `participant` reached the limit in
    /// either direction.
    fn saturated_partners(&self, participant: &Participant) -> Vec<&str> {
        let max_chain = self.config.max_mention_chain;
        self.participants
            .iter()
            .filter(|other| other.id != participant.id)
            .filter(|other| {
                let key = ChainKey::new(
                    participant.display_name.clone(),
                    other.display_name.clone(),
                );
                self.chain_count(&key) >= max_chain
                    || self.chain_count(&key.reversed()) >= max_chain
            })
            .map(|other| other.display_name.as_str())
            .collect()
    }
}
