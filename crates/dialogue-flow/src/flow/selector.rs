//! Random speaker selection with anti-repetition damping.

use super::participant::Participant;
use super::state::ConversationFlowState;
use rand::Rng;
use rand::seq::SliceRandom;

/// Participants with this many consecutive turns or more are deprioritized.
const CONSECUTIVE_TURN_LIMIT: u32 = 2;

impl ConversationFlowState {
    /// Picks a participant uniformly at random, avoiding repetition.
    ///
    /// 1. Exclude the last speaker.
    /// 2. Among the rest, prefer participants below the consecutive-turn limit.
    /// 3. Fall back to the whole post-exclusion pool, then to everyone.
    ///
    /// Returns `None` only when there are no participants.
    pub(crate) fn select_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Participant> {
        let last_speaker = self.last_speaker.as_deref();
        let pool: Vec<&Participant> = self
            .participants
            .iter()
            .filter(|p| Some(p.id.as_str()) != last_speaker)
            .collect();

        let preferred: Vec<&Participant> = pool
            .iter()
            .copied()
            .filter(|p| self.consecutive_turns(&p.id) < CONSECUTIVE_TURN_LIMIT)
            .collect();

        if let Some(chosen) = preferred.choose(rng) {
            return Some(*chosen);
        }
        if let Some(chosen) = pool.choose(rng) {
            return Some(*chosen);
        }
        self.participants.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::config::FlowConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn state(names: &[&str]) -> ConversationFlowState {
        let participants = names
            .iter()
            .map(|name| Participant::new(name.to_lowercase(), *name))
            .collect();
        ConversationFlowState::new(
            participants,
            FlowConfig::default(),
            &mut StdRng::seed_from_u64(11),
        )
    }

    #[test]
    fn test_never_repeats_last_speaker() {
        let mut state = state(&["Alice", "Bob", "Carol"]);
        let mut rng = StdRng::seed_from_u64(5);
        state.record_turn("alice");

        for _ in 0..200 {
            let chosen = state.select_random(&mut rng).unwrap();
            assert_ne!(chosen.id, "alice");
        }
    }

    #[test]
    fn test_covers_every_other_participant() {
        let mut state = state(&["Alice", "Bob", "Carol"]);
        let mut rng = StdRng::seed_from_u64(9);
        state.record_turn("alice");

        let seen: HashSet<String> = (0..200)
            .map(|_| state.select_random(&mut rng).unwrap().id.clone())
            .collect();
        assert_eq!(seen, HashSet::from(["bob".to_string(), "carol".to_string()]));
    }

    #[test]
    fn test_prefers_participants_below_limit() {
        let mut state = state(&["Alice", "Bob", "Carol"]);
        let mut rng = StdRng::seed_from_u64(13);
        // Bob is streaking but is not the last speaker.
        state.consecutive_turn_counts.insert("bob".to_string(), 2);
        state.last_speaker = Some("alice".to_string());

        for _ in 0..100 {
            assert_eq!(state.select_random(&mut rng).unwrap().id, "carol");
        }
    }

    #[test]
    fn test_falls_back_to_pool_when_all_are_streaking() {
        let mut state = state(&["Alice", "Bob"]);
        let mut rng = StdRng::seed_from_u64(17);
        state.consecutive_turn_counts.insert("bob".to_string(), 3);
        state.last_speaker = Some("alice".to_string());

        assert_eq!(state.select_random(&mut rng).unwrap().id, "bob");
    }

    #[test]
    fn test_single_participant_repeats() {
        let mut state = state(&["Solo"]);
        let mut rng = StdRng::seed_from_u64(19);
        state.record_turn("solo");
        state.record_turn("solo");

        assert_eq!(state.select_random(&mut rng).unwrap().id, "solo");
    }

    #[test]
    fn test_empty_roster() {
        let state = state(&[]);
        let mut rng = StdRng::seed_from_u64(23);
        assert!(state.select_random(&mut rng).is_none());
    }
}
