//! 'dialogue-flow' - Turn-taking control for multi-agent conversations.
//!
//! This library decides "who speaks next" in a conversation shared by several
//! autonomous agents. It honors explicit `@name` addressing between agents
//! while breaking long back-and-forth mention loops and keeping any single
//! agent from dominating the floor.
//!
//! # Quick Start
//!
//! ```
//! use dialogue_flow::{FlowController, FlowMessage, Participant};
//!
//! let mut flow = FlowController::new();
//! flow.initialize_conversation(
//!     "room-1",
//!     vec![
//!         Participant::new("a", "Alice"),
//!         Participant::new("b", "Bob"),
//!         Participant::new("c", "Carol"),
//!     ],
//! );
//!
//! // Opening turn: uniform random pick.
//! let first = flow.get_next_speaker("room-1", None).unwrap();
//! assert!(["Alice", "Bob", "Carol"].contains(&first.display_name.as_str()));
//!
//! // Alice addresses Bob explicitly.
//! let message = FlowMessage::new("Alice", "thoughts @Bob?");
//! let next = flow.get_next_speaker("room-1", Some(&message)).unwrap();
//! assert_eq!(next.display_name, "Bob");
//! ```
//!
//! # Modules
//!
//! - [`flow`]: the flow controller, its per-conversation state and policies
//! - [`observability`]: tracing subscriber setup

pub mod flow;
pub mod observability;

pub use flow::{
    ChainBreak, ChainDecision, ChainKey, Clock, ConversationFlowState, FlowConfig,
    FlowController, FlowError, FlowMessage, FlowStatistics, ManualClock, MentionRecord,
    Participant, SharedFlowController, SystemClock,
};

#[cfg(feature = "driver")]
pub use flow::driver::{DialogueTurn, DriverConfig, TurnDriver, TurnGenerator, TurnRequest};
