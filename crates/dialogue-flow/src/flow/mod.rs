//! Flow control for multi-agent conversations.
//!
//! The flow controller keeps one [`ConversationFlowState`] per conversation and
//! answers a single question each turn: who speaks next.
//!
//! # Architecture
//!
//! ```text
//! get_next_speaker(id, last_message)
//!        │
//!        ▼
//! ┌──────────────────┐  candidates   ┌──────────────┐  accepted
//! │ Mention extractor │ ───────────▶ │ Chain guard  │ ──────────▶ mentioned participant
//! │ @token + fuzzy    │              │ per-pair     │
//! │ name resolution   │              │ counters     │
//! └──────────────────┘              └──────────────┘
//!                                         │ all rejected / no mentions
//!                                         ▼
//!                                  ┌──────────────┐
//!                                  │ Speaker      │ ──────────▶ random participant
//!                                  │ selector     │
//!                                  └──────────────┘
//! ```
//!
//! After either path the consecutive-turn bookkeeping is updated so that only
//! the chosen participant carries a non-zero count.
//!
//! # Ownership
//!
//! - [`FlowController`]: single-owner store, `&mut self` operations.
//! - [`SharedFlowController`]: cloneable handle that serializes calls per
//!   conversation and lets distinct conversations proceed concurrently.

pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
#[cfg(feature = "driver")]
pub mod driver;
pub mod error;
pub mod guard;
pub mod mention;
pub mod participant;
pub mod selector;
pub mod shared;
pub mod state;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FlowConfig;
pub use controller::FlowController;
pub use error::FlowError;
pub use guard::{ChainBreak, ChainDecision};
pub use mention::{extract_mentions, resolve_mention};
pub use participant::{FlowMessage, Participant};
pub use shared::SharedFlowController;
pub use state::{ChainKey, ConversationFlowState, MentionRecord};
pub use stats::FlowStatistics;
