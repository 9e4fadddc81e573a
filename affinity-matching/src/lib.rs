//! Compatibility matching engine: canonical interest tags, corpus rarity
//! weighting, pairwise scoring with hard safety gates, candidate ranking,
//! and the double opt-in proposal lifecycle.
//!
//! Transport (bot commands, embeds, DMs) and durable storage are consumers
//! of this crate: they implement the traits in [`stores`] and drive
//! [`engine::MatchEngine`].

pub mod anonymize;
pub mod config;
pub mod engine;
pub mod events;
pub mod fuzzy;
pub mod idf;
pub mod memory;
pub mod models;
pub mod proactive;
pub mod ranker;
pub mod scoring;
pub mod stores;
pub mod tags;

pub use config::{AcceptPolicy, MatchingConfig};
pub use engine::MatchEngine;
pub use idf::TagWeights;
pub use models::{Match, MatchProposal, Profile, ProfileInput, ProposalStatus};
