//! Lingo · language-learning progression backend
//!
//! - Axum HTTP API for learners, the lesson catalog, the shop and lesson progression
//! - Pluggable storage: in-memory or Cloud Firestore (REST)
//! - Optional OpenAI integration for generated lessons, hints and pronunciation feedback
//!
//! The learner state rules live in [`progression`] and are pure; everything
//! else is glue that loads, persists and serves their inputs and outputs.

pub mod config;
pub mod domain;
pub mod error;
pub mod logic;
pub mod openai;
pub mod progression;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod util;
