//! Interview sessions: the turn ledger, its persistence and the orchestration of a live interview.

pub mod clock;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod listing;
pub mod model;
pub mod orchestrator;
pub mod pg_store;
pub mod store;
