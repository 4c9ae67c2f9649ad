//! Newsletter subscribers ("voters"): their per-newsletter subscription
//! state, and the synchronization of their fields with linked host user
//! accounts.
//!
//! Persistence, user accounts, the outbound mail spool and event delivery
//! belong to the host; they are reached through the traits in `storage` and
//! `events`. `VoterService` ties everything together, and `routes` expose it
//! over HTTP.

pub mod configuration;
pub mod domain;
pub mod events;
pub mod routes;
pub mod service;
pub mod startup;
pub mod storage;
pub mod synchronization;
pub mod telemetry;
pub mod utils;
