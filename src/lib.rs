//! Binary-choice polls with live tallies.
//!
//! Votes arrive over a WebSocket, are serialized per poll by a
//! [`aggregator::VoteAggregator`], applied to the [`store::PollStore`], and the
//! new tally is fanned out to every connected client by the
//! [`broadcast::BroadcastHub`].

#[macro_use]
extern crate tracing;

pub mod aggregator;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod ingress;
pub mod polls;
pub mod realtime;
pub mod registry;
pub mod router;
pub mod startup;
pub mod store;
