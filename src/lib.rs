//! Loyalty Core - budget ledger, reward issuance and supplier resilience
//!
//! The financial core of a multi-tenant loyalty platform: an atomic,
//! append-only budget ledger; a reward issuance state machine with a handler
//! per reward type; circuit-breaker and retry protection around external
//! voucher suppliers; signed outbound webhooks delivered by a worker pool;
//! and a background sweeper that expires lapsed issuances.
//!
//! Layout follows ports and adapters: `domain` holds the pure types and
//! state machines, `ports` the traits the application depends on,
//! `application` the services, and `adapters` the Postgres, in-memory and
//! HTTP implementations.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
