//! Meshgate - internal service mesh gateway.
//!
//! A registry of named upstream services fronted by an authorizing reverse
//! proxy. Service ids act as hierarchical route prefixes: an inbound path
//! under `/request/` resolves to the most specific registered id, the caller
//! must hold the `request` scope and the resolved target the `receive`
//! scope, and only then is the request replayed upstream with hop-by-hop
//! headers stripped in both directions.
//!
//! # Request pipeline
//!
//! 1. **Caller authorization** ([`authz`]): identity header present, caller
//!    registered with the `request` scope.
//! 2. **Path resolution** ([`resolver`]): longest-prefix match against the
//!    registry.
//! 3. **Target authorization** ([`authz`]): target carries the `receive`
//!    scope.
//! 4. **Forwarding** ([`forwarder`]): sanitized replay upstream, verbatim
//!    relay back.
//!
//! The pipeline is strictly linear per request and terminal on first
//! failure; registry state lives behind [`registry::ServiceStore`] and is
//! re-read on every request.

pub mod authz;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod logging;
pub mod proxy_service;
pub mod registry;
pub mod resolver;
