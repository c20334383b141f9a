//! Application layer containing the client and server orchestration.
//!
//! On the client side, `HostFailover` drives a `Multiplexer` across candidate hosts; the
//! multiplexer serializes connect/send/receive through a `ConnectionGuard`. On the server
//! side, `TransactionManager` runs each inbound message through the participant pipeline.

pub mod failover;
pub mod guard;
pub mod manager;
pub mod mux;
pub mod participants;
