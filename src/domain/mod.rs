//! Domain model: the ISO-8583 envelope, the per-message pipeline context and the ports the
//! application layer talks to.

pub mod context;
pub mod message;
pub mod participant;
pub mod ports;
pub mod transaction;
