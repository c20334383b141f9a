//! Process-facing entry points: the ISO client run, the TCP server and the request builder.

pub mod client;
pub mod request;
pub mod server;
