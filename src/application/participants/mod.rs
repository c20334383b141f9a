//! The three stages of the authorization pipeline.

pub mod build_response;
pub mod persist;
pub mod validate;

pub use build_response::BuildResponse;
pub use persist::PersistTransaction;
pub use validate::ValidateMessage;
