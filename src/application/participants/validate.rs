use crate::domain::context::{Context, PipelineState, ResponseCode};
use crate::domain::message::{IsoMessage, Mti};
use crate::domain::participant::{Outcome, Participant};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

/// Data elements every authorization must carry.
pub const REQUIRED_FIELDS: [u8; 6] = [2, 3, 4, 7, 11, 41];
pub const SUPPORTED_MTI: Mti = Mti::AUTHORIZATION_REQUEST;

/// Why an inbound message was refused before any processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Missing required field {0}")]
    MissingField(u8),
    #[error("Invalid MTI")]
    MissingMti,
    #[error("Unsupported MTI")]
    UnsupportedMti(Mti),
}

impl Rejection {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Rejection::MissingMti => ResponseCode::SystemMalfunction,
            Rejection::MissingField(_) | Rejection::UnsupportedMti(_) => {
                ResponseCode::InvalidTransaction
            }
        }
    }
}

/// Checks mandatory fields first, then the message type.
pub fn check(request: &IsoMessage) -> Result<(), Rejection> {
    if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !request.has_field(**f)) {
        return Err(Rejection::MissingField(*field));
    }
    match request.mti() {
        None => Err(Rejection::MissingMti),
        Some(mti) if mti != SUPPORTED_MTI => Err(Rejection::UnsupportedMti(mti)),
        Some(_) => Ok(()),
    }
}

pub struct ValidateMessage;

#[async_trait]
impl Participant for ValidateMessage {
    fn name(&self) -> &'static str {
        "validate"
    }

    async fn prepare(&self, id: u64, ctx: &mut Context) -> Outcome {
        match check(ctx.request()) {
            Ok(()) => {
                debug!(id, "validated inbound ISO-8583 message");
                ctx.advance(PipelineState::Validated);
                Outcome::prepared().no_join().read_only()
            }
            Err(rejection) => {
                match &rejection {
                    Rejection::MissingField(field) => {
                        warn!(id, field, "incoming transaction missing required field")
                    }
                    Rejection::UnsupportedMti(mti) => warn!(id, %mti, "unsupported MTI received"),
                    Rejection::MissingMti => warn!(id, "request carries no MTI"),
                }
                ctx.reject(rejection.response_code(), rejection.to_string());
                Outcome::aborted().no_join()
            }
        }
    }
}
