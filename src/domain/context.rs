use super::message::IsoMessage;
use std::fmt;

/// Response codes this gateway emits in field 39.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// `00`
    Approved,
    /// `12` - invalid or unsupported message.
    InvalidTransaction,
    /// `96` - system or database malfunction.
    SystemMalfunction,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::Approved => "00",
            ResponseCode::InvalidTransaction => "12",
            ResponseCode::SystemMalfunction => "96",
        }
    }

    /// Code used when no stage recorded one.
    pub fn default_for(aborted: bool) -> Self {
        if aborted {
            ResponseCode::SystemMalfunction
        } else {
            ResponseCode::Approved
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one message through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    New,
    Validated,
    Persisted,
    Responded,
    AbortedResponse,
}

/// Per-message state shared by every participant of one pipeline run.
///
/// The request is supplied at construction, so a context without an inbound message
/// cannot exist. Everything else starts empty and is filled in by the stages.
#[derive(Debug, Clone)]
pub struct Context {
    id: u64,
    request: IsoMessage,
    response: Option<IsoMessage>,
    response_code: Option<ResponseCode>,
    approval_code: Option<String>,
    error_message: Option<String>,
    state: PipelineState,
}

impl Context {
    pub fn new(id: u64, request: IsoMessage) -> Self {
        Self {
            id,
            request,
            response: None,
            response_code: None,
            approval_code: None,
            error_message: None,
            state: PipelineState::New,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &IsoMessage {
        &self.request
    }

    pub fn response(&self) -> Option<&IsoMessage> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: IsoMessage) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<IsoMessage> {
        self.response.take()
    }

    pub fn response_code(&self) -> Option<ResponseCode> {
        self.response_code
    }

    /// Overwrites whatever code an earlier stage recorded.
    pub fn set_response_code(&mut self, code: ResponseCode) {
        self.response_code = Some(code);
    }

    /// Records `code` only if no earlier stage has set one.
    pub fn set_response_code_if_absent(&mut self, code: ResponseCode) {
        self.response_code.get_or_insert(code);
    }

    pub fn approval_code(&self) -> Option<&str> {
        self.approval_code.as_deref()
    }

    pub fn set_approval_code(&mut self, code: impl Into<String>) {
        self.approval_code = Some(code.into());
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Records a terminal condition: response code plus diagnostic.
    pub fn reject(&mut self, code: ResponseCode, message: impl Into<String>) {
        self.set_response_code(code);
        self.set_error_message(message);
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn advance(&mut self, state: PipelineState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::Mti;

    #[test]
    fn test_default_code_by_outcome() {
        assert_eq!(ResponseCode::default_for(false).as_str(), "00");
        assert_eq!(ResponseCode::default_for(true).as_str(), "96");
    }

    #[test]
    fn test_first_writer_wins_unless_overwritten() {
        let mut ctx = Context::new(1, IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST));
        ctx.set_response_code_if_absent(ResponseCode::InvalidTransaction);
        ctx.set_response_code_if_absent(ResponseCode::Approved);
        assert_eq!(ctx.response_code(), Some(ResponseCode::InvalidTransaction));

        ctx.set_response_code(ResponseCode::SystemMalfunction);
        assert_eq!(ctx.response_code(), Some(ResponseCode::SystemMalfunction));
    }

    #[test]
    fn test_new_context_is_empty() {
        let ctx = Context::new(7, IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST));
        assert_eq!(ctx.id(), 7);
        assert_eq!(ctx.state(), PipelineState::New);
        assert!(ctx.response().is_none());
        assert!(ctx.response_code().is_none());
        assert!(ctx.approval_code().is_none());
        assert!(ctx.error_message().is_none());
    }
}
