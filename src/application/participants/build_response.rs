use crate::domain::context::{Context, PipelineState, ResponseCode};
use crate::domain::message::{IsoMessage, MessageError};
use crate::domain::participant::{Outcome, Participant};
use crate::domain::transaction::{FIELD_ADDITIONAL_RESPONSE, FIELD_APPROVAL_CODE, FIELD_RESPONSE_CODE};
use async_trait::async_trait;
use tracing::{debug, error};

/// Turns the context into the reply envelope, on both the commit and the abort path.
pub struct BuildResponse;

impl BuildResponse {
    fn build(&self, id: u64, ctx: &mut Context, aborted: bool) {
        match response_for(ctx, aborted) {
            Ok((response, code)) => {
                debug!(id, mti = ?response.mti(), %code, "built ISO-8583 response");
                ctx.set_response(response);
                ctx.advance(if aborted {
                    PipelineState::AbortedResponse
                } else {
                    PipelineState::Responded
                });
            }
            Err(e) => error!(id, error = %e, "failed to build ISO-8583 response"),
        }
    }
}

fn response_for(ctx: &Context, aborted: bool) -> Result<(IsoMessage, ResponseCode), MessageError> {
    let mut response = ctx.request().to_response()?;
    let code = ctx
        .response_code()
        .unwrap_or_else(|| ResponseCode::default_for(aborted));
    response.set(FIELD_RESPONSE_CODE, code.as_str())?;
    if let Some(approval) = ctx.approval_code() {
        response.set(FIELD_APPROVAL_CODE, approval)?;
    }
    if let Some(message) = ctx.error_message().filter(|m| !m.trim().is_empty()) {
        response.set(FIELD_ADDITIONAL_RESPONSE, message)?;
    }
    Ok((response, code))
}

#[async_trait]
impl Participant for BuildResponse {
    fn name(&self) -> &'static str {
        "build-response"
    }

    async fn prepare(&self, _id: u64, _ctx: &mut Context) -> Outcome {
        Outcome::prepared().no_join().read_only()
    }

    async fn commit(&self, id: u64, ctx: &mut Context) {
        self.build(id, ctx, false);
    }

    async fn abort(&self, id: u64, ctx: &mut Context) {
        self.build(id, ctx, true);
    }

    fn is_finalizer(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::Mti;

    fn request() -> IsoMessage {
        let mut msg = IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST);
        msg.set(2, "4242424242424242").unwrap();
        msg.set(11, "000123").unwrap();
        msg.set(41, "TERMID01").unwrap();
        msg
    }

    #[tokio::test]
    async fn test_commit_defaults_to_approved() {
        let mut ctx = Context::new(1, request());
        BuildResponse.commit(1, &mut ctx).await;

        let response = ctx.response().unwrap();
        assert_eq!(response.mti(), Some(Mti::AUTHORIZATION_RESPONSE));
        assert_eq!(response.get(39), Some("00"));
        assert!(!response.has_field(38));
        assert!(!response.has_field(44));
        assert_eq!(response.get(11), Some("000123"));
        assert_eq!(ctx.state(), PipelineState::Responded);
    }

    #[tokio::test]
    async fn test_abort_defaults_to_malfunction() {
        let mut ctx = Context::new(1, request());
        BuildResponse.abort(1, &mut ctx).await;
        assert_eq!(ctx.response().unwrap().get(39), Some("96"));
        assert_eq!(ctx.state(), PipelineState::AbortedResponse);
    }

    #[tokio::test]
    async fn test_context_values_are_copied() {
        let mut ctx = Context::new(1, request());
        ctx.set_response_code(ResponseCode::Approved);
        ctx.set_approval_code("004217");
        BuildResponse.commit(1, &mut ctx).await;

        let response = ctx.response().unwrap();
        assert_eq!(response.get(38), Some("004217"));
        assert_eq!(response.get(39), Some("00"));
        assert_eq!(response.get(2), Some("4242424242424242"));
    }

    #[tokio::test]
    async fn test_blank_error_message_is_omitted() {
        let mut ctx = Context::new(1, request());
        ctx.reject(ResponseCode::InvalidTransaction, "   ");
        BuildResponse.abort(1, &mut ctx).await;

        let response = ctx.response().unwrap();
        assert_eq!(response.get(39), Some("12"));
        assert!(!response.has_field(44));
    }

    #[tokio::test]
    async fn test_response_to_non_request_is_not_built() {
        let mut msg = request();
        msg.set_mti(Mti::AUTHORIZATION_RESPONSE);
        let mut ctx = Context::new(1, msg);
        BuildResponse.commit(1, &mut ctx).await;
        assert!(ctx.response().is_none());
        assert_eq!(ctx.state(), PipelineState::New);
    }
}
