use crate::config::RequestDefaults;
use crate::domain::message::{IsoMessage, Mti};
use crate::error::Result;
use chrono::NaiveDateTime;
use std::time::{SystemTime, UNIX_EPOCH};

/// System trace audit number derived from the wall clock.
pub fn generate_stan() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{:06}", millis % 1_000_000)
}

/// Builds the 0200 authorization request sent by the client.
pub fn build_authorization_request(
    defaults: &RequestDefaults,
    now: NaiveDateTime,
    stan: &str,
) -> Result<IsoMessage> {
    let mut request = IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST);
    request.set(2, defaults.pan.as_str())?;
    request.set(3, defaults.processing_code.as_str())?;
    request.set(4, defaults.amount.as_str())?;
    request.set(7, now.format("%m%d%H%M%S").to_string())?;
    request.set(11, stan)?;
    request.set(12, now.format("%H%M%S").to_string())?;
    request.set(13, now.format("%m%d").to_string())?;
    request.set(22, defaults.pos_entry_mode.as_str())?;
    request.set(25, defaults.pos_condition_code.as_str())?;
    request.set(32, defaults.acquirer_id.as_str())?;
    request.set(41, defaults.terminal_id.as_str())?;
    request.set(42, defaults.merchant_id.as_str())?;
    request.set(49, defaults.currency_code.as_str())?;
    Ok(request)
}
