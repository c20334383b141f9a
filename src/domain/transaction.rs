use super::message::{IsoMessage, MessageError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const FIELD_PAN: u8 = 2;
pub const FIELD_PROCESSING_CODE: u8 = 3;
pub const FIELD_AMOUNT: u8 = 4;
pub const FIELD_TRANSMISSION_DATETIME: u8 = 7;
pub const FIELD_STAN: u8 = 11;
pub const FIELD_APPROVAL_CODE: u8 = 38;
pub const FIELD_RESPONSE_CODE: u8 = 39;
pub const FIELD_TERMINAL_ID: u8 = 41;
pub const FIELD_ADDITIONAL_RESPONSE: u8 = 44;

/// Minor-unit exponent of field 4.
const AMOUNT_SCALE: u32 = 2;

/// One persisted authorization, as written by the persistence stage.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    /// Pipeline transaction id; unique per server process.
    pub id: u64,
    pub mti: String,
    pub pan: String,
    pub processing_code: String,
    /// Amount in major units.
    pub amount: Decimal,
    pub transmission_datetime: String,
    pub stan: String,
    pub terminal_id: String,
}

impl TransactionRecord {
    /// Extracts the journal columns from an inbound request.
    pub fn from_request(id: u64, request: &IsoMessage) -> Result<Self, MessageError> {
        let mti = request.mti().ok_or(MessageError::MissingMti)?;
        Ok(Self {
            id,
            mti: mti.to_string(),
            pan: required(request, FIELD_PAN)?,
            processing_code: required(request, FIELD_PROCESSING_CODE)?,
            amount: parse_amount(&required(request, FIELD_AMOUNT)?)?,
            transmission_datetime: required(request, FIELD_TRANSMISSION_DATETIME)?,
            stan: required(request, FIELD_STAN)?,
            terminal_id: required(request, FIELD_TERMINAL_ID)?,
        })
    }
}

fn required(request: &IsoMessage, field: u8) -> Result<String, MessageError> {
    request
        .get(field)
        .map(str::to_string)
        .ok_or_else(|| MessageError::InvalidField {
            field,
            reason: "missing".to_string(),
        })
}

fn parse_amount(raw: &str) -> Result<Decimal, MessageError> {
    let invalid = |reason: &str| MessageError::InvalidField {
        field: FIELD_AMOUNT,
        reason: format!("{reason}: '{raw}'"),
    };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("amount is not numeric"));
    }
    let minor: i64 = raw.parse().map_err(|_| invalid("amount out of range"))?;
    Ok(Decimal::new(minor, AMOUNT_SCALE))
}
