use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Lowest data element index. Field 1 is the secondary bitmap and never carries a value.
pub const MIN_FIELD: u8 = 2;
/// Highest data element index addressable with a secondary bitmap.
pub const MAX_FIELD: u8 = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("invalid MTI '{0}': expected four decimal digits")]
    InvalidMti(String),
    #[error("MTI {0} is not a request - can't derive response MTI")]
    NotARequest(Mti),
    #[error("field {0} is outside the addressable range {MIN_FIELD}..={MAX_FIELD}")]
    FieldOutOfRange(u16),
    #[error("message has no MTI")]
    MissingMti,
    #[error("field {field}: {reason}")]
    InvalidField { field: u8, reason: String },
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Message type indicator: version, class, function and origin digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mti([u8; 4]);

impl Mti {
    pub const AUTHORIZATION_REQUEST: Mti = Mti(*b"0200");
    pub const AUTHORIZATION_RESPONSE: Mti = Mti(*b"0210");

    pub fn parse(value: &str) -> Result<Self, MessageError> {
        let bytes: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| MessageError::InvalidMti(value.to_string()))?;
        if !bytes.iter().all(u8::is_ascii_digit) {
            return Err(MessageError::InvalidMti(value.to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII digits are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Requests carry an even function digit (third position).
    pub fn is_request(&self) -> bool {
        (self.0[2] - b'0') % 2 == 0
    }

    /// The paired response type, e.g. `0200` -> `0210`.
    pub fn response(&self) -> Result<Self, MessageError> {
        if !self.is_request() {
            return Err(MessageError::NotARequest(*self));
        }
        let mut bytes = self.0;
        bytes[2] += 1;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Mti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory ISO-8583 envelope: an MTI plus data elements keyed by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsoMessage {
    mti: Option<Mti>,
    fields: BTreeMap<u8, String>,
}

impl IsoMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mti(mti: Mti) -> Self {
        Self {
            mti: Some(mti),
            fields: BTreeMap::new(),
        }
    }

    pub fn mti(&self) -> Option<Mti> {
        self.mti
    }

    pub fn set_mti(&mut self, mti: Mti) {
        self.mti = Some(mti);
    }

    pub fn set(&mut self, field: u8, value: impl Into<String>) -> Result<(), MessageError> {
        check_range(field)?;
        self.fields.insert(field, value.into());
        Ok(())
    }

    pub fn unset(&mut self, field: u8) -> Option<String> {
        self.fields.remove(&field)
    }

    pub fn has_field(&self, field: u8) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn get(&self, field: u8) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Present fields in ascending index order.
    pub fn fields(&self) -> impl Iterator<Item = (u8, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn max_field(&self) -> Option<u8> {
        self.fields.keys().next_back().copied()
    }

    /// Clones this request and flips its MTI to the paired response type.
    ///
    /// Every field of the request is echoed; callers overwrite what they need.
    pub fn to_response(&self) -> Result<IsoMessage, MessageError> {
        let mti = self.mti.ok_or(MessageError::MissingMti)?.response()?;
        let mut response = self.clone();
        response.mti = Some(mti);
        Ok(response)
    }
}

fn check_range(field: u8) -> Result<(), MessageError> {
    if (MIN_FIELD..=MAX_FIELD).contains(&field) {
        Ok(())
    } else {
        Err(MessageError::FieldOutOfRange(field as u16))
    }
}

impl fmt::Display for IsoMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mti {
            Some(mti) => write!(f, "MTI={mti}")?,
            None => f.write_str("MTI=<unset>")?,
        }
        for (field, value) in &self.fields {
            write!(f, ", F{field}={value}")?;
        }
        Ok(())
    }
}
