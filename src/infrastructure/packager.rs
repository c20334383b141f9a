use crate::domain::message::{IsoMessage, MAX_FIELD, MessageError, Mti};
use crate::domain::ports::Packager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    Numeric,
    Alpha,
    /// Raw bytes carried as upper-case hex text, two characters per byte.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    Fixed(usize),
    LlVar(usize),
    LllVar(usize),
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    content: Content,
    length: Length,
}

const fn fixed(content: Content, len: usize) -> FieldSpec {
    FieldSpec {
        content,
        length: Length::Fixed(len),
    }
}

const fn llvar(content: Content, max: usize) -> FieldSpec {
    FieldSpec {
        content,
        length: Length::LlVar(max),
    }
}

const fn lllvar(content: Content, max: usize) -> FieldSpec {
    FieldSpec {
        content,
        length: Length::LllVar(max),
    }
}

/// ISO-8583:1987 data element layout for the ASCII variant.
fn field_spec(field: u8) -> Option<FieldSpec> {
    use Content::*;
    let spec = match field {
        2 => llvar(Numeric, 19),
        3 => fixed(Numeric, 6),
        4..=6 => fixed(Numeric, 12),
        7 => fixed(Numeric, 10),
        8..=10 => fixed(Numeric, 8),
        11..=12 => fixed(Numeric, 6),
        13..=18 => fixed(Numeric, 4),
        19..=24 => fixed(Numeric, 3),
        25..=26 => fixed(Numeric, 2),
        27 => fixed(Numeric, 1),
        28..=31 => fixed(Alpha, 9),
        32..=33 => llvar(Numeric, 11),
        34 => llvar(Alpha, 28),
        35 => llvar(Alpha, 37),
        36 => lllvar(Alpha, 104),
        37 => fixed(Alpha, 12),
        38 => fixed(Alpha, 6),
        39 => fixed(Alpha, 2),
        40 => fixed(Alpha, 3),
        41 => fixed(Alpha, 8),
        42 => fixed(Alpha, 15),
        43 => fixed(Alpha, 40),
        44 => llvar(Alpha, 25),
        45 => llvar(Alpha, 76),
        46..=48 => lllvar(Alpha, 999),
        49..=51 => fixed(Alpha, 3),
        52 => fixed(Binary, 8),
        53 => fixed(Numeric, 16),
        54 => lllvar(Alpha, 120),
        55..=63 => lllvar(Alpha, 999),
        64 => fixed(Binary, 8),
        65 => fixed(Binary, 1),
        66 => fixed(Numeric, 1),
        67 => fixed(Numeric, 2),
        68..=70 => fixed(Numeric, 3),
        71..=72 => fixed(Numeric, 4),
        73 => fixed(Numeric, 6),
        74..=81 => fixed(Numeric, 10),
        82..=85 => fixed(Numeric, 12),
        86..=89 => fixed(Numeric, 16),
        90 => fixed(Numeric, 42),
        91 => fixed(Alpha, 1),
        92 => fixed(Alpha, 2),
        93 => fixed(Alpha, 5),
        94 => fixed(Alpha, 7),
        95 => fixed(Alpha, 42),
        96 => fixed(Binary, 8),
        97 => fixed(Alpha, 17),
        98 => fixed(Alpha, 25),
        99..=100 => llvar(Numeric, 11),
        101 => llvar(Alpha, 17),
        102..=103 => llvar(Alpha, 28),
        104 => lllvar(Alpha, 100),
        105..=127 => lllvar(Alpha, 999),
        128 => fixed(Binary, 8),
        _ => return None,
    };
    Some(spec)
}

/// Packs messages as ASCII: MTI, hex bitmap(s), then each present field in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct Iso87AsciiPackager;

impl Iso87AsciiPackager {
    pub fn new() -> Self {
        Self
    }
}

impl Packager for Iso87AsciiPackager {
    fn pack(&self, message: &IsoMessage) -> Result<Vec<u8>, MessageError> {
        let mti = message.mti().ok_or(MessageError::MissingMti)?;
        let secondary = message.max_field().is_some_and(|f| f > 64);
        let mut bitmap = vec![0u8; if secondary { 16 } else { 8 }];
        if secondary {
            bitmap[0] |= 0x80;
        }

        let mut body = Vec::with_capacity(128);
        for (field, value) in message.fields() {
            let spec = field_spec(field).ok_or(MessageError::FieldOutOfRange(field as u16))?;
            let index = usize::from(field - 1);
            bitmap[index / 8] |= 0x80 >> (index % 8);
            encode_field(field, spec, value, &mut body)?;
        }

        let mut out = Vec::with_capacity(4 + bitmap.len() * 2 + body.len());
        out.extend_from_slice(mti.as_str().as_bytes());
        out.extend_from_slice(to_hex(&bitmap).as_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<IsoMessage, MessageError> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let mti = Mti::parse(cursor.take_str(4, "MTI")?)?;
        let mut bitmap = from_hex(cursor.take_str(16, "primary bitmap")?)?;
        if bitmap[0] & 0x80 != 0 {
            bitmap.extend(from_hex(cursor.take_str(16, "secondary bitmap")?)?);
        }

        let mut message = IsoMessage::with_mti(mti);
        let highest = (bitmap.len() * 8) as u8;
        for field in 2..=highest.min(MAX_FIELD) {
            let index = usize::from(field - 1);
            if bitmap[index / 8] & (0x80 >> (index % 8)) == 0 {
                continue;
            }
            let spec = field_spec(field).ok_or(MessageError::FieldOutOfRange(field as u16))?;
            let value = decode_field(field, spec, &mut cursor)?;
            message.set(field, value)?;
        }

        if cursor.pos != bytes.len() {
            return Err(MessageError::Malformed(format!(
                "{} trailing bytes after last field",
                bytes.len() - cursor.pos
            )));
        }
        Ok(message)
    }
}

fn invalid(field: u8, reason: impl Into<String>) -> MessageError {
    MessageError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn encode_field(
    field: u8,
    spec: FieldSpec,
    value: &str,
    out: &mut Vec<u8>,
) -> Result<(), MessageError> {
    if !value.is_ascii() {
        return Err(invalid(field, "value is not ASCII"));
    }
    match spec.content {
        Content::Numeric if !value.bytes().all(|b| b.is_ascii_digit()) => {
            return Err(invalid(field, format!("'{value}' is not numeric")));
        }
        Content::Binary if !value.bytes().all(|b| b.is_ascii_hexdigit()) => {
            return Err(invalid(field, "binary value is not hex encoded"));
        }
        _ => {}
    }

    match spec.length {
        Length::Fixed(len) => {
            let width = if spec.content == Content::Binary { len * 2 } else { len };
            if value.len() > width {
                return Err(invalid(
                    field,
                    format!("length {} exceeds fixed length {width}", value.len()),
                ));
            }
            match spec.content {
                Content::Numeric => out.extend_from_slice(format!("{value:0>width$}").as_bytes()),
                Content::Alpha => out.extend_from_slice(format!("{value:<width$}").as_bytes()),
                Content::Binary if value.len() != width => {
                    return Err(invalid(field, format!("binary value must be {width} hex chars")));
                }
                Content::Binary => out.extend_from_slice(value.to_ascii_uppercase().as_bytes()),
            }
        }
        Length::LlVar(max) | Length::LllVar(max) => {
            if value.len() > max {
                return Err(invalid(
                    field,
                    format!("length {} exceeds maximum {max}", value.len()),
                ));
            }
            let prefix = match spec.length {
                Length::LlVar(_) => format!("{:02}", value.len()),
                _ => format!("{:03}", value.len()),
            };
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(value.as_bytes());
        }
    }
    Ok(())
}

fn decode_field(field: u8, spec: FieldSpec, cursor: &mut Cursor<'_>) -> Result<String, MessageError> {
    let len = match spec.length {
        Length::Fixed(len) if spec.content == Content::Binary => len * 2,
        Length::Fixed(len) => len,
        Length::LlVar(max) | Length::LllVar(max) => {
            let digits = if matches!(spec.length, Length::LlVar(_)) { 2 } else { 3 };
            let raw = cursor.take_str(digits, "length prefix")?;
            let len: usize = raw
                .parse()
                .map_err(|_| invalid(field, format!("bad length prefix '{raw}'")))?;
            if len > max {
                return Err(invalid(field, format!("length {len} exceeds maximum {max}")));
            }
            len
        }
    };
    let value = cursor.take_str(len, "field data")?;
    if spec.content == Content::Numeric && !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(field, format!("'{value}' is not numeric")));
    }
    Ok(value.to_string())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take_str(&mut self, len: usize, what: &str) -> Result<&'a str, MessageError> {
        let end = self.pos + len;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            MessageError::Malformed(format!("truncated {what} at offset {}", self.pos))
        })?;
        self.pos = end;
        std::str::from_utf8(slice)
            .map_err(|_| MessageError::Malformed(format!("non-ASCII {what}")))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn from_hex(text: &str) -> Result<Vec<u8>, MessageError> {
    (0..text.len())
        .step_by(2)
        .map(|i| {
            text.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| MessageError::Malformed(format!("invalid bitmap '{text}'")))
        })
        .collect()
}
